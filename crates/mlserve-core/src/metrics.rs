//! Metrics recorder for the inference service.
//!
//! Counter/gauge/histogram families with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors; rendering sorts series by
//! label set so identical state always renders identically. Histogram bucket
//! bounds are fixed when a family is constructed.
//!
//! Floating point values (gauges, histogram sums) are stored as `f64` bits in
//! `AtomicU64` and updated with compare-and-swap loops, so concurrent
//! observers never lose an update.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

type LabelKey = Vec<(String, String)>;

pub const LATENCY_BUCKETS_SECONDS: [f64; 7] = [0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];
pub const CONFIDENCE_BUCKETS: [f64; 6] = [0.1, 0.3, 0.5, 0.7, 0.9, 1.0];
pub const FEATURE_VALUE_BUCKETS: [f64; 9] = [-10.0, -5.0, -2.0, -1.0, 0.0, 1.0, 2.0, 5.0, 10.0];

/// Error type recorded for a failed prediction.
pub const PREDICTION_FAILED: &str = "prediction_failed";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `name{labels}` or bare `name` when there are no labels.
fn series(name: &str, labels: &str) -> String {
    if labels.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, labels)
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Prometheus float formatting (`+Inf`, `-Inf`, `NaN`).
fn fmt_f64(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

fn add_f64(cell: &AtomicU64, delta: f64) {
    let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
        Some((f64::from_bits(bits) + delta).to_bits())
    });
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::AcqRel);
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Sum over every series whose `label` equals `value`.
    pub fn sum_where(&self, label: &str, value: &str) -> u64 {
        self.map
            .iter()
            .filter(|r| r.key().iter().any(|(k, v)| k == label && v == value))
            .map(|r| r.value().load(Ordering::Acquire))
            .sum()
    }

    fn snapshot(&self) -> Vec<(LabelKey, u64)> {
        let mut rows: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Acquire)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        header(out, name, help, "counter");
        for (key, val) in self.snapshot() {
            let _ = writeln!(out, "{} {}", series(name, &label_str(&key)), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl GaugeVec {
    /// Set to an absolute value (last write wins).
    pub fn set(&self, labels: &[(&str, &str)], v: f64) {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        gauge.store(v.to_bits(), Ordering::Release);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        add_f64(&gauge, v);
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1.0);
    }

    /// Decrement by 1 unless that would go below zero.
    ///
    /// Returns `false` (and leaves the gauge untouched) when it is already 0.
    pub fn dec_floor_zero(&self, labels: &[(&str, &str)]) -> bool {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        gauge
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let v = f64::from_bits(bits);
                (v >= 1.0).then(|| (v - 1.0).to_bits())
            })
            .is_ok()
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> f64 {
        self.map
            .get(&label_key(labels))
            .map(|g| f64::from_bits(g.load(Ordering::Acquire)))
            .unwrap_or(0.0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        header(out, name, help, "gauge");
        let mut rows: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), f64::from_bits(r.value().load(Ordering::Acquire))))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, val) in rows {
            let _ = writeln!(out, "{} {}", series(name, &label_str(&key)), fmt_f64(val));
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Cumulative counts, one per bound.
    pub buckets: Vec<u64>,
    pub count: u64,
    pub sum: f64,
}

pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Bounds must be ascending; they never change afterwards.
    pub fn new(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            map: DashMap::new(),
        }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe a value and increment cumulative buckets.
    ///
    /// Non-finite values are dropped.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) {
        if !v.is_finite() {
            return;
        }
        let n = self.bounds.len();
        let hist = self.map.entry(label_key(labels)).or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::AcqRel);
        add_f64(&hist.sum, v);

        // cumulative: every bucket whose bound is >= v
        for (i, &b) in self.bounds.iter().enumerate() {
            if v <= b {
                hist.buckets[i].fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    pub fn snapshot(&self, labels: &[(&str, &str)]) -> Option<HistogramSnapshot> {
        self.map.get(&label_key(labels)).map(|h| snapshot_of(&h))
    }

    /// Count and sum across every series.
    pub fn totals(&self) -> (u64, f64) {
        self.map.iter().fold((0, 0.0), |(count, sum), r| {
            let s = snapshot_of(r.value());
            (count + s.count, sum + s.sum)
        })
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        header(out, name, help, "histogram");
        let mut rows: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), snapshot_of(r.value())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, snap) in rows {
            let labels = label_str(&key);
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (le, count) in self.bounds.iter().zip(&snap.buckets) {
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, fmt_f64(*le), count);
            }
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, snap.count);
            let _ = writeln!(out, "{} {}", series(&format!("{}_sum", name), &labels), fmt_f64(snap.sum));
            let _ = writeln!(out, "{} {}", series(&format!("{}_count", name), &labels), snap.count);
        }
    }
}

fn snapshot_of(h: &AtomicHistogram) -> HistogramSnapshot {
    HistogramSnapshot {
        buckets: h.buckets.iter().map(|b| b.load(Ordering::Acquire)).collect(),
        count: h.count.load(Ordering::Acquire),
        sum: f64::from_bits(h.sum.load(Ordering::Acquire)),
    }
}

/// One prediction attempt, aggregated on arrival and not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub success: bool,
    pub inference_time_ms: f64,
    pub model_version: String,
    pub confidence: Option<f64>,
}

/// Derived statistics computed from the aggregate state.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub timestamp: DateTime<Utc>,
    pub active_connections: f64,
    pub total_predictions: PredictionTotals,
    /// Number of latency observations behind `avg_latency_seconds`.
    pub latency_observations: u64,
    /// `None` until at least one successful prediction was observed.
    pub avg_latency_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PredictionTotals {
    pub success: u64,
    pub error: u64,
}

/// Process-wide metric set, constructed once and shared by handle.
pub struct ModelMetrics {
    prefix: String,
    pub predictions_total: CounterVec,
    pub errors_total: CounterVec,
    pub inference_latency: HistogramVec, // seconds
    pub prediction_confidence: HistogramVec,
    pub feature_value: HistogramVec,
    pub active_connections: GaugeVec,
    pub model_memory_bytes: GaugeVec,
    pub cpu_usage: GaugeVec,
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new("mlops", "inference")
    }
}

impl ModelMetrics {
    /// Metric names are prefixed with `{namespace}_{subsystem}_`.
    pub fn new(namespace: &str, subsystem: &str) -> Self {
        let metrics = Self {
            prefix: format!("{}_{}", namespace, subsystem),
            predictions_total: CounterVec::default(),
            errors_total: CounterVec::default(),
            inference_latency: HistogramVec::new(&LATENCY_BUCKETS_SECONDS),
            prediction_confidence: HistogramVec::new(&CONFIDENCE_BUCKETS),
            feature_value: HistogramVec::new(&FEATURE_VALUE_BUCKETS),
            active_connections: GaugeVec::default(),
            model_memory_bytes: GaugeVec::default(),
            cpu_usage: GaugeVec::default(),
        };
        // unlabeled gauges are exported from the start
        metrics.active_connections.set(&[], 0.0);
        metrics.cpu_usage.set(&[], 0.0);
        metrics
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Aggregate one prediction attempt.
    pub fn record_prediction(
        &self,
        success: bool,
        inference_time_ms: f64,
        model_version: &str,
        confidence: Option<f64>,
    ) {
        let status = if success { "success" } else { "error" };
        self.predictions_total
            .inc(&[("model_version", model_version), ("status", status)]);

        if success {
            self.inference_latency
                .observe(&[("model_version", model_version)], inference_time_ms / 1000.0);
            if let Some(c) = confidence {
                self.prediction_confidence.observe(&[], c);
            }
        } else {
            self.record_error(PREDICTION_FAILED, model_version);
        }
    }

    pub fn record(&self, event: &MetricEvent) {
        self.record_prediction(
            event.success,
            event.inference_time_ms,
            &event.model_version,
            event.confidence,
        );
    }

    pub fn record_error(&self, error_type: &str, model_version: &str) {
        self.errors_total
            .inc(&[("error_type", error_type), ("model_version", model_version)]);
    }

    pub fn record_data_drift(&self, feature_name: &str, value: f64) {
        self.feature_value.observe(&[("feature_name", feature_name)], value);
    }

    pub fn record_connection(&self) {
        self.active_connections.inc(&[]);
    }

    /// Clamped at zero: an unmatched disconnection is logged and ignored.
    pub fn record_disconnection(&self) {
        if !self.active_connections.dec_floor_zero(&[]) {
            tracing::warn!("disconnection recorded without a matching connection");
        }
    }

    pub fn active_connections(&self) -> f64 {
        self.active_connections.get(&[])
    }

    pub fn set_model_memory(&self, model_version: &str, memory_bytes: u64) {
        self.model_memory_bytes
            .set(&[("model_version", model_version)], memory_bytes as f64);
    }

    pub fn set_cpu_usage(&self, cpu_percent: f64) {
        self.cpu_usage.set(&[], cpu_percent);
    }

    /// Set both resource gauges to absolute values.
    pub fn update_resource_usage(&self, model_version: &str, memory_bytes: u64, cpu_percent: f64) {
        self.set_model_memory(model_version, memory_bytes);
        self.set_cpu_usage(cpu_percent);
    }

    /// Aggregate view over the counters and the latency histogram.
    pub fn summary(&self) -> MetricsSummary {
        let (count, sum) = self.inference_latency.totals();
        MetricsSummary {
            timestamp: Utc::now(),
            active_connections: self.active_connections(),
            total_predictions: PredictionTotals {
                success: self.predictions_total.sum_where("status", "success"),
                error: self.predictions_total.sum_where("status", "error"),
            },
            latency_observations: count,
            avg_latency_seconds: (count > 0).then(|| sum / count as f64),
        }
    }

    /// Render every family in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let p = &self.prefix;
        let mut out = String::new();
        self.predictions_total
            .render(&format!("{p}_predictions_total"), "Total number of predictions", &mut out);
        self.errors_total
            .render(&format!("{p}_errors_total"), "Total number of errors", &mut out);
        self.inference_latency.render(
            &format!("{p}_inference_latency_seconds"),
            "Inference latency in seconds",
            &mut out,
        );
        self.prediction_confidence.render(
            &format!("{p}_prediction_confidence"),
            "Confidence score of predictions",
            &mut out,
        );
        self.feature_value
            .render(&format!("{p}_feature_value"), "Distribution of feature values", &mut out);
        self.active_connections.render(
            &format!("{p}_active_connections"),
            "Number of active connections",
            &mut out,
        );
        self.model_memory_bytes.render(
            &format!("{p}_model_memory_bytes"),
            "Memory usage of the model in bytes",
            &mut out,
        );
        self.cpu_usage
            .render(&format!("{p}_cpu_usage_percent"), "CPU usage percentage", &mut out);
        out
    }
}
