//! Periodic resource sampling.
//!
//! - `cpu_usage_percent`: process CPU time between two samples, read from
//!   `/proc/self/stat` (Linux only; elsewhere the gauge stays at 0).
//! - `model_memory_bytes{model_version}`: artifact size of every registered model.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::app_state::AppState;

/// Kernel clock ticks per second (`USER_HZ`), fixed at 100 on Linux.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

/// Total user + system CPU ticks from a `/proc/<pid>/stat` line.
pub fn parse_proc_stat_ticks(stat: &str) -> Option<u64> {
    // comm may contain spaces; fields after the closing paren start at `state`
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

fn read_cpu_ticks() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    parse_proc_stat_ticks(&stat)
}

/// CPU percent between two tick readings taken `elapsed` apart.
pub fn cpu_percent(prev_ticks: u64, ticks: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let used = ticks.saturating_sub(prev_ticks) as f64 / CLOCK_TICKS_PER_SEC;
    used / secs * 100.0
}

/// Publish per-model memory gauges from the current registry snapshot.
pub fn publish_model_memory(state: &AppState) {
    let metrics = state.metrics();
    for entry in state.registry().entries() {
        metrics.set_model_memory(&entry.version, entry.artifact_bytes);
    }
}

pub fn spawn_sampler(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        let mut last: Option<(u64, Instant)> = None;

        loop {
            ticker.tick().await;
            publish_model_memory(&state);

            let Some(ticks) = read_cpu_ticks() else { continue };
            let now = Instant::now();
            if let Some((prev, at)) = last {
                let pct = cpu_percent(prev, ticks, now.duration_since(at));
                state.metrics().set_cpu_usage(pct);
                tracing::trace!(cpu_percent = pct, "resource sample");
            }
            last = Some((ticks, now));
        }
    })
}
