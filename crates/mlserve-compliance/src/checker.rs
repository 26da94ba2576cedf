//! Bucket compliance checks and the single remediation pass.
//!
//! Three independent read checks run against one bucket. A failed query is
//! `Indeterminate`: it is reported but never counted as a violation and never
//! read as compliant. With remediation enabled, the checker writes safe
//! defaults for exactly the categories that were flagged, then re-runs the
//! encryption and public-access checks once. No retries, no rollback.

use std::fmt;

use serde::Serialize;

use crate::client::{BucketConfigClient, EncryptionRule, PublicAccessBlock};
use crate::policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Encryption,
    PublicAccess,
    Policy,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Encryption => "encryption",
            CheckKind::PublicAccess => "public_access",
            CheckKind::Policy => "policy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CheckOutcome {
    Compliant,
    NonCompliant(String),
    Indeterminate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
}

impl CheckResult {
    pub fn violation(&self) -> Option<&str> {
        match &self.outcome {
            CheckOutcome::NonCompliant(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn indeterminate(&self) -> Option<&str> {
        match &self.outcome {
            CheckOutcome::Indeterminate(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Default encryption with AES256.
    EnableEncryption,
    /// All four public-access-block flags on.
    BlockPublicAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationRecord {
    pub action: RemediationAction,
    /// `None` when the write succeeded.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    /// No violation found, but at least one check could not run.
    Indeterminate,
    /// Violations were found and the re-check came back clean.
    Fixed,
    /// Violations or indeterminate checks remain after remediation.
    PartiallyFixed,
}

impl ComplianceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non-compliant",
            ComplianceStatus::Indeterminate => "indeterminate",
            ComplianceStatus::Fixed => "fixed",
            ComplianceStatus::PartiallyFixed => "partially fixed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub bucket: String,
    pub initial: Vec<CheckResult>,
    pub remediations: Vec<RemediationRecord>,
    /// Encryption and public-access results after remediation.
    pub recheck: Option<Vec<CheckResult>>,
}

impl ComplianceReport {
    /// Violations found by the first pass.
    pub fn violations(&self) -> Vec<&str> {
        self.initial.iter().filter_map(CheckResult::violation).collect()
    }

    /// Violations still standing: the re-check when there was one, else the first pass.
    pub fn remaining_violations(&self) -> Vec<&str> {
        self.final_results().filter_map(CheckResult::violation).collect()
    }

    /// Checks that could not complete in the final state. The policy check is
    /// not re-run, so an indeterminate policy result carries over.
    pub fn indeterminate(&self) -> Vec<&str> {
        self.final_results().filter_map(CheckResult::indeterminate).collect()
    }

    fn final_results(&self) -> Box<dyn Iterator<Item = &CheckResult> + '_> {
        match &self.recheck {
            Some(recheck) => Box::new(recheck.iter().chain(
                self.initial
                    .iter()
                    .filter(|r| r.kind == CheckKind::Policy && r.indeterminate().is_some()),
            )),
            None => Box::new(self.initial.iter()),
        }
    }

    pub fn status(&self) -> ComplianceStatus {
        let clean = self.remaining_violations().is_empty();
        let complete = self.indeterminate().is_empty();
        // a failed write is never reported as fixed, whatever the recheck saw
        let clean = clean && self.remediations.iter().all(|r| r.error.is_none());
        match (&self.recheck, clean, complete) {
            (Some(_), true, true) => ComplianceStatus::Fixed,
            (Some(_), _, _) => ComplianceStatus::PartiallyFixed,
            (None, true, true) => ComplianceStatus::Compliant,
            (None, false, _) => ComplianceStatus::NonCompliant,
            (None, true, false) => ComplianceStatus::Indeterminate,
        }
    }

    /// Compliant now, either as found or after remediation.
    pub fn is_compliant(&self) -> bool {
        matches!(
            self.status(),
            ComplianceStatus::Compliant | ComplianceStatus::Fixed
        )
    }
}

fn write_results(f: &mut fmt::Formatter<'_>, results: &[CheckResult]) -> fmt::Result {
    for r in results {
        match &r.outcome {
            CheckOutcome::Compliant => writeln!(f, "  [ok]   {}", r.kind.as_str())?,
            CheckOutcome::NonCompliant(v) => writeln!(f, "  [FAIL] {}: {}", r.kind.as_str(), v)?,
            CheckOutcome::Indeterminate(v) => writeln!(f, "  [??]   {}: {}", r.kind.as_str(), v)?,
        }
    }
    Ok(())
}

impl fmt::Display for ComplianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bucket: {}", self.bucket)?;
        write_results(f, &self.initial)?;

        let violations = self.violations();
        if !violations.is_empty() {
            writeln!(f, "{} violation(s):", violations.len())?;
            for (i, v) in violations.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, v)?;
            }
        }

        if !self.remediations.is_empty() {
            writeln!(f, "remediation:")?;
            for r in &self.remediations {
                match &r.error {
                    None => writeln!(f, "  {:?}: applied", r.action)?,
                    Some(e) => writeln!(f, "  {:?}: failed: {}", r.action, e)?,
                }
            }
        }
        if let Some(recheck) = &self.recheck {
            writeln!(f, "re-check:")?;
            write_results(f, recheck)?;
        }

        write!(f, "status: {}", self.status().as_str())
    }
}

pub struct ComplianceChecker<C> {
    client: C,
    bucket: String,
}

impl<C: BucketConfigClient> ComplianceChecker<C> {
    pub fn new(client: C, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn check_encryption(&self) -> CheckResult {
        let outcome = match self.client.get_encryption(&self.bucket).await {
            Ok(cfg) => match cfg.rules.first() {
                Some(rule) => {
                    tracing::info!(bucket = %self.bucket, algorithm = %rule.sse_algorithm, "default encryption enabled");
                    CheckOutcome::Compliant
                }
                None => CheckOutcome::NonCompliant("default encryption is not enabled".into()),
            },
            Err(e) if e.is_not_found() => {
                CheckOutcome::NonCompliant("default encryption is not enabled".into())
            }
            Err(e) => CheckOutcome::Indeterminate(format!("encryption query failed: {e}")),
        };
        CheckResult {
            kind: CheckKind::Encryption,
            outcome,
        }
    }

    pub async fn check_public_access(&self) -> CheckResult {
        let outcome = match self.client.get_public_access_block(&self.bucket).await {
            Ok(pab) if pab.is_fully_enabled() => CheckOutcome::Compliant,
            Ok(pab) => CheckOutcome::NonCompliant(format!(
                "public access block incomplete: {}",
                pab.disabled_flags().join(", ")
            )),
            Err(e) if e.is_not_found() => {
                CheckOutcome::NonCompliant("public access block is not configured".into())
            }
            Err(e) => CheckOutcome::Indeterminate(format!("public access block query failed: {e}")),
        };
        CheckResult {
            kind: CheckKind::PublicAccess,
            outcome,
        }
    }

    pub async fn check_policy(&self) -> CheckResult {
        let outcome = match self.client.get_policy(&self.bucket).await {
            Ok(text) => match policy::public_statements(&text) {
                Ok(public) if public.is_empty() => CheckOutcome::Compliant,
                Ok(public) => CheckOutcome::NonCompliant(format!(
                    "bucket policy allows public access ({})",
                    public.join(", ")
                )),
                Err(e) => CheckOutcome::Indeterminate(format!("bucket policy could not be parsed: {e}")),
            },
            Err(e) if e.is_not_found() => CheckOutcome::Compliant,
            Err(e) => CheckOutcome::Indeterminate(format!("bucket policy query failed: {e}")),
        };
        CheckResult {
            kind: CheckKind::Policy,
            outcome,
        }
    }

    /// Run all checks; with `remediate`, apply one correction pass and re-check.
    pub async fn run(&self, remediate: bool) -> ComplianceReport {
        let initial = vec![
            self.check_encryption().await,
            self.check_public_access().await,
            self.check_policy().await,
        ];
        let mut report = ComplianceReport {
            bucket: self.bucket.clone(),
            initial,
            remediations: Vec::new(),
            recheck: None,
        };

        let actions = planned_actions(&report.initial);
        if !remediate || actions.is_empty() {
            return report;
        }

        for action in actions {
            report.remediations.push(self.apply(action).await);
        }
        report.recheck = Some(vec![
            self.check_encryption().await,
            self.check_public_access().await,
        ]);

        tracing::info!(bucket = %self.bucket, status = report.status().as_str(), "remediation pass finished");
        report
    }

    async fn apply(&self, action: RemediationAction) -> RemediationRecord {
        let res = match action {
            RemediationAction::EnableEncryption => {
                self.client
                    .put_default_encryption(&self.bucket, EncryptionRule::aes256())
                    .await
            }
            RemediationAction::BlockPublicAccess => {
                self.client
                    .put_public_access_block(&self.bucket, PublicAccessBlock::all_enabled())
                    .await
            }
        };
        match res {
            Ok(()) => {
                tracing::info!(bucket = %self.bucket, ?action, "remediation applied");
                RemediationRecord { action, error: None }
            }
            Err(e) => {
                tracing::error!(bucket = %self.bucket, ?action, error = %e, "remediation failed");
                RemediationRecord {
                    action,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Corrections for exactly the flagged categories. A public policy is closed
/// off by the public-access block.
fn planned_actions(results: &[CheckResult]) -> Vec<RemediationAction> {
    let flagged = |kind: CheckKind| {
        results
            .iter()
            .any(|r| r.kind == kind && r.violation().is_some())
    };

    let mut actions = Vec::new();
    if flagged(CheckKind::Encryption) {
        actions.push(RemediationAction::EnableEncryption);
    }
    if flagged(CheckKind::PublicAccess) || flagged(CheckKind::Policy) {
        actions.push(RemediationAction::BlockPublicAccess);
    }
    actions
}
