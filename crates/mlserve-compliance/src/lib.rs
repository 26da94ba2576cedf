//! Storage-bucket compliance checks.
//!
//! Verifies that a bucket has default encryption, a fully enabled
//! public-access block and no public policy statement, and can apply safe
//! defaults for the categories it flags. Backends implement
//! [`BucketConfigClient`]; the S3 one sits behind the `aws` feature.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod checker;
pub mod client;
pub mod error;
pub mod memory;
pub mod policy;
#[cfg(feature = "aws")]
pub mod s3;

pub use checker::{
    CheckKind, CheckOutcome, CheckResult, ComplianceChecker, ComplianceReport, ComplianceStatus,
    RemediationAction, RemediationRecord,
};
pub use client::{BucketConfigClient, EncryptionConfig, EncryptionRule, PublicAccessBlock};
pub use error::{ComplianceError, Result};
pub use memory::{BucketState, InMemoryBucket, Operation, StateFileClient};
#[cfg(feature = "aws")]
pub use s3::S3ConfigClient;
