//! Bucket configuration access.
//!
//! `BucketConfigClient` is the only seam between the checker and a storage
//! backend. An unset configuration is reported as
//! `ComplianceError::ConfigNotFound`; every other failure is a query error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server-side encryption algorithm applied by remediation.
pub const DEFAULT_SSE_ALGORITHM: &str = "AES256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionRule {
    pub sse_algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

impl EncryptionRule {
    pub fn aes256() -> Self {
        Self {
            sse_algorithm: DEFAULT_SSE_ALGORITHM.to_string(),
            kms_key_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub rules: Vec<EncryptionRule>,
}

/// The four public-access-block flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicAccessBlock {
    #[serde(default)]
    pub block_public_acls: bool,
    #[serde(default)]
    pub ignore_public_acls: bool,
    #[serde(default)]
    pub block_public_policy: bool,
    #[serde(default)]
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn all_enabled() -> Self {
        Self {
            block_public_acls: true,
            ignore_public_acls: true,
            block_public_policy: true,
            restrict_public_buckets: true,
        }
    }

    pub fn is_fully_enabled(&self) -> bool {
        self.disabled_flags().is_empty()
    }

    /// Names of the flags that are off.
    pub fn disabled_flags(&self) -> Vec<&'static str> {
        [
            ("block_public_acls", self.block_public_acls),
            ("block_public_policy", self.block_public_policy),
            ("ignore_public_acls", self.ignore_public_acls),
            ("restrict_public_buckets", self.restrict_public_buckets),
        ]
        .into_iter()
        .filter(|(_, on)| !on)
        .map(|(name, _)| name)
        .collect()
    }
}

#[async_trait]
pub trait BucketConfigClient: Send + Sync {
    async fn get_encryption(&self, bucket: &str) -> Result<EncryptionConfig>;

    async fn get_public_access_block(&self, bucket: &str) -> Result<PublicAccessBlock>;

    /// Raw policy document text.
    async fn get_policy(&self, bucket: &str) -> Result<String>;

    async fn put_default_encryption(&self, bucket: &str, rule: EncryptionRule) -> Result<()>;

    async fn put_public_access_block(&self, bucket: &str, config: PublicAccessBlock) -> Result<()>;
}

#[async_trait]
impl<T: BucketConfigClient + ?Sized> BucketConfigClient for Arc<T> {
    async fn get_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        (**self).get_encryption(bucket).await
    }

    async fn get_public_access_block(&self, bucket: &str) -> Result<PublicAccessBlock> {
        (**self).get_public_access_block(bucket).await
    }

    async fn get_policy(&self, bucket: &str) -> Result<String> {
        (**self).get_policy(bucket).await
    }

    async fn put_default_encryption(&self, bucket: &str, rule: EncryptionRule) -> Result<()> {
        (**self).put_default_encryption(bucket, rule).await
    }

    async fn put_public_access_block(&self, bucket: &str, config: PublicAccessBlock) -> Result<()> {
        (**self).put_public_access_block(bucket, config).await
    }
}
