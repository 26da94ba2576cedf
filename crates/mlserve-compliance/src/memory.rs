//! State-backed clients: an in-memory bucket store and a YAML state file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::client::{BucketConfigClient, EncryptionConfig, EncryptionRule, PublicAccessBlock};
use crate::error::{ComplianceError, Result};

pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
pub const ENCRYPTION_NOT_FOUND: &str = "ServerSideEncryptionConfigurationNotFoundError";
pub const PUBLIC_ACCESS_BLOCK_NOT_FOUND: &str = "NoSuchPublicAccessBlockConfiguration";
pub const POLICY_NOT_FOUND: &str = "NoSuchBucketPolicy";

/// Configuration of one bucket. `None` means the configuration is unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketState {
    #[serde(default)]
    pub encryption: Option<EncryptionConfig>,
    #[serde(default)]
    pub public_access_block: Option<PublicAccessBlock>,
    #[serde(default)]
    pub policy: Option<String>,
}

/// Client operations, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetEncryption,
    GetPublicAccessBlock,
    GetPolicy,
    PutEncryption,
    PutPublicAccessBlock,
}

/// In-process bucket store.
///
/// Failures injected with [`InMemoryBucket::fail`] are returned by every
/// later call of that operation until [`InMemoryBucket::heal`].
#[derive(Debug, Default)]
pub struct InMemoryBucket {
    buckets: DashMap<String, BucketState>,
    failures: DashMap<Operation, (String, String)>,
    calls: DashMap<Operation, AtomicUsize>,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, name: impl Into<String>, state: BucketState) -> Self {
        self.insert(name, state);
        self
    }

    pub fn insert(&self, name: impl Into<String>, state: BucketState) {
        self.buckets.insert(name.into(), state);
    }

    pub fn state(&self, name: &str) -> Option<BucketState> {
        self.buckets.get(name).map(|s| s.clone())
    }

    pub fn fail(&self, op: Operation, code: impl Into<String>, message: impl Into<String>) {
        self.failures.insert(op, (code.into(), message.into()));
    }

    pub fn heal(&self, op: Operation) {
        self.failures.remove(&op);
    }

    /// How many times `op` was attempted, failed attempts included.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls
            .get(&op)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn snapshot(&self) -> BTreeMap<String, BucketState> {
        self.buckets
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    fn enter(&self, op: Operation) -> Result<()> {
        self.calls
            .entry(op)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);

        match self.failures.get(&op) {
            Some(f) => {
                let (code, message) = f.value().clone();
                Err(match op {
                    Operation::PutEncryption | Operation::PutPublicAccessBlock => {
                        ComplianceError::Remediation(format!("{code}: {message}"))
                    }
                    _ => ComplianceError::query(code, message),
                })
            }
            None => Ok(()),
        }
    }

    fn read<T>(&self, bucket: &str, op: Operation, f: impl FnOnce(&BucketState) -> Result<T>) -> Result<T> {
        self.enter(op)?;
        let state = self
            .buckets
            .get(bucket)
            .ok_or_else(|| ComplianceError::query(NO_SUCH_BUCKET, format!("bucket {bucket} does not exist")))?;
        f(&state)
    }

    /// Apply `f` to a copy of the bucket's state without storing it.
    fn staged(&self, bucket: &str, op: Operation, f: impl FnOnce(&mut BucketState)) -> Result<BucketState> {
        self.enter(op)?;
        let mut state = self.state(bucket).ok_or_else(|| {
            ComplianceError::Remediation(format!("{NO_SUCH_BUCKET}: bucket {bucket} does not exist"))
        })?;
        f(&mut state);
        Ok(state)
    }

    fn write(&self, bucket: &str, op: Operation, f: impl FnOnce(&mut BucketState)) -> Result<()> {
        let state = self.staged(bucket, op, f)?;
        self.insert(bucket, state);
        Ok(())
    }
}

#[async_trait]
impl BucketConfigClient for InMemoryBucket {
    async fn get_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        self.read(bucket, Operation::GetEncryption, |s| {
            s.encryption
                .clone()
                .ok_or_else(|| ComplianceError::ConfigNotFound(ENCRYPTION_NOT_FOUND.into()))
        })
    }

    async fn get_public_access_block(&self, bucket: &str) -> Result<PublicAccessBlock> {
        self.read(bucket, Operation::GetPublicAccessBlock, |s| {
            s.public_access_block
                .ok_or_else(|| ComplianceError::ConfigNotFound(PUBLIC_ACCESS_BLOCK_NOT_FOUND.into()))
        })
    }

    async fn get_policy(&self, bucket: &str) -> Result<String> {
        self.read(bucket, Operation::GetPolicy, |s| {
            s.policy
                .clone()
                .ok_or_else(|| ComplianceError::ConfigNotFound(POLICY_NOT_FOUND.into()))
        })
    }

    async fn put_default_encryption(&self, bucket: &str, rule: EncryptionRule) -> Result<()> {
        self.write(bucket, Operation::PutEncryption, |s| {
            s.encryption = Some(EncryptionConfig { rules: vec![rule] });
        })
    }

    async fn put_public_access_block(&self, bucket: &str, config: PublicAccessBlock) -> Result<()> {
        self.write(bucket, Operation::PutPublicAccessBlock, |s| {
            s.public_access_block = Some(config);
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateDocument {
    #[serde(default)]
    buckets: BTreeMap<String, BucketState>,
}

/// Buckets described by a YAML document:
///
/// ```yaml
/// buckets:
///   artifacts:
///     encryption: { rules: [{ sse_algorithm: AES256 }] }
///     public_access_block: { block_public_acls: true }
///     policy: '{"Statement": []}'
/// ```
///
/// Remediation writes are saved back to the same file.
#[derive(Debug)]
pub struct StateFileClient {
    path: PathBuf,
    inner: InMemoryBucket,
}

impl StateFileClient {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ComplianceError::Backend(format!("read {}: {e}", path.display())))?;
        let doc: StateDocument = serde_yaml::from_str(&raw)
            .map_err(|e| ComplianceError::Backend(format!("parse {}: {e}", path.display())))?;

        let inner = InMemoryBucket::new();
        for (name, state) in doc.buckets {
            inner.insert(name, state);
        }
        tracing::debug!(path = %path.display(), "bucket state loaded");
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self, bucket: &str) -> Option<BucketState> {
        self.inner.state(bucket)
    }

    /// Persist the change first; the in-memory state only moves once the
    /// file has been written.
    async fn commit(&self, bucket: &str, op: Operation, f: impl FnOnce(&mut BucketState)) -> Result<()> {
        let state = self.inner.staged(bucket, op, f)?;
        let mut buckets = self.inner.snapshot();
        buckets.insert(bucket.to_string(), state.clone());

        let text = serde_yaml::to_string(&StateDocument { buckets })
            .map_err(|e| ComplianceError::Backend(e.to_string()))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| ComplianceError::Remediation(format!("write {}: {e}", self.path.display())))?;

        self.inner.insert(bucket, state);
        Ok(())
    }
}

#[async_trait]
impl BucketConfigClient for StateFileClient {
    async fn get_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        self.inner.get_encryption(bucket).await
    }

    async fn get_public_access_block(&self, bucket: &str) -> Result<PublicAccessBlock> {
        self.inner.get_public_access_block(bucket).await
    }

    async fn get_policy(&self, bucket: &str) -> Result<String> {
        self.inner.get_policy(bucket).await
    }

    async fn put_default_encryption(&self, bucket: &str, rule: EncryptionRule) -> Result<()> {
        self.commit(bucket, Operation::PutEncryption, |s| {
            s.encryption = Some(EncryptionConfig { rules: vec![rule] });
        })
        .await
    }

    async fn put_public_access_block(&self, bucket: &str, config: PublicAccessBlock) -> Result<()> {
        self.commit(bucket, Operation::PutPublicAccessBlock, |s| {
            s.public_access_block = Some(config);
        })
        .await
    }
}
