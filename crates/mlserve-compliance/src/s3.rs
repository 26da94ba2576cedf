//! Amazon S3 backend (`aws` feature).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::types::{
    PublicAccessBlockConfiguration, ServerSideEncryption, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule,
};
use aws_sdk_s3::Client as S3Client;

use crate::client::{BucketConfigClient, EncryptionConfig, EncryptionRule, PublicAccessBlock};
use crate::error::{ComplianceError, Result};
use crate::memory::{ENCRYPTION_NOT_FOUND, POLICY_NOT_FOUND, PUBLIC_ACCESS_BLOCK_NOT_FOUND};

pub struct S3ConfigClient {
    client: S3Client,
}

impl S3ConfigClient {
    /// Client for `region` using the default credential chain.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: S3Client::new(&config),
        }
    }

    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

/// `ConfigNotFound` when the error code is `absent_code`, else a query error.
fn query_error<E>(err: E, absent_code: &str) -> ComplianceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match err.code() {
        Some(code) if code == absent_code => ComplianceError::ConfigNotFound(code.to_string()),
        code => ComplianceError::query(
            code.unwrap_or("Unknown"),
            err.message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
        ),
    }
}

fn write_error<E>(err: E) -> ComplianceError
where
    E: std::error::Error + 'static,
{
    ComplianceError::Remediation(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl BucketConfigClient for S3ConfigClient {
    async fn get_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        let out = self
            .client
            .get_bucket_encryption()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| query_error(e, ENCRYPTION_NOT_FOUND))?;

        let rules = out
            .server_side_encryption_configuration()
            .map(|cfg| {
                cfg.rules()
                    .iter()
                    .filter_map(|r| r.apply_server_side_encryption_by_default())
                    .map(|d| EncryptionRule {
                        sse_algorithm: d.sse_algorithm().as_str().to_string(),
                        kms_key_id: d.kms_master_key_id().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(EncryptionConfig { rules })
    }

    async fn get_public_access_block(&self, bucket: &str) -> Result<PublicAccessBlock> {
        let out = self
            .client
            .get_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| query_error(e, PUBLIC_ACCESS_BLOCK_NOT_FOUND))?;

        let cfg = out
            .public_access_block_configuration()
            .ok_or_else(|| ComplianceError::ConfigNotFound(PUBLIC_ACCESS_BLOCK_NOT_FOUND.into()))?;
        Ok(PublicAccessBlock {
            block_public_acls: cfg.block_public_acls().unwrap_or(false),
            ignore_public_acls: cfg.ignore_public_acls().unwrap_or(false),
            block_public_policy: cfg.block_public_policy().unwrap_or(false),
            restrict_public_buckets: cfg.restrict_public_buckets().unwrap_or(false),
        })
    }

    async fn get_policy(&self, bucket: &str) -> Result<String> {
        let out = self
            .client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| query_error(e, POLICY_NOT_FOUND))?;

        out.policy()
            .map(str::to_string)
            .ok_or_else(|| ComplianceError::ConfigNotFound(POLICY_NOT_FOUND.into()))
    }

    async fn put_default_encryption(&self, bucket: &str, rule: EncryptionRule) -> Result<()> {
        let default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::from(rule.sse_algorithm.as_str()))
            .set_kms_master_key_id(rule.kms_key_id)
            .build()
            .map_err(write_error)?;
        let config = ServerSideEncryptionConfiguration::builder()
            .rules(
                ServerSideEncryptionRule::builder()
                    .apply_server_side_encryption_by_default(default)
                    .build(),
            )
            .build()
            .map_err(write_error)?;

        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(config)
            .send()
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn put_public_access_block(&self, bucket: &str, config: PublicAccessBlock) -> Result<()> {
        let block = PublicAccessBlockConfiguration::builder()
            .block_public_acls(config.block_public_acls)
            .ignore_public_acls(config.ignore_public_acls)
            .block_public_policy(config.block_public_policy)
            .restrict_public_buckets(config.restrict_public_buckets)
            .build();

        self.client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(block)
            .send()
            .await
            .map_err(write_error)?;
        Ok(())
    }
}
