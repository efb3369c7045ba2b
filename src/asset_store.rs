use crate::config::S3Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Remote object store for uploaded profile photos.
///
/// `upload` stores the blob under the configured destination folder and
/// returns a viewable reference URL for the invite record. Uploads are not
/// transactional and are never rolled back on later pipeline failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, filename: &str) -> Result<String>;
}

/// S3-backed asset store
pub struct S3AssetStore {
    client: S3Client,
    bucket: String,
    key_prefix: String,
    url_expiry: Duration,
}

impl S3AssetStore {
    /// Create a new asset store client
    pub async fn new(config: &S3Config) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            prefix = %config.key_prefix,
            "S3 asset store initialized"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.clone(),
            url_expiry: Duration::from_secs(config.presigned_url_expiry_secs),
        })
    }

    /// Object key for a photo: `{prefix}/{sanitized_stem}.{sanitized_ext}`
    fn object_key(&self, filename: &str) -> String {
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => (filename, "bin"),
        };

        format!(
            "{}/{}.{}",
            self.key_prefix,
            sanitize_path_component(stem),
            sanitize_path_component(ext)
        )
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    #[instrument(skip(self, bytes), fields(filename = %filename, size_bytes = bytes.len()))]
    async fn upload(&self, bytes: Vec<u8>, content_type: &str, filename: &str) -> Result<String> {
        let key = self.object_key(filename);

        debug!(key = %key, "Uploading photo to S3");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .context("Failed to upload photo to S3")?;

        // Viewable reference URL stored in the invite record
        let presigning_config = PresigningConfig::expires_in(self.url_expiry)
            .context("Failed to create presigning config")?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning_config)
            .await
            .context("Failed to generate photo reference URL")?;

        let url = presigned.uri().to_string();

        info!(key = %key, "Photo uploaded");

        Ok(url)
    }
}

/// Sanitize a path component to prevent path traversal
fn sanitize_path_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
