//! services/api/src/adapters/storage.rs
//!
//! The `ObjectStore` port over an S3-compatible bucket (Google Cloud Storage
//! interoperability, R2, MinIO, ...) using `aws-sdk-s3`.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Credentials, SharedCredentialsProvider};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, Config};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, error, info};
use trip_mate_core::paths::{firebase_object_path, path_under_base};
use trip_mate_core::ports::{ObjectStore, PortError, PortResult};

/// Characters escaped inside each path segment of a public URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "trip-mate",
        );
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();
        info!(bucket = %config.bucket, endpoint = %config.endpoint, "object store client ready");
        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a client from an already assembled SDK config.
    pub fn from_parts(config: Config, bucket: &str, public_base_url: &str) -> Self {
        Self {
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn public_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<String> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(path, bucket = %self.bucket, error = ?e, "upload failed");
                PortError::UploadFailed(format!("Failed to upload {}: {}", path, e))
            })?;
        debug!(path, size, "object uploaded");
        Ok(self.public_url(path))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        // S3 reports success for missing keys, which keeps this idempotent.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PortError::StoreUnavailable(format!("Failed to delete {}: {}", path, e)))?;
        debug!(path, "object deleted");
        Ok(())
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        path_under_base(url, &self.public_base_url).or_else(|| firebase_object_path(url))
    }
}
