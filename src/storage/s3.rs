use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{BlobError, BlobStore};
use crate::config::StorageConfig;

pub struct S3BlobStore {
    client: Client,
    bucket_name: String,
    expires_in: Duration,
}

impl S3BlobStore {
    pub fn new(config: &StorageConfig, sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
            bucket_name: config.bucket.clone(),
            expires_in: Duration::from_secs(config.presign_expiry_secs),
        }
    }

    fn presigning_config(&self) -> Result<PresigningConfig, BlobError> {
        PresigningConfig::expires_in(self.expires_in).map_err(|e| BlobError::Presign(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn presign_put(&self, key: &str, content_type: &str) -> Result<String, BlobError> {
        debug!("Presigning PUT for {}/{}", self.bucket_name, key);
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(self.presigning_config()?)
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!("S3 presign PUT failed - Bucket: {}, Key: {}, Error: {}", self.bucket_name, key, message);
                BlobError::Presign(message)
            })?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, key: &str) -> Result<String, BlobError> {
        debug!("Presigning GET for {}/{}", self.bucket_name, key);
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(self.presigning_config()?)
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!("S3 presign GET failed - Bucket: {}, Key: {}, Error: {}", self.bucket_name, key, message);
                BlobError::Presign(message)
            })?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                error!("S3 DELETE failed - Bucket: {}, Key: {}, Error: {}", self.bucket_name, key, message);
                BlobError::Upstream(message)
            })?;

        info!("Deleted object {}/{}", self.bucket_name, key);
        Ok(())
    }
}
