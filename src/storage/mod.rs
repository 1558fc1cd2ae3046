//! Object storage for project files.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Failed to presign request: {0}")]
    Presign(String),

    #[error("Object store request failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Time-limited URL for uploading `key`
    async fn presign_put(&self, key: &str, content_type: &str) -> Result<String, BlobError>;

    /// Time-limited URL for downloading `key`
    async fn presign_get(&self, key: &str) -> Result<String, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Key prefix shared by every object of a project
pub fn project_prefix(project_id: &str) -> String {
    format!("projects/{}/", project_id)
}

/// Object key for an uploaded file: `projects/{project_id}/{file_name}`.
///
/// Only the final path component of `file_name` is kept.
pub fn object_key(project_id: &str, file_name: &str) -> Result<String, BlobError> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(BlobError::InvalidKey(file_name.to_string()));
    }
    Ok(format!("{}{}", project_prefix(project_id), name))
}

/// True when `key` names an object stored under `project_id`
pub fn belongs_to_project(key: &str, project_id: &str) -> bool {
    key.strip_prefix(&project_prefix(project_id))
        .map(|rest| !rest.is_empty() && !rest.split('/').any(|seg| seg == ".."))
        .unwrap_or(false)
}
