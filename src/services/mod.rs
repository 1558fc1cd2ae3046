pub mod access;
pub mod file_service;
pub mod project_service;
pub mod team_service;
pub mod user_service;

pub use access::ProjectAccess;
pub use file_service::{DeleteFileOutcome, FileService};
pub use project_service::ProjectService;
pub use team_service::{TeamMember, TeamService};
pub use user_service::{SyncOutcome, UserService};

use std::collections::HashMap;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::directory::DirectoryError;
use crate::identity::IdentityError;
use crate::storage::BlobError;

/// Errors shared by every service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.into());
        ServiceError::Validation {
            message: "Invalid field value".to_string(),
            field_errors: Some(field_errors),
        }
    }

    pub fn invalid_fields(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Database(DatabaseError::Serialization(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
