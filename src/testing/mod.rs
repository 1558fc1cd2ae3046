use serde_json::json;
use std::sync::Arc;

use crate::auth::{Identity, SessionClaims};
use crate::database::MemoryRecordStore;
use crate::identity::{DirectoryUser, StaticIdentityProvider, UserInfo};
use crate::storage::MemoryBlobStore;

/// Identity for `user_id` with a derived email address
pub fn identity(user_id: &str) -> Identity {
    let info = UserInfo {
        sub: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        given_name: user_id.to_string(),
        family_name: "Tester".to_string(),
        raw: json!({ "sub": user_id }),
    };
    Identity::from(SessionClaims::new(info, 1))
}

pub fn directory_user(user_id: &str) -> DirectoryUser {
    DirectoryUser {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        given_name: user_id.to_string(),
        family_name: "Tester".to_string(),
    }
}

/// In-memory backends shared by service tests
pub struct TestContext {
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub identity: Arc<StaticIdentityProvider>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            records: Arc::new(MemoryRecordStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            identity: Arc::new(StaticIdentityProvider::default()),
        }
    }

    /// Register accounts with the identity provider
    pub async fn with_users(self, user_ids: &[&str]) -> Self {
        for user_id in user_ids {
            self.identity.insert(directory_user(user_id)).await;
        }
        self
    }
}
