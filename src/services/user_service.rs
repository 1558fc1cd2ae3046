use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ProjectAccess, ServiceError, ServiceResult};
use crate::auth::Identity;
use crate::database::models::UserProfile;
use crate::database::RecordStore;
use crate::identity::IdentityProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

pub struct UserService {
    records: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(records: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { records, identity }
    }

    /// Copy the caller's directory attributes into the user table, writing
    /// only when a displayed attribute changed.
    pub async fn sync_user(&self, identity: &Identity) -> ServiceResult<SyncOutcome> {
        let account = self.identity.get_user(&identity.user_id).await?;
        let fresh = UserProfile {
            user_id: identity.user_id.clone(),
            given_name: account.given_name,
            family_name: account.family_name,
            email: account.email,
            synced_at: Some(Utc::now()),
        };

        let outcome = match self.records.get_user(&identity.user_id).await? {
            None => SyncOutcome::Created,
            Some(existing) if existing.differs_from(&fresh) => SyncOutcome::Updated,
            Some(_) => SyncOutcome::Unchanged,
        };

        if outcome == SyncOutcome::Unchanged {
            debug!("User {} already in sync", identity.user_id);
        } else {
            self.records.put_user(&fresh).await?;
            info!("Synced user {} ({:?})", identity.user_id, outcome);
        }
        Ok(outcome)
    }

    /// Session claims for `/me`, with `current_role` when a project is
    /// given. The role is null when the caller has no access to it.
    pub async fn me(&self, identity: &Identity, project_id: Option<&str>) -> ServiceResult<Value> {
        let mut user = match &identity.claims.userinfo {
            Value::Object(map) if !map.is_empty() => Value::Object(map.clone()),
            _ => json!({
                "sub": identity.user_id,
                "email": identity.email,
                "given_name": identity.given_name,
                "family_name": identity.family_name,
            }),
        };

        if let Some(project_id) = project_id.filter(|p| !p.is_empty()) {
            let role = match ProjectAccess::load(self.records.as_ref(), project_id, identity).await {
                Ok(access) => Value::String(access.role.as_str().to_string()),
                Err(ServiceError::Forbidden(_)) | Err(ServiceError::NotFound(_)) => Value::Null,
                Err(e) => return Err(e),
            };
            user["current_role"] = role;
        }

        Ok(json!({ "authenticated": true, "user": user }))
    }
}
