use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use super::{DirectoryUser, IdentityError, IdentityProvider, UserInfo};

/// Fixed account list for local development and tests.
///
/// Login skips the provider round trip: the authorization URL points straight
/// back at the callback with the first account's id as the code, and any
/// known account id is accepted as a code.
#[derive(Default)]
pub struct StaticIdentityProvider {
    users: RwLock<Vec<DirectoryUser>>,
}

impl StaticIdentityProvider {
    pub fn new(users: Vec<DirectoryUser>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Parse `sub|email|given_name|family_name` entries; malformed ones are skipped.
    pub fn from_entries(entries: &[String]) -> Self {
        let users = entries
            .iter()
            .filter_map(|entry| {
                let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
                match parts.as_slice() {
                    [sub, email, given, family] if !sub.is_empty() => Some(DirectoryUser {
                        user_id: sub.to_string(),
                        email: email.to_string(),
                        given_name: given.to_string(),
                        family_name: family.to_string(),
                    }),
                    _ => {
                        tracing::warn!("Ignoring malformed static user entry '{}'", entry);
                        None
                    }
                }
            })
            .collect();
        Self::new(users)
    }

    pub async fn insert(&self, user: DirectoryUser) {
        let mut users = self.users.write().await;
        users.retain(|u| u.user_id != user.user_id);
        users.push(user);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, IdentityError> {
        let users = self.users.read().await;
        let user = users
            .first()
            .ok_or_else(|| IdentityError::Configuration("no static users configured".to_string()))?;

        let url = Url::parse_with_params(redirect_uri, &[("code", user.user_id.as_str()), ("state", state)])
            .map_err(|e| IdentityError::Configuration(format!("redirect uri: {}", e)))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<UserInfo, IdentityError> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| u.user_id == code)
            .ok_or(IdentityError::InvalidCode)?;

        Ok(UserInfo {
            sub: user.user_id.clone(),
            email: user.email.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            raw: json!({
                "sub": user.user_id,
                "email": user.email,
                "given_name": user.given_name,
                "family_name": user.family_name,
                "email_verified": true,
            }),
        })
    }

    fn logout_url(&self) -> Option<String> {
        None
    }

    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, IdentityError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, IdentityError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
