//! Identity provider seam: OIDC login plus account directory lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod cognito;
pub mod oidc;
pub mod static_provider;

pub use cognito::CognitoIdentityProvider;
pub use oidc::OidcClient;
pub use static_provider::StaticIdentityProvider;

/// Attribute value used when the directory has no value for a field
pub const UNKNOWN_ATTRIBUTE: &str = "unknown";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid authorization code")]
    InvalidCode,

    #[error("Identity provider misconfigured: {0}")]
    Configuration(String),

    #[error("Identity provider request failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Upstream(err.to_string())
    }
}

/// Claims returned by the provider's user-info endpoint after login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    /// Complete claims object, kept for `/me`
    pub raw: Value,
}

impl UserInfo {
    pub fn from_claims(raw: Value) -> Result<Self, IdentityError> {
        let text = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let sub = text("sub");
        if sub.is_empty() {
            return Err(IdentityError::Upstream("user-info response has no 'sub' claim".to_string()));
        }

        Ok(Self {
            email: text("email"),
            given_name: text("given_name"),
            family_name: text("family_name"),
            sub,
            raw,
        })
    }
}

/// An account as seen by the directory API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub user_id: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

impl DirectoryUser {
    /// Build from `(name, value)` attribute pairs; missing ones become "unknown".
    pub fn from_attributes<'a, I>(user_id: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut user = Self {
            user_id: user_id.to_string(),
            email: UNKNOWN_ATTRIBUTE.to_string(),
            given_name: UNKNOWN_ATTRIBUTE.to_string(),
            family_name: UNKNOWN_ATTRIBUTE.to_string(),
        };
        for (name, value) in attributes {
            let Some(value) = value else { continue };
            match name {
                "sub" => user.user_id = value.to_string(),
                "email" => user.email = value.to_string(),
                "given_name" => user.given_name = value.to_string(),
                "family_name" => user.family_name = value.to_string(),
                _ => {}
            }
        }
        user
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to in order to log in
    async fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, IdentityError>;

    /// Trade an authorization code for the user's claims
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<UserInfo, IdentityError>;

    /// Provider logout URL, if the provider has one
    fn logout_url(&self) -> Option<String>;

    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, IdentityError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, IdentityError>;
}
