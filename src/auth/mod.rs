use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::identity::UserInfo;

/// Session token claims: the identity provider's user-info plus lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Raw user-info object as returned by the provider
    #[serde(default)]
    pub userinfo: Value,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(user: UserInfo, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user.sub,
            email: user.email,
            given_name: user.given_name,
            family_name: user.family_name,
            userinfo: user.raw,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Caller identity for one request, built from a verified session token
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub claims: SessionClaims,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            given_name: claims.given_name.clone(),
            family_name: claims.family_name.clone(),
            claims,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session secret not configured")]
    InvalidSecret,

    #[error("Session token generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

pub fn issue_session_token(claims: &SessionClaims, security: &SecurityConfig) -> Result<String, SessionError> {
    let secret = &security.session_secret;

    if secret.is_empty() {
        return Err(SessionError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| SessionError::TokenGeneration(e.to_string()))
}

pub fn decode_session_token(token: &str, security: &SecurityConfig) -> Result<SessionClaims, SessionError> {
    let secret = &security.session_secret;

    if secret.is_empty() {
        return Err(SessionError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &decoding_key, &validation)
        .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    fn user() -> UserInfo {
        UserInfo {
            sub: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            raw: json!({ "sub": "user-1", "email_verified": true }),
        }
    }

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let security = AppConfig::for_tests().security;
        let claims = SessionClaims::new(user(), 1);
        let token = issue_session_token(&claims, &security).unwrap();
        let decoded = decode_session_token(&token, &security).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.userinfo["email_verified"], true);
    }

    #[test]
    fn identity_takes_user_id_from_subject() {
        let identity = Identity::from(SessionClaims::new(user(), 1));
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.email, "ada@example.com");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let security = AppConfig::for_tests().security;
        let mut other = security.clone();
        other.session_secret = "another-secret".to_string();

        let token = issue_session_token(&SessionClaims::new(user(), 1), &other).unwrap();
        assert!(matches!(
            decode_session_token(&token, &security),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let security = AppConfig::for_tests().security;
        let mut claims = SessionClaims::new(user(), 1);
        claims.iat -= 7200;
        claims.exp -= 7200;

        let token = issue_session_token(&claims, &security).unwrap();
        assert!(decode_session_token(&token, &security).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let mut security = AppConfig::for_tests().security;
        security.session_secret.clear();
        assert!(matches!(
            issue_session_token(&SessionClaims::new(user(), 1), &security),
            Err(SessionError::InvalidSecret)
        ));
    }
}
