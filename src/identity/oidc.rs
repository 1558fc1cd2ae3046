use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error};
use url::Url;

use super::{IdentityError, UserInfo};
use crate::config::IdentityConfig;

/// Subset of the OIDC discovery document this service uses
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authorization-code client for an OIDC provider.
///
/// The discovery document is fetched on first use and cached for the life of
/// the client.
pub struct OidcClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    metadata_url: String,
    scopes: String,
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            metadata_url: config.metadata_url.clone(),
            scopes: config.scopes.clone(),
            metadata: OnceCell::new(),
        }
    }

    /// Client with a known discovery document; nothing is fetched.
    pub fn with_metadata(config: &IdentityConfig, metadata: ProviderMetadata) -> Self {
        let client = Self::new(config);
        // A fresh cell cannot already be set
        let _ = client.metadata.set(metadata);
        client
    }

    async fn metadata(&self) -> Result<&ProviderMetadata, IdentityError> {
        self.metadata
            .get_or_try_init(|| async {
                debug!("Fetching OIDC discovery document from {}", self.metadata_url);
                let response = self.http.get(&self.metadata_url).send().await?;
                if !response.status().is_success() {
                    return Err(IdentityError::Configuration(format!(
                        "discovery document returned {}",
                        response.status()
                    )));
                }
                Ok(response.json::<ProviderMetadata>().await?)
            })
            .await
    }

    pub async fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, IdentityError> {
        let metadata = self.metadata().await?;
        let url = Url::parse_with_params(
            &metadata.authorization_endpoint,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", self.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| IdentityError::Configuration(format!("authorization endpoint: {}", e)))?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<UserInfo, IdentityError> {
        let metadata = self.metadata().await?;

        let mut request = self.http.post(&metadata.token_endpoint).form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
        ]);
        if !self.client_secret.is_empty() {
            request = request.basic_auth(&self.client_id, Some(&self.client_secret));
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => return Err(IdentityError::InvalidCode),
            status => {
                error!("OIDC token endpoint returned {}", status);
                return Err(IdentityError::Upstream(format!("token endpoint returned {}", status)));
            }
        }
        let tokens: TokenResponse = response.json().await?;

        let response = self
            .http
            .get(&metadata.userinfo_endpoint)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            error!("OIDC userinfo endpoint returned {}", response.status());
            return Err(IdentityError::Upstream(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        UserInfo::from_claims(response.json::<Value>().await?)
    }
}
