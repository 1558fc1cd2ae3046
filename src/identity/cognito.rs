use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, SdkError};
use aws_sdk_cognitoidentityprovider::Client;
use tracing::{debug, error};
use url::Url;

use super::{DirectoryUser, IdentityError, IdentityProvider, OidcClient, UserInfo};
use crate::config::IdentityConfig;

/// Cognito user pool: OIDC login through the hosted UI, directory lookups
/// through the admin API.
pub struct CognitoIdentityProvider {
    oidc: OidcClient,
    client: Client,
    user_pool_id: String,
    client_id: String,
    domain: String,
    post_logout_redirect_uri: String,
}

impl CognitoIdentityProvider {
    pub fn new(config: &IdentityConfig, sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            oidc: OidcClient::new(config),
            client: Client::new(sdk_config),
            user_pool_id: config.user_pool_id.clone(),
            client_id: config.client_id.clone(),
            domain: config.domain.clone(),
            post_logout_redirect_uri: config.post_logout_redirect_uri.clone(),
        }
    }
}

fn upstream<E, R>(operation: &str, err: SdkError<E, R>) -> IdentityError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    error!("Cognito {} failed: {}", operation, message);
    IdentityError::Upstream(message)
}

/// Escape a value for a `list_users` filter expression
fn filter_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn build_logout_url(domain: &str, client_id: &str, logout_uri: &str) -> Option<String> {
    let domain = domain.trim_end_matches('/');
    if domain.is_empty() {
        return None;
    }
    let base = if domain.starts_with("http://") || domain.starts_with("https://") {
        format!("{}/logout", domain)
    } else {
        format!("https://{}/logout", domain)
    };
    Url::parse_with_params(&base, &[("client_id", client_id), ("logout_uri", logout_uri)])
        .ok()
        .map(String::from)
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, IdentityError> {
        self.oidc.authorize_url(redirect_uri, state).await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<UserInfo, IdentityError> {
        self.oidc.exchange_code(code, redirect_uri).await
    }

    fn logout_url(&self) -> Option<String> {
        build_logout_url(&self.domain, &self.client_id, &self.post_logout_redirect_uri)
    }

    async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, IdentityError> {
        let output = self
            .client
            .admin_get_user()
            .user_pool_id(&self.user_pool_id)
            .username(user_id)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .map(|e| e.is_user_not_found_exception())
                    .unwrap_or(false)
                {
                    IdentityError::UserNotFound(user_id.to_string())
                } else {
                    upstream("AdminGetUser", err)
                }
            })?;

        let attributes = output
            .user_attributes()
            .iter()
            .map(|a| (a.name(), a.value()));
        Ok(DirectoryUser::from_attributes(user_id, attributes))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, IdentityError> {
        debug!("Looking up directory user by email");
        let output = self
            .client
            .list_users()
            .user_pool_id(&self.user_pool_id)
            .filter(format!("email = \"{}\"", filter_literal(email)))
            .limit(1)
            .send()
            .await
            .map_err(|err| upstream("ListUsers", err))?;

        Ok(output.users().first().map(|user| {
            let username = user.username().unwrap_or_default();
            let attributes = user.attributes().iter().map(|a| (a.name(), a.value()));
            DirectoryUser::from_attributes(username, attributes)
        }))
    }
}
