use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::auth::{decode_session_token, Identity};
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Session authentication middleware that validates the session token and
/// injects the caller's `Identity` into the request
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match identity_from_parts(&jar, request.headers(), &state.config.security) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) => {
            tracing::debug!("Rejected {} {}: {}", request.method(), request.uri().path(), msg);
            ApiError::unauthorized("Unauthorized").into_response()
        }
    }
}

/// Resolve the caller from the session cookie, falling back to a Bearer header
pub fn identity_from_parts(
    jar: &CookieJar,
    headers: &HeaderMap,
    security: &SecurityConfig,
) -> Result<Identity, String> {
    let token = match jar.get(&security.cookie_name) {
        Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
        _ => extract_bearer_token(headers)?,
    };

    let claims = decode_session_token(&token, security).map_err(|e| e.to_string())?;
    Ok(Identity::from(claims))
}

/// Extract a Bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing session".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty session token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
