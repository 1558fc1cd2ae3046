// Browser login flow: /login → identity provider → /authorize → frontend

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{issue_session_token, SessionClaims};
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::middleware::identity_from_parts;
use crate::state::AppState;

/// Cookie carrying the OIDC `state` value between /login and /authorize
pub const STATE_COOKIE: &str = "buildmgr_oidc_state";

const STATE_COOKIE_MAX_AGE: u64 = 600;

/// Build a Set-Cookie value; a zero max-age clears the cookie
fn build_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name, value, max_age, secure_flag
    )
}

fn session_cookie(security: &SecurityConfig, token: &str) -> String {
    build_cookie(
        &security.cookie_name,
        token,
        security.session_expiry_hours * 3600,
        security.cookie_secure,
    )
}

/// GET /login - redirect to the identity provider
pub async fn login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let oidc_state = Uuid::new_v4().simple().to_string();
    let url = state
        .identity
        .authorize_url(&state.config.redirect_uri(), &oidc_state)
        .await?;

    let cookie = build_cookie(
        STATE_COOKIE,
        &oidc_state,
        STATE_COOKIE_MAX_AGE,
        state.config.security.cookie_secure,
    );
    Ok(([(SET_COOKIE, cookie)], Redirect::to(&url)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /authorize - OIDC callback: exchange the code, set the session cookie
pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, ApiError> {
    if let Some(error) = query.error {
        warn!("Identity provider returned error: {}", error);
        return Err(ApiError::bad_request("Failed to retrieve user info"));
    }

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    match (&expected, &query.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            warn!("OIDC state mismatch on /authorize");
            return Err(ApiError::bad_request("Invalid login state"));
        }
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    let user = state
        .identity
        .exchange_code(&code, &state.config.redirect_uri())
        .await?;
    info!("User {} logged in", user.sub);

    let security = &state.config.security;
    let claims = SessionClaims::new(user, security.session_expiry_hours);
    let token = issue_session_token(&claims, security)?;

    let cookies = AppendHeaders([
        (SET_COOKIE, build_cookie(STATE_COOKIE, "", 0, security.cookie_secure)),
        (SET_COOKIE, session_cookie(security, &token)),
    ]);

    let target = format!("{}/dashboard", state.config.server.frontend_url.trim_end_matches('/'));
    Ok((cookies, Redirect::to(&target)).into_response())
}

/// GET /logout - drop the session and leave through the provider's logout page
pub async fn logout(State(state): State<AppState>) -> Response {
    let security = &state.config.security;
    let cookie = build_cookie(&security.cookie_name, "", 0, security.cookie_secure);

    let target = state
        .identity
        .logout_url()
        .unwrap_or_else(|| state.config.server.frontend_url.clone());
    ([(SET_COOKIE, cookie)], Redirect::to(&target)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MeQuery {
    pub project_id: Option<String>,
}

/// GET /me - session user-info, with `current_role` for `?project_id=`
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<MeQuery>,
) -> Result<Response, ApiError> {
    let identity = match identity_from_parts(&jar, &headers, &state.config.security) {
        Ok(identity) => identity,
        Err(_) => {
            return Ok((StatusCode::UNAUTHORIZED, Json(json!({ "authenticated": false }))).into_response());
        }
    };

    let body = state.users().me(&identity, query.project_id.as_deref()).await?;
    Ok(Json(body).into_response())
}
