mod common;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn root_and_health_are_public() -> Result<()> {
    let app = TestApp::new();

    let res = app.call(Method::GET, "/", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "BuildManager API is running.");

    let res = app.call(Method::GET, "/health", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_session() -> Result<()> {
    let app = TestApp::new();

    for (method, uri) in [
        (Method::GET, "/api/projects"),
        (Method::GET, "/api/users/sync"),
        (Method::GET, "/api/project/p1/team"),
        (Method::POST, "/api/projects/p1/files/presign"),
    ] {
        let res = app.call(method, uri, None, Some(json!({}))).await?;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(res.body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn forged_cookie_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/projects")
        .header(header::COOKIE, format!("{}=not-a-token", app.config.security.cookie_name))
        .body(Body::empty())?;

    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn bearer_token_is_accepted() -> Result<()> {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/projects")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.session_token("ada")))
        .body(Body::empty())?;

    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));
    Ok(())
}

#[tokio::test]
async fn me_reports_session_state() -> Result<()> {
    let app = TestApp::new();

    let res = app.call(Method::GET, "/me", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body, json!({ "authenticated": false }));

    let res = app.get("/api/me", "ada").await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["authenticated"], true);
    assert_eq!(res.body["user"]["sub"], "ada");
    assert_eq!(res.body["user"]["email"], "ada@example.com");
    Ok(())
}

#[tokio::test]
async fn me_includes_role_for_project() -> Result<()> {
    let app = TestApp::new().with_users(&["owner", "gus"]).await;
    let project_id = app.create_project("owner", "Harbor Bridge").await?;
    app.add_member(&project_id, "owner", "gus", "guest").await?;

    let res = app.get(&format!("/api/me?project_id={}", project_id), "gus").await?;
    assert_eq!(res.body["user"]["current_role"], "guest");

    let res = app.get(&format!("/api/me?project_id={}", project_id), "owner").await?;
    assert_eq!(res.body["user"]["current_role"], "owner");

    let res = app.get(&format!("/api/me?project_id={}", project_id), "stranger").await?;
    assert!(res.body["user"]["current_role"].is_null());
    Ok(())
}

fn set_cookies(headers: &axum::http::HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default()
}

#[tokio::test]
async fn login_flow_issues_session_cookie() -> Result<()> {
    let app = TestApp::new().with_users(&["ada"]).await;

    // /login: redirect to the provider with a state cookie
    let res = app.call(Method::GET, "/login", None, None).await?;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    let location = res
        .headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .context("missing location")?
        .to_string();
    assert!(location.starts_with("http://localhost:5000/authorize?"));

    let cookies = set_cookies(&res.headers);
    let state_cookie = cookies
        .iter()
        .find(|c| c.starts_with("buildmgr_oidc_state="))
        .context("missing state cookie")?;
    assert!(state_cookie.contains("HttpOnly"));

    // /authorize: the provider sends the browser back with code + state
    let callback = location.trim_start_matches("http://localhost:5000");
    let request = Request::builder()
        .uri(callback)
        .header(header::COOKIE, cookie_pair(state_cookie))
        .body(Body::empty())?;
    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(
        res.headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000/dashboard")
    );

    let session_prefix = format!("{}=", app.config.security.cookie_name);
    let cookies = set_cookies(&res.headers);
    let session = cookies
        .iter()
        .find(|c| c.starts_with(&session_prefix))
        .context("missing session cookie")?;

    // The new cookie authenticates API calls
    let request = Request::builder()
        .uri("/api/me")
        .header(header::COOKIE, cookie_pair(session))
        .body(Body::empty())?;
    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["sub"], "ada");
    assert_eq!(res.body["user"]["email_verified"], true);
    Ok(())
}

#[tokio::test]
async fn authorize_rejects_mismatched_state() -> Result<()> {
    let app = TestApp::new().with_users(&["ada"]).await;
    let request = Request::builder()
        .uri("/authorize?code=ada&state=forged")
        .header(header::COOKIE, "buildmgr_oidc_state=expected")
        .body(Body::empty())?;

    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.headers.get(header::SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn authorize_rejects_unknown_code() -> Result<()> {
    let app = TestApp::new().with_users(&["ada"]).await;
    let request = Request::builder()
        .uri("/api/authorize?code=nobody&state=s1")
        .header(header::COOKIE, "buildmgr_oidc_state=s1")
        .body(Body::empty())?;

    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Failed to retrieve user info");
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_cookie() -> Result<()> {
    let app = TestApp::new();
    let res = app.get("/logout", "ada").await?;
    assert_eq!(res.status, StatusCode::SEE_OTHER);

    let cookies = set_cookies(&res.headers);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", app.config.security.cookie_name)) && c.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let app = TestApp::new();
    let res = app.call(Method::GET, "/nope", None, None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({ "error": "Not found" }));
    Ok(())
}
