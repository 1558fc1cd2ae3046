#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use buildmanager_api::auth::{issue_session_token, SessionClaims};
use buildmanager_api::config::AppConfig;
use buildmanager_api::database::MemoryRecordStore;
use buildmanager_api::identity::{DirectoryUser, StaticIdentityProvider, UserInfo};
use buildmanager_api::routes;
use buildmanager_api::state::AppState;
use buildmanager_api::storage::MemoryBlobStore;

/// Router over in-memory backends, driven in-process
pub struct TestApp {
    pub config: AppConfig,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub identity: Arc<StaticIdentityProvider>,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::for_tests();
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let identity = Arc::new(StaticIdentityProvider::default());

        let state = AppState::new(config.clone(), records.clone(), blobs.clone(), identity.clone());
        Self {
            config,
            records,
            blobs,
            identity,
            router: routes::app(state),
        }
    }

    /// Register accounts `{id}@example.com` with the identity provider
    pub async fn with_users(self, user_ids: &[&str]) -> Self {
        for user_id in user_ids {
            self.identity
                .insert(DirectoryUser {
                    user_id: user_id.to_string(),
                    email: format!("{}@example.com", user_id),
                    given_name: user_id.to_string(),
                    family_name: "Tester".to_string(),
                })
                .await;
        }
        self
    }

    pub fn session_token(&self, user_id: &str) -> String {
        let info = UserInfo {
            sub: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            given_name: user_id.to_string(),
            family_name: "Tester".to_string(),
            raw: json!({ "sub": user_id, "email": format!("{}@example.com", user_id) }),
        };
        issue_session_token(&SessionClaims::new(info, 1), &self.config.security)
            .expect("session token")
    }

    pub fn session_cookie(&self, user_id: &str) -> String {
        format!("{}={}", self.config.security.cookie_name, self.session_token(user_id))
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router call failed")?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| {
                format!("non-JSON body: {}", String::from_utf8_lossy(&bytes))
            })?
        };
        Ok(TestResponse { status, headers, body })
    }

    /// JSON request, authenticated as `user` when given
    pub async fn call(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header(header::COOKIE, self.session_cookie(user_id));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, user: &str) -> Result<TestResponse> {
        self.call(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &str, body: Value) -> Result<TestResponse> {
        self.call(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &str, body: Value) -> Result<TestResponse> {
        self.call(Method::PATCH, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &str, body: Value) -> Result<TestResponse> {
        self.call(Method::DELETE, uri, Some(user), Some(body)).await
    }

    /// Create a project owned by `owner` and return its id
    pub async fn create_project(&self, owner: &str, name: &str) -> Result<String> {
        let res = self.post("/api/projects", owner, json!({ "name": name })).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create failed: {:?}", res.body);
        res.body["projectId"]
            .as_str()
            .map(str::to_string)
            .context("projectId missing")
    }

    /// Add `user` to the project with `role`, acting as `owner`
    pub async fn add_member(&self, project_id: &str, owner: &str, user: &str, role: &str) -> Result<()> {
        let res = self
            .post(
                &format!("/api/project/{}/add-user", project_id),
                owner,
                json!({ "email": format!("{}@example.com", user), "role": role }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "add-user failed: {:?}", res.body);
        Ok(())
    }
}
