use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::session_middleware;
use crate::state::AppState;

/// The full application router
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .fallback(not_found)
        // Global middleware
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Login flow, reachable with and without the /api prefix
        .route("/login", get(public::login))
        .route("/api/login", get(public::login))
        .route("/authorize", get(public::authorize))
        .route("/api/authorize", get(public::authorize))
        .route("/logout", get(public::logout))
        .route("/api/logout", get(public::logout))
        .route("/me", get(public::me))
        .route("/api/me", get(public::me))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{projects, users};

    Router::new()
        .route("/api/projects", get(projects::list).post(projects::create))
        .route("/api/projects/:id", get(projects::get).delete(projects::delete))
        .route("/api/users/sync", get(users::sync))
        // Per-project operations, mounted under both spellings
        .merge(project_routes("/api/project"))
        .merge(project_routes("/api/projects"))
        .route_layer(middleware::from_fn_with_state(state, session_middleware))
}

fn project_routes(prefix: &str) -> Router<AppState> {
    use protected::{files, project_data, projects, team};

    let path = |suffix: &str| format!("{}/:id/{}", prefix, suffix);

    Router::new()
        // Project attributes
        .route(&path("update-field"), patch(projects::update_field))
        .route(&path("update"), post(projects::update))
        .route(&path("update-milestone"), post(projects::update_milestone))
        // Embedded lists
        .route(&path("timeline"), post(project_data::set_timeline))
        .route(&path("tasks"), get(project_data::get_tasks).post(project_data::set_tasks))
        .route(&path("updates"), get(project_data::get_updates).post(project_data::add_update))
        .route(&path("inspections"), patch(project_data::set_inspections))
        .route(&path("expenses"), patch(project_data::set_expenses))
        .route(&path("notes"), patch(project_data::set_notes))
        // Files and directory tree
        .route(&path("directory"), get(files::get_directory).patch(files::replace_directory))
        .route(&path("files/presign"), post(files::presign_upload))
        .route(&path("files/presign-get"), post(files::presign_download))
        .route(&path("files/metadata"), post(files::add_metadata))
        .route(&path("files"), delete(files::delete_file))
        .route(&path("files/folder"), post(files::create_folder).delete(files::delete_folder))
        // Team
        .route(&path("team"), get(team::list))
        .route(&path("add-user"), post(team::add_user))
        .route(&path("remove-user"), delete(team::remove_user))
        .route(&path("change-role"), patch(team::change_role))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}
