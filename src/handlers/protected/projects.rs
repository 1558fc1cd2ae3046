// Project collection and project record endpoints

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::Identity;
use crate::database::models::NewProject;
use crate::error::ApiError;
use crate::middleware::{message, ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

/// GET /api/projects - projects the caller owns or belongs to
pub async fn list(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Vec<Value>> {
    let projects = state.projects().list_projects(&identity).await?;
    Ok(ApiResponse::success(projects))
}

/// POST /api/projects - create a project owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(request): JsonBody<NewProject>,
) -> ApiResult<Value> {
    let project = state.projects().create_project(&identity, request).await?;
    Ok(ApiResponse::created(json!({
        "message": "Project created",
        "projectId": project.project_id,
    })))
}

/// GET /api/projects/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Value> {
    let project = state.projects().get_project(&identity, &project_id).await?;
    Ok(ApiResponse::success(project))
}

/// DELETE /api/projects/:id - owner only; removes the team too
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Value> {
    state.projects().delete_project(&identity, &project_id).await?;
    Ok(message("Project and team deleted successfully"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// PATCH /api/project/:id/update-field
pub async fn update_field(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<UpdateFieldRequest>,
) -> ApiResult<Value> {
    let field = request
        .field
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'field'"))?;

    let updated = state
        .projects()
        .update_field(&identity, &project_id, &field, request.value)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Field updated successfully",
        "updated": updated,
    })))
}

/// POST /api/project/:id/update - several fields at once
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(changes): JsonBody<Map<String, Value>>,
) -> ApiResult<Value> {
    state.projects().update_fields(&identity, &project_id, changes).await?;
    Ok(message("Project updated successfully"))
}

#[derive(Debug, Deserialize)]
pub struct MilestoneRequest {
    pub index: Option<usize>,
    pub field: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// POST /api/project/:id/update-milestone
pub async fn update_milestone(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<MilestoneRequest>,
) -> ApiResult<Value> {
    let (index, field) = match (request.index, request.field) {
        (Some(index), Some(field)) if !field.is_empty() => (index, field),
        _ => return Err(ApiError::bad_request("Missing index or field")),
    };

    let milestone = state
        .projects()
        .update_milestone(&identity, &project_id, index, &field, request.value)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Milestone updated successfully",
        "updated": milestone,
    })))
}
