// Team membership endpoints

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::Identity;
use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{message, ApiResponse, ApiResult, JsonBody};
use crate::services::TeamMember;
use crate::state::AppState;

fn parse_role(role: &str) -> Result<Role, ApiError> {
    role.parse::<Role>().map_err(|e| {
        let mut field_errors = HashMap::new();
        field_errors.insert("role".to_string(), e.to_string());
        ApiError::validation_error("Invalid role", Some(field_errors))
    })
}

fn require_user_id(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing user ID"))
}

/// GET /api/project/:id/team
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<TeamMember>> {
    let team = state.team().list_team(&identity, &project_id).await?;
    Ok(ApiResponse::success(team))
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

/// POST /api/project/:id/add-user - add an existing account by email
pub async fn add_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<AddUserRequest>,
) -> ApiResult<Value> {
    let email = request
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing email"))?;
    let role = request.role.as_deref().map(parse_role).transpose()?;

    state
        .team()
        .add_member_by_email(&identity, &project_id, &email, role)
        .await?;
    Ok(message("User added"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUserRequest {
    pub user_id: Option<String>,
}

/// DELETE /api/project/:id/remove-user
pub async fn remove_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<RemoveUserRequest>,
) -> ApiResult<Value> {
    let user_id = require_user_id(request.user_id)?;
    state.team().remove_member(&identity, &project_id, &user_id).await?;
    Ok(message("User removed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

/// PATCH /api/project/:id/change-role
pub async fn change_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<ChangeRoleRequest>,
) -> ApiResult<Value> {
    let user_id = require_user_id(request.user_id)?;
    let role = request
        .role
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing role"))
        .and_then(parse_role)?;

    state
        .team()
        .change_role(&identity, &project_id, &user_id, role)
        .await?;
    Ok(message("Role updated successfully"))
}
