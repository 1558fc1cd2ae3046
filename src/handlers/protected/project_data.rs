// Embedded project lists: timeline, tasks, updates, inspections, expenses, notes

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::database::models::{Expense, Note, ProjectUpdate, Task, TimelineEvent};
use crate::error::ApiError;
use crate::middleware::{message, ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

/// Decode a raw JSON array body into records
fn parse_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    if !body.is_array() {
        return Err(ApiError::bad_request("Invalid data format"));
    }
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("Invalid data format: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct TimelineRequest {
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

/// POST /api/project/:id/timeline
pub async fn set_timeline(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<TimelineRequest>,
) -> ApiResult<Value> {
    let timeline = state
        .projects()
        .set_timeline(&identity, &project_id, request.timeline)
        .await?;
    Ok(ApiResponse::success(json!({ "timeline": timeline })))
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Task>> {
    let tasks = state.projects().get_tasks(&identity, &project_id).await?;
    Ok(ApiResponse::success(tasks))
}

/// POST /api/project/:id/tasks - body is the full task array
pub async fn set_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let tasks = parse_list::<Task>(body)?;
    state.projects().set_tasks(&identity, &project_id, tasks).await?;
    Ok(message("Tasks updated"))
}

pub async fn get_updates(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<ProjectUpdate>> {
    let updates = state.projects().get_updates(&identity, &project_id).await?;
    Ok(ApiResponse::success(updates))
}

/// POST /api/project/:id/updates - newest first
pub async fn add_update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(update): JsonBody<ProjectUpdate>,
) -> ApiResult<ProjectUpdate> {
    let update = state.projects().add_update(&identity, &project_id, update).await?;
    Ok(ApiResponse::success(update))
}

/// PATCH /api/project/:id/inspections - body is the full inspection array
pub async fn set_inspections(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let inspections = parse_list(body)?;
    state
        .projects()
        .set_inspections(&identity, &project_id, inspections)
        .await?;
    Ok(message("Inspections updated"))
}

#[derive(Debug, Deserialize)]
pub struct ExpensesRequest {
    pub expenses: Option<Vec<Expense>>,
}

pub async fn set_expenses(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<ExpensesRequest>,
) -> ApiResult<Value> {
    let expenses = request
        .expenses
        .ok_or_else(|| ApiError::bad_request("Invalid data format"))?;
    state.projects().set_expenses(&identity, &project_id, expenses).await?;
    Ok(message("Expenses updated"))
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<Vec<Note>>,
}

pub async fn set_notes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<NotesRequest>,
) -> ApiResult<Value> {
    let notes = request.notes.ok_or_else(|| ApiError::bad_request("Invalid data format"))?;
    state.projects().set_notes(&identity, &project_id, notes).await?;
    Ok(message("Notes updated"))
}
