// File transfer and directory tree endpoints

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::directory::{Directory, FileEntry};
use crate::error::ApiError;
use crate::middleware::{message, ApiResponse, ApiResult, JsonBody};
use crate::services::DeleteFileOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
}

/// POST /api/project/:id/files/presign - upload URL for a new object
pub async fn presign_upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<PresignRequest>,
) -> ApiResult<Value> {
    let (url, key) = state
        .files()
        .presign_upload(&identity, &project_id, &request.file_name, &request.file_type)
        .await?;
    Ok(ApiResponse::success(json!({ "uploadUrl": url, "key": key })))
}

#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: Option<String>,
}

/// POST /api/project/:id/files/presign-get
pub async fn presign_download(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<KeyRequest>,
) -> ApiResult<Value> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing file key"))?;
    let url = state.files().presign_download(&identity, &project_id, &key).await?;
    Ok(ApiResponse::success(json!({ "url": url })))
}

pub async fn get_directory(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> ApiResult<Directory> {
    let directory = state.files().get_directory(&identity, &project_id).await?;
    Ok(ApiResponse::success(directory))
}

/// PATCH /api/project/:id/directory - body is the whole tree
pub async fn replace_directory(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(directory): JsonBody<Directory>,
) -> ApiResult<Value> {
    state
        .files()
        .replace_directory(&identity, &project_id, directory)
        .await?;
    Ok(message("Directory updated"))
}

#[derive(Debug, Deserialize)]
pub struct MetadataRequest {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(flatten)]
    pub file: FileEntry,
}

/// POST /api/project/:id/files/metadata - record an uploaded object in the tree
pub async fn add_metadata(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<MetadataRequest>,
) -> ApiResult<Value> {
    let file = state
        .files()
        .add_file_metadata(&identity, &project_id, &request.path, request.file)
        .await?;
    Ok(ApiResponse::success(json!({ "success": true, "file": file })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub key: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
}

/// DELETE /api/project/:id/files
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<DeleteFileRequest>,
) -> ApiResult<Value> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing file key"))?;

    let outcome = state
        .files()
        .delete_file(&identity, &project_id, &request.path, &key)
        .await?;
    let body = match outcome {
        DeleteFileOutcome::Deleted => json!({ "success": true }),
        DeleteFileOutcome::NotInMetadata => json!({
            "success": true,
            "warning": "File not found in metadata, but deleted from S3",
        }),
    };
    Ok(ApiResponse::success(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRequest {
    pub folder_name: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
}

impl FolderRequest {
    fn name(&self) -> Result<&str, ApiError> {
        self.folder_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing folder name"))
    }
}

/// POST /api/project/:id/files/folder
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<FolderRequest>,
) -> ApiResult<Value> {
    let folder = state
        .files()
        .create_folder(&identity, &project_id, &request.path, request.name()?)
        .await?;
    Ok(ApiResponse::success(json!({ "success": true, "folder": folder })))
}

/// DELETE /api/project/:id/files/folder - removes the subtree and its objects
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    JsonBody(request): JsonBody<FolderRequest>,
) -> ApiResult<Value> {
    let deleted = state
        .files()
        .delete_folder(&identity, &project_id, &request.path, request.name()?)
        .await?;
    Ok(ApiResponse::success(json!({ "success": true, "deletedKeys": deleted })))
}
