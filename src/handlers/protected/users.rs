use axum::{extract::State, Extension};
use serde_json::Value;

use crate::auth::Identity;
use crate::middleware::{message, ApiResult};
use crate::state::AppState;

/// GET /api/users/sync - refresh the caller's cached directory profile
pub async fn sync(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Value> {
    let outcome = state.users().sync_user(&identity).await?;
    tracing::debug!("Profile sync for {}: {:?}", identity.user_id, outcome);
    Ok(message("User synced"))
}
