use async_trait::async_trait;
use serde_json::{Map, Value};

use super::models::{Membership, Project, ProjectField, ProjectKey, ProjectUpdate, Role, UserProfile};
use super::DatabaseError;
use crate::directory::Directory;

pub type StoreResult<T> = Result<T, DatabaseError>;

/// Persistence for projects, team memberships and cached user profiles.
///
/// Single-record operations only; nothing here spans two records
/// atomically. Writes to a missing project fail with
/// [`DatabaseError::NotFound`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // Projects

    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>>;

    /// Look a project up by id alone; ids are globally unique.
    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>>;

    /// Create or fully replace a project record
    async fn put_project(&self, project: &Project) -> StoreResult<()>;

    /// Returns false when nothing was deleted
    async fn delete_project(&self, key: &ProjectKey) -> StoreResult<bool>;

    /// Overwrite the given top-level attributes and return their new values.
    async fn update_project_fields(
        &self,
        key: &ProjectKey,
        changes: &[(ProjectField, Value)],
    ) -> StoreResult<Map<String, Value>>;

    /// Overwrite one attribute and return its new value.
    async fn update_project_field(
        &self,
        key: &ProjectKey,
        field: ProjectField,
        value: Value,
    ) -> StoreResult<Value> {
        let mut written = self.update_project_fields(key, &[(field, value)]).await?;
        Ok(written.remove(field.attribute()).unwrap_or(Value::Null))
    }

    /// Replace the whole directory tree
    async fn update_directory(&self, key: &ProjectKey, directory: &Directory) -> StoreResult<()>;

    /// Insert `update` at the head of the updates list and return the list.
    async fn prepend_project_update(
        &self,
        key: &ProjectKey,
        update: &ProjectUpdate,
    ) -> StoreResult<Vec<ProjectUpdate>>;

    async fn list_projects_owned_by(&self, owner_id: &str) -> StoreResult<Vec<Project>>;

    /// Fetch several projects by id; unknown ids are skipped.
    async fn get_projects(&self, project_ids: &[String]) -> StoreResult<Vec<Project>>;

    // Memberships

    async fn get_membership(&self, project_id: &str, user_id: &str) -> StoreResult<Option<Membership>>;

    /// Insert only when no membership exists for the pair. Returns whether
    /// the row was written.
    async fn insert_membership_if_absent(&self, membership: &Membership) -> StoreResult<bool>;

    /// Returns false when the membership does not exist
    async fn set_membership_role(&self, project_id: &str, user_id: &str, role: Role) -> StoreResult<bool>;

    /// Returns false when the membership does not exist
    async fn delete_membership(&self, project_id: &str, user_id: &str) -> StoreResult<bool>;

    async fn list_memberships_by_project(&self, project_id: &str) -> StoreResult<Vec<Membership>>;

    async fn list_memberships_by_user(&self, user_id: &str) -> StoreResult<Vec<Membership>>;

    /// Remove every membership of a project; returns how many were removed.
    async fn delete_memberships_for_project(&self, project_id: &str) -> StoreResult<u64>;

    // Users

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    async fn put_user(&self, user: &UserProfile) -> StoreResult<()>;
}
