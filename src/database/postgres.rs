use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

use super::manager::DatabaseManager;
use super::models::{Membership, Project, ProjectField, ProjectKey, ProjectUpdate, Role, UserProfile};
use super::store::{RecordStore, StoreResult};
use super::DatabaseError;
use crate::directory::Directory;

/// PostgreSQL record store.
///
/// Projects are stored as one JSONB document per row, keyed by
/// `(project_id, owner_id)`. Attribute writes use `jsonb_set` / `||` so
/// concurrent writers to different attributes do not overwrite each other.
pub struct PgRecordStore {
    db: DatabaseManager,
    projects: String,
    teams: String,
    users: String,
}

#[derive(FromRow)]
struct MembershipRow {
    project_id: String,
    user_id: String,
    role: String,
    added_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DatabaseError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: super::models::UnknownRole| DatabaseError::Corrupt(e.to_string()))?;
        Ok(Membership {
            project_id: row.project_id,
            user_id: row.user_id,
            role,
            added_at: row.added_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: String,
    given_name: String,
    family_name: String,
    email: String,
    synced_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            given_name: row.given_name,
            family_name: row.family_name,
            email: row.email,
            synced_at: row.synced_at,
        }
    }
}

fn not_found(key: &ProjectKey) -> DatabaseError {
    DatabaseError::NotFound(format!("project {}", key.project_id))
}

fn memberships(rows: Vec<MembershipRow>) -> StoreResult<Vec<Membership>> {
    rows.into_iter().map(Membership::try_from).collect()
}

impl PgRecordStore {
    pub fn new(db: DatabaseManager) -> Self {
        let (projects, teams, users) = db.quoted_tables();
        Self {
            db,
            projects,
            teams,
            users,
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ping(&self) -> StoreResult<()> {
        self.db.health_check().await
    }

    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>> {
        let sql = format!(
            "SELECT record FROM {} WHERE project_id = $1 AND owner_id = $2",
            self.projects
        );
        let record: Option<Json<Project>> = sqlx::query_scalar(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record.map(|Json(p)| p))
    }

    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT record FROM {} WHERE project_id = $1", self.projects);
        let record: Option<Json<Project>> = sqlx::query_scalar(&sql)
            .bind(project_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record.map(|Json(p)| p))
    }

    async fn put_project(&self, project: &Project) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (project_id, owner_id, record, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (project_id) DO UPDATE
             SET record = EXCLUDED.record, updated_at = now()
             WHERE {}.owner_id = EXCLUDED.owner_id",
            self.projects, self.projects
        );
        sqlx::query(&sql)
            .bind(&project.project_id)
            .bind(&project.owner_id)
            .bind(Json(project))
            .bind(project.created_at)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn delete_project(&self, key: &ProjectKey) -> StoreResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE project_id = $1 AND owner_id = $2",
            self.projects
        );
        let result = sqlx::query(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_project_fields(
        &self,
        key: &ProjectKey,
        changes: &[(ProjectField, Value)],
    ) -> StoreResult<Map<String, Value>> {
        let patch: Map<String, Value> = changes
            .iter()
            .map(|(field, value)| (field.attribute().to_string(), value.clone()))
            .collect();

        // Shallow merge: only the named top-level attributes change
        let sql = format!(
            "UPDATE {} SET record = record || $3, updated_at = now()
             WHERE project_id = $1 AND owner_id = $2
             RETURNING record",
            self.projects
        );
        let record: Option<Json<Map<String, Value>>> = sqlx::query_scalar(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .bind(Json(&patch))
            .fetch_optional(self.db.pool())
            .await?;
        let Json(record) = record.ok_or_else(|| not_found(key))?;

        Ok(patch
            .keys()
            .map(|name| (name.clone(), record.get(name).cloned().unwrap_or(Value::Null)))
            .collect())
    }

    async fn update_project_field(
        &self,
        key: &ProjectKey,
        field: ProjectField,
        value: Value,
    ) -> StoreResult<Value> {
        let sql = format!(
            "UPDATE {} SET record = jsonb_set(record, ARRAY[$3::text], $4, true), updated_at = now()
             WHERE project_id = $1 AND owner_id = $2
             RETURNING record -> $3::text",
            self.projects
        );
        let written: Option<Option<Json<Value>>> = sqlx::query_scalar(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .bind(field.attribute())
            .bind(Json(&value))
            .fetch_optional(self.db.pool())
            .await?;
        match written {
            Some(value) => Ok(value.map(|Json(v)| v).unwrap_or(Value::Null)),
            None => Err(not_found(key)),
        }
    }

    async fn update_directory(&self, key: &ProjectKey, directory: &Directory) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET record = jsonb_set(record, '{{directory}}', $3, true), updated_at = now()
             WHERE project_id = $1 AND owner_id = $2",
            self.projects
        );
        let result = sqlx::query(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .bind(Json(directory))
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(key));
        }
        Ok(())
    }

    async fn prepend_project_update(
        &self,
        key: &ProjectKey,
        update: &ProjectUpdate,
    ) -> StoreResult<Vec<ProjectUpdate>> {
        let sql = format!(
            "UPDATE {} SET record = jsonb_set(
                 record,
                 '{{updates}}',
                 jsonb_build_array($3::jsonb) || COALESCE(record -> 'updates', '[]'::jsonb),
                 true
             ), updated_at = now()
             WHERE project_id = $1 AND owner_id = $2
             RETURNING record -> 'updates'",
            self.projects
        );
        let updates: Option<Json<Vec<ProjectUpdate>>> = sqlx::query_scalar(&sql)
            .bind(&key.project_id)
            .bind(&key.owner_id)
            .bind(Json(update))
            .fetch_optional(self.db.pool())
            .await?;
        updates.map(|Json(u)| u).ok_or_else(|| not_found(key))
    }

    async fn list_projects_owned_by(&self, owner_id: &str) -> StoreResult<Vec<Project>> {
        let sql = format!(
            "SELECT record FROM {} WHERE owner_id = $1 ORDER BY created_at",
            self.projects
        );
        let records: Vec<Json<Project>> = sqlx::query_scalar(&sql)
            .bind(owner_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(records.into_iter().map(|Json(p)| p).collect())
    }

    async fn get_projects(&self, project_ids: &[String]) -> StoreResult<Vec<Project>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT record FROM {} WHERE project_id = ANY($1) ORDER BY created_at",
            self.projects
        );
        let records: Vec<Json<Project>> = sqlx::query_scalar(&sql)
            .bind(project_ids)
            .fetch_all(self.db.pool())
            .await?;
        Ok(records.into_iter().map(|Json(p)| p).collect())
    }

    async fn get_membership(&self, project_id: &str, user_id: &str) -> StoreResult<Option<Membership>> {
        let sql = format!(
            "SELECT project_id, user_id, role, added_at FROM {} WHERE project_id = $1 AND user_id = $2",
            self.teams
        );
        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(Membership::try_from).transpose()
    }

    async fn insert_membership_if_absent(&self, membership: &Membership) -> StoreResult<bool> {
        let sql = format!(
            "INSERT INTO {} (project_id, user_id, role, added_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT (project_id, user_id) DO NOTHING",
            self.teams
        );
        let result = sqlx::query(&sql)
            .bind(&membership.project_id)
            .bind(&membership.user_id)
            .bind(membership.role.as_str())
            .bind(membership.added_at)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_membership_role(&self, project_id: &str, user_id: &str, role: Role) -> StoreResult<bool> {
        let sql = format!(
            "UPDATE {} SET role = $3 WHERE project_id = $1 AND user_id = $2",
            self.teams
        );
        let result = sqlx::query(&sql)
            .bind(project_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE project_id = $1 AND user_id = $2", self.teams);
        let result = sqlx::query(&sql)
            .bind(project_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_memberships_by_project(&self, project_id: &str) -> StoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT project_id, user_id, role, added_at FROM {} WHERE project_id = $1 ORDER BY added_at, user_id",
            self.teams
        );
        let rows: Vec<MembershipRow> = sqlx::query_as(&sql)
            .bind(project_id)
            .fetch_all(self.db.pool())
            .await?;
        memberships(rows)
    }

    async fn list_memberships_by_user(&self, user_id: &str) -> StoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT project_id, user_id, role, added_at FROM {} WHERE user_id = $1 ORDER BY added_at",
            self.teams
        );
        let rows: Vec<MembershipRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        memberships(rows)
    }

    async fn delete_memberships_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE project_id = $1", self.teams);
        let result = sqlx::query(&sql)
            .bind(project_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let sql = format!(
            "SELECT user_id, given_name, family_name, email, synced_at FROM {} WHERE user_id = $1",
            self.users
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn put_user(&self, user: &UserProfile) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (user_id, given_name, family_name, email, synced_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE
             SET given_name = EXCLUDED.given_name,
                 family_name = EXCLUDED.family_name,
                 email = EXCLUDED.email,
                 synced_at = EXCLUDED.synced_at",
            self.users
        );
        sqlx::query(&sql)
            .bind(&user.user_id)
            .bind(&user.given_name)
            .bind(&user.family_name)
            .bind(&user.email)
            .bind(user.synced_at)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
