//! In-memory record store for tests and local development.
//!
//! Uses `tokio::sync::RwLock<HashMap<K, V>>` collections; each method holds
//! a single lock for its whole read-modify-write, which gives the same
//! per-record atomicity as the PostgreSQL statements.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::models::{Membership, Project, ProjectField, ProjectKey, ProjectUpdate, Role, UserProfile};
use super::store::{RecordStore, StoreResult};
use super::DatabaseError;
use crate::directory::Directory;

#[derive(Default)]
pub struct MemoryRecordStore {
    projects: RwLock<HashMap<String, Project>>,
    memberships: RwLock<HashMap<(String, String), Membership>>,
    users: RwLock<HashMap<String, UserProfile>>,
    user_writes: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_user` calls so far
    pub fn user_write_count(&self) -> usize {
        self.user_writes.load(Ordering::SeqCst)
    }
}

fn not_found(key: &ProjectKey) -> DatabaseError {
    DatabaseError::NotFound(format!("project {}", key.project_id))
}

fn lookup<'a>(projects: &'a mut HashMap<String, Project>, key: &ProjectKey) -> StoreResult<&'a mut Project> {
    projects
        .get_mut(&key.project_id)
        .filter(|p| p.owner_id == key.owner_id)
        .ok_or_else(|| not_found(key))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_project(&self, key: &ProjectKey) -> StoreResult<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .get(&key.project_id)
            .filter(|p| p.owner_id == key.owner_id)
            .cloned())
    }

    async fn find_project(&self, project_id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().await.get(project_id).cloned())
    }

    async fn put_project(&self, project: &Project) -> StoreResult<()> {
        self.projects
            .write()
            .await
            .insert(project.project_id.clone(), project.clone());
        Ok(())
    }

    async fn delete_project(&self, key: &ProjectKey) -> StoreResult<bool> {
        let mut projects = self.projects.write().await;
        if lookup(&mut projects, key).is_err() {
            return Ok(false);
        }
        Ok(projects.remove(&key.project_id).is_some())
    }

    async fn update_project_fields(
        &self,
        key: &ProjectKey,
        changes: &[(ProjectField, Value)],
    ) -> StoreResult<Map<String, Value>> {
        let mut projects = self.projects.write().await;
        let project = lookup(&mut projects, key)?;

        // Apply through the JSON form so the stored layout matches PostgreSQL
        let mut record = match serde_json::to_value(&*project)? {
            Value::Object(map) => map,
            _ => return Err(DatabaseError::Corrupt(key.project_id.clone())),
        };
        let mut written = Map::new();
        for (field, value) in changes {
            record.insert(field.attribute().to_string(), value.clone());
            written.insert(field.attribute().to_string(), value.clone());
        }
        *project = serde_json::from_value(Value::Object(record))?;
        Ok(written)
    }

    async fn update_directory(&self, key: &ProjectKey, directory: &Directory) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        lookup(&mut projects, key)?.directory = directory.clone();
        Ok(())
    }

    async fn prepend_project_update(
        &self,
        key: &ProjectKey,
        update: &ProjectUpdate,
    ) -> StoreResult<Vec<ProjectUpdate>> {
        let mut projects = self.projects.write().await;
        let project = lookup(&mut projects, key)?;
        project.updates.insert(0, update.clone());
        Ok(project.updates.clone())
    }

    async fn list_projects_owned_by(&self, owner_id: &str) -> StoreResult<Vec<Project>> {
        let mut owned: Vec<Project> = self
            .projects
            .read()
            .await
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }

    async fn get_projects(&self, project_ids: &[String]) -> StoreResult<Vec<Project>> {
        let projects = self.projects.read().await;
        Ok(project_ids
            .iter()
            .filter_map(|id| projects.get(id).cloned())
            .collect())
    }

    async fn get_membership(&self, project_id: &str, user_id: &str) -> StoreResult<Option<Membership>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(project_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn insert_membership_if_absent(&self, membership: &Membership) -> StoreResult<bool> {
        let mut memberships = self.memberships.write().await;
        let key = (membership.project_id.clone(), membership.user_id.clone());
        if memberships.contains_key(&key) {
            return Ok(false);
        }
        memberships.insert(key, membership.clone());
        Ok(true)
    }

    async fn set_membership_role(&self, project_id: &str, user_id: &str, role: Role) -> StoreResult<bool> {
        let mut memberships = self.memberships.write().await;
        match memberships.get_mut(&(project_id.to_string(), user_id.to_string())) {
            Some(membership) => {
                membership.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .memberships
            .write()
            .await
            .remove(&(project_id.to_string(), user_id.to_string()))
            .is_some())
    }

    async fn list_memberships_by_project(&self, project_id: &str) -> StoreResult<Vec<Membership>> {
        let mut members: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn list_memberships_by_user(&self, user_id: &str) -> StoreResult<Vec<Membership>> {
        let mut memberships: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(memberships)
    }

    async fn delete_memberships_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let mut memberships = self.memberships.write().await;
        let before = memberships.len();
        memberships.retain(|(pid, _), _| pid != project_id);
        Ok((before - memberships.len()) as u64)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn put_user(&self, user: &UserProfile) -> StoreResult<()> {
        self.user_writes.fetch_add(1, Ordering::SeqCst);
        self.users.write().await.insert(user.user_id.clone(), user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewProject;
    use chrono::Utc;
    use serde_json::json;

    fn project(owner: &str) -> Project {
        Project::create(
            owner,
            NewProject {
                name: Some("Tower".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn project_key_must_match_owner() {
        let store = MemoryRecordStore::new();
        let p = project("owner");
        store.put_project(&p).await.unwrap();

        let wrong = ProjectKey::new("intruder", &p.project_id);
        assert!(store.get_project(&wrong).await.unwrap().is_none());
        assert!(!store.delete_project(&wrong).await.unwrap());
        assert!(store.get_project(&p.key()).await.unwrap().is_some());
        assert!(store.find_project(&p.project_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn field_update_writes_single_attribute() {
        let store = MemoryRecordStore::new();
        let p = project("owner");
        store.put_project(&p).await.unwrap();

        let value = store
            .update_project_field(&p.key(), ProjectField::Progress, json!(40))
            .await
            .unwrap();
        assert_eq!(value, json!(40));

        let stored = store.get_project(&p.key()).await.unwrap().unwrap();
        assert_eq!(stored.progress, 40.0);
        assert_eq!(stored.name, "Tower");
    }

    #[tokio::test]
    async fn updates_on_missing_project_fail() {
        let store = MemoryRecordStore::new();
        let key = ProjectKey::new("o", "missing");
        assert!(matches!(
            store.update_directory(&key, &Directory::root()).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn prepend_puts_newest_first() {
        let store = MemoryRecordStore::new();
        let p = project("owner");
        store.put_project(&p).await.unwrap();

        for title in ["first", "second"] {
            let update = ProjectUpdate {
                title: title.to_string(),
                author: "a".to_string(),
                date: "2024-01-01".to_string(),
                summary: String::new(),
            };
            store.prepend_project_update(&p.key(), &update).await.unwrap();
        }
        let stored = store.get_project(&p.key()).await.unwrap().unwrap();
        assert_eq!(stored.updates[0].title, "second");
        assert_eq!(stored.updates[1].title, "first");
    }

    #[tokio::test]
    async fn conditional_membership_insert() {
        let store = MemoryRecordStore::new();
        let m = Membership::new("p1", "u1", Role::Member);
        assert!(store.insert_membership_if_absent(&m).await.unwrap());

        let again = Membership::new("p1", "u1", Role::Admin);
        assert!(!store.insert_membership_if_absent(&again).await.unwrap());
        let stored = store.get_membership("p1", "u1").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Member);
    }

    #[tokio::test]
    async fn cascade_delete_counts_rows() {
        let store = MemoryRecordStore::new();
        for user in ["u1", "u2"] {
            store
                .insert_membership_if_absent(&Membership::new("p1", user, Role::Guest))
                .await
                .unwrap();
        }
        store
            .insert_membership_if_absent(&Membership::new("p2", "u1", Role::Guest))
            .await
            .unwrap();

        assert_eq!(store.delete_memberships_for_project("p1").await.unwrap(), 2);
        assert_eq!(store.list_memberships_by_user("u1").await.unwrap().len(), 1);
    }
}
