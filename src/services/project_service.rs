use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ProjectAccess, ServiceError, ServiceResult};
use crate::auth::Identity;
use crate::database::models::{
    validate_changes, Expense, Inspection, Membership, Milestone, NewProject, Note, Project,
    ProjectField, ProjectUpdate, Role, Task, TimelineEvent,
};
use crate::database::RecordStore;

/// Project CRUD and per-project sub-resources
pub struct ProjectService {
    records: Arc<dyn RecordStore>,
}

impl ProjectService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    async fn access(&self, identity: &Identity, project_id: &str) -> ServiceResult<ProjectAccess> {
        ProjectAccess::load(self.records.as_ref(), project_id, identity).await
    }

    async fn editable(&self, identity: &Identity, project_id: &str) -> ServiceResult<ProjectAccess> {
        let access = self.access(identity, project_id).await?;
        access.require_edit()?;
        Ok(access)
    }

    /// Owned projects followed by projects shared with the caller, each
    /// annotated with `currentUserRole`.
    pub async fn list_projects(&self, identity: &Identity) -> ServiceResult<Vec<Value>> {
        let owned = self.records.list_projects_owned_by(&identity.user_id).await?;
        let memberships = self.records.list_memberships_by_user(&identity.user_id).await?;

        let owned_ids: HashSet<&str> = owned.iter().map(|p| p.project_id.as_str()).collect();
        let shared: Vec<&Membership> = memberships
            .iter()
            .filter(|m| !owned_ids.contains(m.project_id.as_str()))
            .collect();
        let shared_ids: Vec<String> = shared.iter().map(|m| m.project_id.clone()).collect();
        let shared_projects = self.records.get_projects(&shared_ids).await?;

        let mut out = Vec::with_capacity(owned.len() + shared_projects.len());
        for project in &owned {
            out.push(project.with_role(Role::Owner.as_str())?);
        }
        for project in &shared_projects {
            let role = shared
                .iter()
                .find(|m| m.project_id == project.project_id)
                .map(|m| m.role)
                .unwrap_or(Role::Member);
            out.push(project.with_role(role.as_str())?);
        }
        Ok(out)
    }

    /// Create a project owned by the caller.
    ///
    /// The owner membership is a separate write; if it fails the project
    /// still exists and ownership is still recognised through `ownerId`.
    pub async fn create_project(&self, identity: &Identity, request: NewProject) -> ServiceResult<Project> {
        request
            .validate()
            .map_err(|errors| ServiceError::invalid_fields("Missing or invalid project fields", errors))?;

        let project = Project::create(&identity.user_id, request, Utc::now());
        self.records.put_project(&project).await?;
        info!("Created project {} for {}", project.project_id, identity.user_id);

        let membership = Membership::new(&project.project_id, &identity.user_id, Role::Owner);
        if let Err(e) = self.records.insert_membership_if_absent(&membership).await {
            warn!("Owner membership for project {} not recorded: {}", project.project_id, e);
        }
        Ok(project)
    }

    pub async fn get_project(&self, identity: &Identity, project_id: &str) -> ServiceResult<Value> {
        let access = self.access(identity, project_id).await?;
        Ok(access.project.with_role(access.role.as_str())?)
    }

    /// Owner only. Memberships go first, then the project record.
    pub async fn delete_project(&self, identity: &Identity, project_id: &str) -> ServiceResult<u64> {
        let access = self.access(identity, project_id).await?;
        access.require_owner()?;

        let removed = self.records.delete_memberships_for_project(project_id).await?;
        if !self.records.delete_project(&access.key()).await? {
            return Err(ServiceError::NotFound("Project not found".to_string()));
        }
        info!("Deleted project {} and {} memberships", project_id, removed);
        Ok(removed)
    }

    /// Overwrite one allow-listed attribute; returns `{field: newValue}`.
    pub async fn update_field(
        &self,
        identity: &Identity,
        project_id: &str,
        field: &str,
        value: Value,
    ) -> ServiceResult<Map<String, Value>> {
        let field = ProjectField::parse(field)
            .ok_or_else(|| ServiceError::invalid_field(field, "Field cannot be updated"))?;
        let value = field
            .validate(value)
            .map_err(|message| ServiceError::invalid_field(field.attribute(), message))?;

        let access = self.editable(identity, project_id).await?;
        let written = self.records.update_project_field(&access.key(), field, value).await?;

        let mut updated = Map::new();
        updated.insert(field.attribute().to_string(), written);
        Ok(updated)
    }

    /// Overwrite several attributes; every key is validated before anything
    /// is written.
    pub async fn update_fields(
        &self,
        identity: &Identity,
        project_id: &str,
        changes: Map<String, Value>,
    ) -> ServiceResult<Map<String, Value>> {
        if changes.is_empty() {
            return Err(ServiceError::validation("No fields to update"));
        }
        let changes = validate_changes(changes)
            .map_err(|errors| ServiceError::invalid_fields("Invalid update", errors))?;

        let access = self.editable(identity, project_id).await?;
        Ok(self.records.update_project_fields(&access.key(), &changes).await?)
    }

    /// Set `title`, `date` or `completed` on the milestone at `index`.
    pub async fn update_milestone(
        &self,
        identity: &Identity,
        project_id: &str,
        index: usize,
        field: &str,
        value: Value,
    ) -> ServiceResult<Milestone> {
        let access = self.editable(identity, project_id).await?;
        let mut milestones = access.project.milestones.clone();
        let milestone = milestones
            .get_mut(index)
            .ok_or_else(|| ServiceError::invalid_field("index", format!("No milestone at index {}", index)))?;

        match (field, value) {
            ("title", Value::String(s)) => milestone.title = s,
            ("date", Value::String(s)) => milestone.date = s,
            ("completed", Value::Bool(b)) => milestone.completed = b,
            ("title" | "date", _) => return Err(ServiceError::invalid_field(field, "must be a string")),
            ("completed", _) => return Err(ServiceError::invalid_field(field, "must be a boolean")),
            _ => return Err(ServiceError::invalid_field(field, "Milestone field cannot be updated")),
        }
        let updated = milestone.clone();

        self.records
            .update_project_field(&access.key(), ProjectField::Milestones, serde_json::to_value(&milestones)?)
            .await?;
        Ok(updated)
    }

    async fn replace_list<T: Serialize>(
        &self,
        identity: &Identity,
        project_id: &str,
        field: ProjectField,
        items: &[T],
    ) -> ServiceResult<Value> {
        let access = self.editable(identity, project_id).await?;
        let value = field
            .validate(serde_json::to_value(items)?)
            .map_err(|message| ServiceError::invalid_field(field.attribute(), message))?;
        Ok(self.records.update_project_field(&access.key(), field, value).await?)
    }

    pub async fn set_timeline(
        &self,
        identity: &Identity,
        project_id: &str,
        timeline: Vec<TimelineEvent>,
    ) -> ServiceResult<Vec<TimelineEvent>> {
        let written = self
            .replace_list(identity, project_id, ProjectField::Timeline, &timeline)
            .await?;
        Ok(serde_json::from_value(written)?)
    }

    pub async fn get_tasks(&self, identity: &Identity, project_id: &str) -> ServiceResult<Vec<Task>> {
        Ok(self.access(identity, project_id).await?.project.tasks)
    }

    pub async fn set_tasks(&self, identity: &Identity, project_id: &str, tasks: Vec<Task>) -> ServiceResult<()> {
        self.replace_list(identity, project_id, ProjectField::Tasks, &tasks).await?;
        Ok(())
    }

    /// Prepend `update` so the list stays newest-first.
    pub async fn add_update(
        &self,
        identity: &Identity,
        project_id: &str,
        update: ProjectUpdate,
    ) -> ServiceResult<ProjectUpdate> {
        if update.title.trim().is_empty() {
            return Err(ServiceError::invalid_field("title", "This field is required"));
        }
        let access = self.editable(identity, project_id).await?;
        self.records.prepend_project_update(&access.key(), &update).await?;
        Ok(update)
    }

    pub async fn get_updates(&self, identity: &Identity, project_id: &str) -> ServiceResult<Vec<ProjectUpdate>> {
        Ok(self.access(identity, project_id).await?.project.updates)
    }

    pub async fn set_inspections(
        &self,
        identity: &Identity,
        project_id: &str,
        inspections: Vec<Inspection>,
    ) -> ServiceResult<()> {
        self.replace_list(identity, project_id, ProjectField::Inspections, &inspections)
            .await?;
        Ok(())
    }

    pub async fn set_expenses(
        &self,
        identity: &Identity,
        project_id: &str,
        expenses: Vec<Expense>,
    ) -> ServiceResult<()> {
        self.replace_list(identity, project_id, ProjectField::Expenses, &expenses)
            .await?;
        Ok(())
    }

    pub async fn set_notes(&self, identity: &Identity, project_id: &str, notes: Vec<Note>) -> ServiceResult<()> {
        self.replace_list(identity, project_id, ProjectField::Notes, &notes).await?;
        Ok(())
    }
}
