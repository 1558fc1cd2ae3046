use tracing::debug;

use super::{ServiceError, ServiceResult};
use crate::auth::Identity;
use crate::database::models::{Project, ProjectKey, Role};
use crate::database::RecordStore;

/// A project together with the caller's role in it
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub role: Role,
}

impl ProjectAccess {
    /// Load `project_id` for `identity`. The owner always has access; anyone
    /// else needs a membership.
    pub async fn load(
        records: &dyn RecordStore,
        project_id: &str,
        identity: &Identity,
    ) -> ServiceResult<Self> {
        let project = records
            .find_project(project_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Project not found".to_string()))?;

        if project.owner_id == identity.user_id {
            return Ok(Self {
                project,
                role: Role::Owner,
            });
        }

        match records.get_membership(project_id, &identity.user_id).await? {
            Some(membership) => Ok(Self {
                project,
                role: membership.role,
            }),
            None => {
                debug!("User {} has no access to project {}", identity.user_id, project_id);
                Err(ServiceError::Forbidden("Forbidden".to_string()))
            }
        }
    }

    pub fn key(&self) -> ProjectKey {
        self.project.key()
    }

    pub fn require_edit(&self) -> ServiceResult<()> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Guests cannot modify this project".to_string()))
        }
    }

    pub fn require_owner(&self) -> ServiceResult<()> {
        if self.role == Role::Owner {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Only the project owner can do this".to_string()))
        }
    }

    pub fn require_team_manager(&self) -> ServiceResult<()> {
        if self.role.can_manage_team() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Only owners and admins can manage the team".to_string()))
        }
    }
}
