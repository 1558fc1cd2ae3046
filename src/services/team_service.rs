use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{ProjectAccess, ServiceError, ServiceResult};
use crate::auth::Identity;
use crate::database::models::{Membership, Role};
use crate::database::RecordStore;
use crate::identity::IdentityProvider;

/// A membership joined with the member's cached profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    pub role: Role,
    pub added_at: DateTime<Utc>,
    #[serde(rename = "given_name")]
    pub given_name: String,
    #[serde(rename = "family_name")]
    pub family_name: String,
    pub email: String,
}

pub struct TeamService {
    records: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl TeamService {
    pub fn new(records: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { records, identity }
    }

    async fn access(&self, identity: &Identity, project_id: &str) -> ServiceResult<ProjectAccess> {
        ProjectAccess::load(self.records.as_ref(), project_id, identity).await
    }

    /// Role held by `user_id`, treating the project owner as `Owner`
    /// regardless of what the membership row says.
    async fn member_role(&self, access: &ProjectAccess, user_id: &str) -> ServiceResult<Role> {
        let membership = self
            .records
            .get_membership(&access.project.project_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found in project team".to_string()))?;
        if access.project.owner_id == user_id {
            Ok(Role::Owner)
        } else {
            Ok(membership.role)
        }
    }

    /// Shared rules for changing or removing a member
    fn check_manage(access: &ProjectAccess, actor: &Identity, target_id: &str, target: Role) -> ServiceResult<()> {
        if actor.user_id == target_id {
            return Err(ServiceError::Forbidden("You cannot change your own membership".to_string()));
        }
        if !access.role.can_manage(target) {
            return Err(ServiceError::Forbidden(format!(
                "A {} cannot manage a {}",
                access.role, target
            )));
        }
        Ok(())
    }

    /// Members in join order. Members that never synced a profile are
    /// listed with empty names.
    pub async fn list_team(&self, identity: &Identity, project_id: &str) -> ServiceResult<Vec<TeamMember>> {
        let access = self.access(identity, project_id).await?;
        let memberships = self.records.list_memberships_by_project(project_id).await?;

        let profiles = try_join_all(memberships.iter().map(|m| self.records.get_user(&m.user_id))).await?;

        let mut team: Vec<TeamMember> = memberships
            .into_iter()
            .zip(profiles)
            .map(|(m, profile)| {
                let role = if m.user_id == access.project.owner_id {
                    Role::Owner
                } else {
                    m.role
                };
                let (given_name, family_name, email) = profile
                    .map(|p| (p.given_name, p.family_name, p.email))
                    .unwrap_or_default();
                TeamMember {
                    user_id: m.user_id,
                    role,
                    added_at: m.added_at,
                    given_name,
                    family_name,
                    email,
                }
            })
            .collect();

        // The owner membership is written best-effort at creation
        if !team.iter().any(|m| m.user_id == access.project.owner_id) {
            let profile = self.records.get_user(&access.project.owner_id).await?;
            let (given_name, family_name, email) = profile
                .map(|p| (p.given_name, p.family_name, p.email))
                .unwrap_or_default();
            team.insert(
                0,
                TeamMember {
                    user_id: access.project.owner_id.clone(),
                    role: Role::Owner,
                    added_at: access.project.created_at,
                    given_name,
                    family_name,
                    email,
                },
            );
        }
        Ok(team)
    }

    /// Add the account registered under `email`. Owners may grant any role
    /// but `owner`; admins only roles below their own.
    pub async fn add_member_by_email(
        &self,
        identity: &Identity,
        project_id: &str,
        email: &str,
        role: Option<Role>,
    ) -> ServiceResult<Membership> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::invalid_field("email", "This field is required"));
        }
        let role = role.unwrap_or(Role::Member);
        if role == Role::Owner {
            return Err(ServiceError::invalid_field("role", "The owner role cannot be granted"));
        }

        let access = self.access(identity, project_id).await?;
        access.require_team_manager()?;
        if !access.role.can_manage(role) {
            return Err(ServiceError::Forbidden(format!("A {} cannot grant the {} role", access.role, role)));
        }

        let user = self
            .identity
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        if user.user_id == access.project.owner_id {
            return Err(ServiceError::Conflict("User already in project team".to_string()));
        }

        let membership = Membership::new(project_id, &user.user_id, role);
        if !self.records.insert_membership_if_absent(&membership).await? {
            return Err(ServiceError::Conflict("User already in project team".to_string()));
        }
        info!("Added {} to project {} as {}", user.user_id, project_id, role);
        Ok(membership)
    }

    pub async fn remove_member(&self, identity: &Identity, project_id: &str, user_id: &str) -> ServiceResult<()> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::invalid_field("userId", "Missing user ID"));
        }
        let access = self.access(identity, project_id).await?;
        let target = self.member_role(&access, user_id).await?;
        Self::check_manage(&access, identity, user_id, target)?;

        if !self.records.delete_membership(project_id, user_id).await? {
            return Err(ServiceError::NotFound("User not found in project team".to_string()));
        }
        info!("Removed {} from project {}", user_id, project_id);
        Ok(())
    }

    pub async fn change_role(
        &self,
        identity: &Identity,
        project_id: &str,
        user_id: &str,
        role: Role,
    ) -> ServiceResult<Membership> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::invalid_field("userId", "Missing user ID"));
        }
        if role == Role::Owner {
            return Err(ServiceError::invalid_field("role", "The owner role cannot be granted"));
        }
        let access = self.access(identity, project_id).await?;
        let target = self.member_role(&access, user_id).await?;
        Self::check_manage(&access, identity, user_id, target)?;
        if !access.role.can_manage(role) {
            return Err(ServiceError::Forbidden(format!("A {} cannot grant the {} role", access.role, role)));
        }

        if !self.records.set_membership_role(project_id, user_id, role).await? {
            return Err(ServiceError::NotFound("User not found in project team".to_string()));
        }
        info!("Changed role of {} in project {} to {}", user_id, project_id, role);
        self.records
            .get_membership(project_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found in project team".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewProject, Project, UserProfile};
    use crate::testing::{identity, TestContext};

    async fn setup() -> (TestContext, TeamService, Project) {
        let ctx = TestContext::new()
            .with_users(&["owner", "admin", "carol", "dave"])
            .await;
        let svc = TeamService::new(ctx.records.clone(), ctx.identity.clone());
        let project = Project::create(
            "owner",
            NewProject {
                name: Some("A".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );
        ctx.records.put_project(&project).await.unwrap();
        ctx.records
            .insert_membership_if_absent(&Membership::new(&project.project_id, "owner", Role::Owner))
            .await
            .unwrap();
        (ctx, svc, project)
    }

    #[tokio::test]
    async fn adding_same_member_twice_conflicts() {
        let (_ctx, svc, p) = setup().await;
        let owner = identity("owner");

        let first = svc
            .add_member_by_email(&owner, &p.project_id, "carol@example.com", None)
            .await
            .unwrap();
        assert_eq!(first.role, Role::Member);

        let second = svc
            .add_member_by_email(&owner, &p.project_id, "carol@example.com", Some(Role::Admin))
            .await;
        assert!(matches!(second, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (_ctx, svc, p) = setup().await;
        let result = svc
            .add_member_by_email(&identity("owner"), &p.project_id, "nobody@example.com", None)
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn owner_role_cannot_be_granted() {
        let (_ctx, svc, p) = setup().await;
        let result = svc
            .add_member_by_email(&identity("owner"), &p.project_id, "carol@example.com", Some(Role::Owner))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation { .. })));
    }

    #[tokio::test]
    async fn admin_manages_lower_roles_only() {
        let (_ctx, svc, p) = setup().await;
        let owner = identity("owner");
        let admin = identity("admin");
        svc.add_member_by_email(&owner, &p.project_id, "admin@example.com", Some(Role::Admin))
            .await
            .unwrap();
        svc.add_member_by_email(&owner, &p.project_id, "dave@example.com", Some(Role::Admin))
            .await
            .unwrap();
        svc.add_member_by_email(&admin, &p.project_id, "carol@example.com", Some(Role::Guest))
            .await
            .unwrap();

        let changed = svc
            .change_role(&admin, &p.project_id, "carol", Role::Contributor)
            .await
            .unwrap();
        assert_eq!(changed.role, Role::Contributor);

        // another admin, the owner, a promotion to admin, and itself are off limits
        assert!(svc.change_role(&admin, &p.project_id, "dave", Role::Guest).await.is_err());
        assert!(svc.remove_member(&admin, &p.project_id, "owner").await.is_err());
        assert!(svc.change_role(&admin, &p.project_id, "carol", Role::Admin).await.is_err());
        assert!(svc.remove_member(&admin, &p.project_id, "admin").await.is_err());

        svc.remove_member(&admin, &p.project_id, "carol").await.unwrap();
    }

    #[tokio::test]
    async fn owner_cannot_remove_themself_but_can_remove_admins() {
        let (_ctx, svc, p) = setup().await;
        let owner = identity("owner");
        svc.add_member_by_email(&owner, &p.project_id, "admin@example.com", Some(Role::Admin))
            .await
            .unwrap();

        assert!(matches!(
            svc.remove_member(&owner, &p.project_id, "owner").await,
            Err(ServiceError::Forbidden(_))
        ));
        svc.remove_member(&owner, &p.project_id, "admin").await.unwrap();
        assert!(matches!(
            svc.remove_member(&owner, &p.project_id, "admin").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn contributors_cannot_manage_team() {
        let (_ctx, svc, p) = setup().await;
        let owner = identity("owner");
        svc.add_member_by_email(&owner, &p.project_id, "carol@example.com", Some(Role::Contributor))
            .await
            .unwrap();
        let result = svc
            .add_member_by_email(&identity("carol"), &p.project_id, "dave@example.com", None)
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn team_listing_joins_profiles() {
        let (ctx, svc, p) = setup().await;
        let owner = identity("owner");
        svc.add_member_by_email(&owner, &p.project_id, "carol@example.com", None)
            .await
            .unwrap();
        ctx.records
            .put_user(&UserProfile {
                user_id: "owner".to_string(),
                given_name: "Olive".to_string(),
                family_name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                synced_at: None,
            })
            .await
            .unwrap();

        let team = svc.list_team(&owner, &p.project_id).await.unwrap();
        assert_eq!(team.len(), 2);
        let olive = team.iter().find(|m| m.user_id == "owner").unwrap();
        assert_eq!(olive.given_name, "Olive");
        assert_eq!(olive.role, Role::Owner);
        let carol = team.iter().find(|m| m.user_id == "carol").unwrap();
        assert_eq!(carol.given_name, "");
    }
}
