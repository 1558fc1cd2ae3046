use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-project role of a team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Contributor,
    Guest,
    /// Default for members added without an explicit role
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Contributor => "contributor",
            Role::Guest => "guest",
            Role::Member => "member",
        }
    }

    /// Guests may read a project but not change it.
    pub fn can_edit(self) -> bool {
        !matches!(self, Role::Guest)
    }

    /// Owners and admins manage the team.
    pub fn can_manage_team(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Whether `self` may change the role of, or remove, a member holding
    /// `target`. Acting on yourself is checked separately.
    pub fn can_manage(self, target: Role) -> bool {
        match self {
            Role::Owner => target != Role::Owner,
            Role::Admin => matches!(target, Role::Contributor | Role::Guest | Role::Member),
            _ => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "contributor" => Ok(Role::Contributor),
            "guest" => Ok(Role::Guest),
            "member" => Ok(Role::Member),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub project_id: String,
    pub user_id: String,
    pub role: Role,
    pub added_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(project_id: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            role,
            added_at: Utc::now(),
        }
    }
}
