use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached copy of an identity-provider account, written by `/users/sync`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(rename = "given_name")]
    pub given_name: String,
    #[serde(rename = "family_name")]
    pub family_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// True when the displayed attributes differ; `synced_at` is ignored.
    pub fn differs_from(&self, other: &UserProfile) -> bool {
        self.given_name != other.given_name
            || self.family_name != other.family_name
            || self.email != other.email
    }
}
