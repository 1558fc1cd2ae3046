use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::directory::Directory;

pub const DEFAULT_STATUS: &str = "Not Started";

/// Primary key of a project record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub owner_id: String,
    pub project_id: String,
}

impl ProjectKey {
    pub fn new(owner_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            project_id: project_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub owner_id: String,
    /// Mirrors `owner_id`; older clients key projects by `userId`
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub s3_folder: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub team: Vec<Value>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub updates: Vec<ProjectUpdate>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub inspections: Vec<Inspection>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub directory: Directory,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimelineStatus {
    Pending,
    InProgress,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub phase: String,
    #[serde(default)]
    pub date: String,
    pub status: TimelineStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionStatus {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub inspector: String,
    pub status: InspectionStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Body of `POST /api/projects`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
}

impl NewProject {
    /// Check required fields and formats; returns per-field messages.
    pub fn validate(&self) -> Result<(), HashMap<String, String>> {
        let mut errors = HashMap::new();

        match self.name.as_deref().map(str::trim) {
            None | Some("") => {
                errors.insert("name".to_string(), "This field is required".to_string());
            }
            _ => {}
        }

        for (field, value) in [("startDate", &self.start_date), ("endDate", &self.end_date)] {
            if let Some(date) = value.as_deref().filter(|d| !d.is_empty()) {
                if parse_date(date).is_none() {
                    errors.insert(field.to_string(), format!("Invalid date '{}', expected YYYY-MM-DD", date));
                }
            }
        }

        if let (Some(start), Some(end)) = (
            self.start_date.as_deref().and_then(parse_date),
            self.end_date.as_deref().and_then(parse_date),
        ) {
            if end < start {
                errors.insert("endDate".to_string(), "endDate must not precede startDate".to_string());
            }
        }

        if matches!(self.budget, Some(b) if b < 0.0 || !b.is_finite()) {
            errors.insert("budget".to_string(), "budget must be a non-negative number".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

impl Project {
    /// Build a fresh record for `owner_id`. `request` must already be validated.
    pub fn create(owner_id: &str, request: NewProject, now: DateTime<Utc>) -> Self {
        let project_id = Uuid::new_v4().to_string();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        Self {
            s3_folder: format!("{}/{}/", owner_id, project_id),
            project_id,
            owner_id: owner_id.to_string(),
            user_id: owner_id.to_string(),
            name: request.name.unwrap_or_default().trim().to_string(),
            description: request.description.unwrap_or_default(),
            start_date: non_empty(request.start_date),
            end_date: non_empty(request.end_date),
            created_at: now,
            client: request.client.unwrap_or_default(),
            location: request.location.unwrap_or_default(),
            status: default_status(),
            progress: 0.0,
            budget: request.budget.unwrap_or(0.0),
            milestones: Vec::new(),
            team: Vec::new(),
            expenses: Vec::new(),
            timeline: Vec::new(),
            updates: Vec::new(),
            notes: Vec::new(),
            inspections: Vec::new(),
            tasks: Vec::new(),
            directory: Directory::root(),
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(&self.owner_id, &self.project_id)
    }

    /// Record as JSON with the caller's role attached, as returned by the API
    pub fn with_role(&self, role: &str) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("currentUserRole".to_string(), Value::String(role.to_string()));
        }
        Ok(value)
    }
}

/// Project attributes that clients may overwrite directly.
///
/// Keys, ownership, creation time and the directory tree are excluded; the
/// tree has its own operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectField {
    Name,
    Description,
    Client,
    Location,
    StartDate,
    EndDate,
    Status,
    Progress,
    Budget,
    Milestones,
    Team,
    Expenses,
    Timeline,
    Updates,
    Notes,
    Inspections,
    Tasks,
}

impl ProjectField {
    pub const ALL: &'static [ProjectField] = &[
        ProjectField::Name,
        ProjectField::Description,
        ProjectField::Client,
        ProjectField::Location,
        ProjectField::StartDate,
        ProjectField::EndDate,
        ProjectField::Status,
        ProjectField::Progress,
        ProjectField::Budget,
        ProjectField::Milestones,
        ProjectField::Team,
        ProjectField::Expenses,
        ProjectField::Timeline,
        ProjectField::Updates,
        ProjectField::Notes,
        ProjectField::Inspections,
        ProjectField::Tasks,
    ];

    /// Attribute name inside the stored record
    pub fn attribute(self) -> &'static str {
        match self {
            ProjectField::Name => "name",
            ProjectField::Description => "description",
            ProjectField::Client => "client",
            ProjectField::Location => "location",
            ProjectField::StartDate => "startDate",
            ProjectField::EndDate => "endDate",
            ProjectField::Status => "status",
            ProjectField::Progress => "progress",
            ProjectField::Budget => "budget",
            ProjectField::Milestones => "milestones",
            ProjectField::Team => "team",
            ProjectField::Expenses => "expenses",
            ProjectField::Timeline => "timeline",
            ProjectField::Updates => "updates",
            ProjectField::Notes => "notes",
            ProjectField::Inspections => "inspections",
            ProjectField::Tasks => "tasks",
        }
    }

    pub fn parse(attribute: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.attribute() == attribute)
    }

    /// Type-check `value` for this field and return its normalized form.
    pub fn validate(self, value: Value) -> Result<Value, String> {
        match self {
            ProjectField::Name => match value.as_str().map(str::trim) {
                Some(name) if !name.is_empty() => Ok(Value::String(name.to_string())),
                _ => Err("must be a non-empty string".to_string()),
            },
            ProjectField::Description
            | ProjectField::Client
            | ProjectField::Location
            | ProjectField::Status => match value {
                Value::String(_) => Ok(value),
                _ => Err("must be a string".to_string()),
            },
            ProjectField::StartDate | ProjectField::EndDate => match &value {
                Value::Null => Ok(value),
                Value::String(s) if s.is_empty() => Ok(Value::Null),
                Value::String(s) if parse_date(s).is_some() => Ok(value),
                _ => Err("must be a YYYY-MM-DD date or null".to_string()),
            },
            ProjectField::Progress => match value.as_f64() {
                Some(p) if (0.0..=100.0).contains(&p) => Ok(value),
                _ => Err("must be a number between 0 and 100".to_string()),
            },
            ProjectField::Budget => match value.as_f64() {
                Some(b) if b >= 0.0 => Ok(value),
                _ => Err("must be a non-negative number".to_string()),
            },
            ProjectField::Milestones => normalize::<Vec<Milestone>>(value),
            ProjectField::Team => match value {
                Value::Array(_) => Ok(value),
                _ => Err("must be an array".to_string()),
            },
            ProjectField::Expenses => normalize::<Vec<Expense>>(value),
            ProjectField::Timeline => normalize::<Vec<TimelineEvent>>(value),
            ProjectField::Updates => normalize::<Vec<ProjectUpdate>>(value),
            ProjectField::Notes => normalize::<Vec<Note>>(value),
            ProjectField::Inspections => normalize::<Vec<Inspection>>(value),
            ProjectField::Tasks => normalize::<Vec<Task>>(value),
        }
    }
}

fn normalize<T>(value: Value) -> Result<Value, String>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let typed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    serde_json::to_value(typed).map_err(|e| e.to_string())
}

/// Validate a set of `attribute -> value` changes against the allow-list.
///
/// Every entry is checked before anything is returned, so a single bad key
/// rejects the whole batch.
pub fn validate_changes(
    changes: Map<String, Value>,
) -> Result<Vec<(ProjectField, Value)>, HashMap<String, String>> {
    let mut accepted = Vec::with_capacity(changes.len());
    let mut errors = HashMap::new();

    for (attribute, value) in changes {
        match ProjectField::parse(&attribute) {
            None => {
                errors.insert(attribute, "Field cannot be updated".to_string());
            }
            Some(field) => match field.validate(value) {
                Ok(normalized) => accepted.push((field, normalized)),
                Err(message) => {
                    errors.insert(attribute, message);
                }
            },
        }
    }

    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(errors)
    }
}
