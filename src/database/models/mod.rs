pub mod membership;
pub mod project;
pub mod user;

pub use membership::{Membership, Role, UnknownRole};
pub use project::{
    validate_changes, Expense, Inspection, Milestone, NewProject, Note, Project, ProjectField,
    ProjectKey, ProjectUpdate, Task, TimelineEvent,
};
pub use user::UserProfile;
