// Protected handlers: session required.
//
// Routes are mounted under /api behind `session_middleware`, which inserts
// the caller's `Identity`. Every handler passes that identity to the service
// layer, where project access and role checks happen.

pub mod files;
pub mod project_data;
pub mod projects;
pub mod team;
pub mod users;
