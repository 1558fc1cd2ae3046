pub mod auth;
pub mod response;

pub use auth::{identity_from_parts, session_middleware};
pub use response::{message, ApiResponse, ApiResult, JsonBody};
