// Public handlers: no session required.
//
// Covers the service banner, health probe and the browser login flow.
// `/me` is public so that a missing session can be answered with
// `{"authenticated": false}` instead of a bare 401.

pub mod session;
pub mod status;

pub use session::{authorize, login, logout, me};
pub use status::{health, root};
