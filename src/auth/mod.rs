//! Users, sessions and request authentication.

pub mod db;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use handlers::*;
pub use middleware::AuthContext;
