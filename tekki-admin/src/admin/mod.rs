//! Web administration module.
//!
//! Provides:
//! - The login-page session gate
//! - The administrator role check and its extractor
//! - Admin routes for the login page, dashboard, and session APIs

pub mod middleware;
pub mod role;
pub mod routes;
pub mod templates;

pub use middleware::{AdminState, session_gate};
pub use role::{AdminAccess, AdminCheck, AuthStatus, check_admin};
pub use routes::admin_router;
