//! SQL query constants with database-specific placeholders.
//!
//! SQLite uses `?` placeholders, PostgreSQL uses `$1, $2, ...` numbered placeholders.

#[cfg(feature = "sqlite")]
pub const SELECT_ADMIN_USER: &str =
    "SELECT id, user_id, email, created_at FROM admin_users WHERE user_id = ?";

#[cfg(feature = "postgres")]
pub const SELECT_ADMIN_USER: &str =
    "SELECT id, user_id, email, created_at FROM admin_users WHERE user_id = $1";

#[cfg(all(test, feature = "sqlite"))]
pub const INSERT_ADMIN_USER: &str =
    "INSERT INTO admin_users (id, user_id, email, created_at) VALUES (?, ?, ?, ?)";
