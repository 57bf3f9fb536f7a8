//! Configuration loading for the admin gate service.
//!
//! Loads configuration from TOML files and/or environment variables using figment,
//! so the service runs the same way from a config file or inside a container.
//!
//! # Configuration Sources (in order of priority, lowest to highest)
//!
//! 1. Default values (from `#[serde(default)]` attributes)
//! 2. TOML config file (if provided)
//! 3. Environment variables (prefix: `TEKKI_`, nested with `__`)
//!
//! # Environment Variable Naming
//!
//! - `TEKKI_SERVER__LISTEN_ADDR` → `server.listen_addr`
//! - `TEKKI_IDENTITY__URL` → `identity.url`
//! - `TEKKI_IDENTITY__ANON_KEY` → `identity.anon_key`
//! - `TEKKI_DIRECTORY__BACKEND` → `directory.backend`
//! - `TEKKI_PATHS__LOGIN` → `paths.login`

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::admin::routes::FIXED_ROUTES;

/// Main configuration for the admin gate service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Admin paths matched by the session gate
    #[serde(default)]
    pub paths: PathsConfig,

    /// Identity provider (Supabase Auth) settings
    pub identity: IdentityConfig,

    /// Where admin designations are looked up
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Database configuration (only used by the `database` directory backend).
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

/// Admin paths.
///
/// The login path is matched exactly (no prefix or trailing-slash matching).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_login_path")]
    pub login: String,

    #[serde(default = "default_dashboard_path")]
    pub dashboard: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            dashboard: default_dashboard_path(),
        }
    }
}

impl PathsConfig {
    /// Check that both paths can be routed next to the fixed routes.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("login", &self.login), ("dashboard", &self.dashboard)] {
            if !path.starts_with('/') {
                bail!("paths.{name} must start with '/': {path:?}");
            }
            if path.contains(|c| matches!(c, '{' | '}' | '*')) {
                bail!("paths.{name} must be a literal path: {path:?}");
            }
            if FIXED_ROUTES.contains(&path.as_str()) {
                bail!("paths.{name} collides with a built-in route: {path}");
            }
        }

        if self.login == self.dashboard {
            bail!(
                "paths.login and paths.dashboard must differ (both are {})",
                self.login
            );
        }

        Ok(())
    }
}

fn default_login_path() -> String {
    "/admin/login".to_string()
}

fn default_dashboard_path() -> String {
    "/admin/dashboard".to_string()
}

/// Supabase Auth configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`
    pub url: String,

    /// Public anon key, sent as the `apikey` header
    pub anon_key: String,

    /// Cookie carrying the access token
    #[serde(default = "default_access_cookie")]
    pub access_cookie: String,

    /// Cookie carrying the refresh token
    #[serde(default = "default_refresh_cookie")]
    pub refresh_cookie: String,

    /// Mark rewritten cookies `Secure`
    #[serde(default = "default_true")]
    pub secure_cookies: bool,

    /// HTTP client timeout for provider calls, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_access_cookie() -> String {
    "sb-access-token".to_string()
}

fn default_refresh_cookie() -> String {
    "sb-refresh-token".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

/// Backend used for admin-designation lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryBackend {
    /// Supabase REST (PostgREST) table next to the identity provider.
    #[default]
    Rest,

    /// Local SQL database managed by this service's migrations.
    Database,
}

/// Admin directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub backend: DirectoryBackend,

    /// Table holding admin designations (REST backend).
    #[serde(default = "default_admin_table")]
    pub table: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: DirectoryBackend::default(),
            table: default_admin_table(),
        }
    }
}

fn default_admin_table() -> String {
    "admin_users".to_string()
}

// =============================================================================
// Database Configuration (compile-time feature selection)
// =============================================================================

/// SQLite database configuration (used when compiled with `sqlite` feature).
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    /// If not specified, defaults to `admin.db` in the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// PostgreSQL database configuration (used when compiled with `postgres` feature).
#[cfg(feature = "postgres")]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database host (default: "localhost")
    #[serde(default = "default_postgres_host")]
    pub host: String,

    /// Database port (default: 5432)
    #[serde(default = "default_postgres_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database name (default: "tekki")
    #[serde(default = "default_postgres_database")]
    pub database: String,
}

#[cfg(feature = "postgres")]
fn default_postgres_host() -> String {
    "localhost".to_string()
}

#[cfg(feature = "postgres")]
fn default_postgres_port() -> u16 {
    5432
}

#[cfg(feature = "postgres")]
fn default_postgres_database() -> String {
    "tekki".to_string()
}

#[cfg(feature = "postgres")]
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_postgres_host(),
            port: default_postgres_port(),
            user: String::new(),
            password: String::new(),
            database: default_postgres_database(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Configuration sources are merged in order (later sources override earlier):
    /// 1. TOML config file (if it exists)
    /// 2. Environment variables (prefix: `TEKKI_`, nested with `__`)
    ///
    /// # Example
    ///
    /// ```bash
    /// export TEKKI_IDENTITY__ANON_KEY=eyJhbGciOi...
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let mut figment = Figment::new();

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TEKKI_").split("__"));

        let config: Config = figment.extract().with_context(|| {
            format!(
                "Failed to load config from {} and environment",
                path.display()
            )
        })?;

        config
            .paths
            .validate()
            .context("Invalid [paths] configuration")?;

        Ok(config)
    }

    /// Get the default config file path
    /// - macOS: ~/Library/Application Support/tekki-admin/config.toml
    /// - Linux: ~/.config/tekki-admin/config.toml
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tekki-admin")
            .join("config.toml")
    }

    /// Get the default data directory (for logs and the SQLite database)
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tekki-admin")
    }
}

/// Create a default configuration template
pub fn default_config_template() -> String {
    let data_dir = Config::default_data_dir();
    let data_dir_str = data_dir.display();

    format!(
        r#"# TEKKI Studio admin gate configuration
# Data directory: {data_dir_str}

[server]
listen_addr = "0.0.0.0:3000"

[paths]
login = "/admin/login"
dashboard = "/admin/dashboard"

[identity]
url = "https://your-project.supabase.co"
anon_key = "your-anon-key"
# access_cookie = "sb-access-token"
# refresh_cookie = "sb-refresh-token"
# secure_cookies = true
# timeout_secs = 10

# =============================================================================
# Admin directory
# =============================================================================
#
# - "rest" (default): look up admin_users through the Supabase REST API,
#   using the caller's access token.
# - "database": look up admin_users in the local database below.

[directory]
backend = "rest"
table = "admin_users"

# SQLite configuration (when compiled with --features sqlite)
[database]
# path = "{data_dir_str}/admin.db"  # Optional, defaults to data_dir/admin.db

# PostgreSQL configuration (when compiled with --features postgres)
# [database]
# host = "localhost"
# port = 5432
# user = "tekki"
# password = "secret"
# database = "tekki"
"#
    )
}
