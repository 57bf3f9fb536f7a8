//! Admin-designation lookups.
//!
//! An admin designation is a row in `admin_users` keyed by the identity
//! provider's user id. Rows are created and removed outside this service;
//! here they are only read, by exact match, on every check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::HashMap;

use crate::config::{DirectoryConfig, IdentityConfig};
use crate::db::{DbPool, DbRow};
use crate::error::DirectoryError;
use crate::identity::Session;
use crate::sql;

/// Admin user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lookup of admin designations by user id.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Find the admin record whose `user_id` equals the session's user id.
    async fn find_admin(&self, session: &Session) -> Result<Option<AdminUser>, DirectoryError>;
}

/// Supabase REST (PostgREST) backed directory.
///
/// Queries run with the caller's access token so row-level security applies.
pub struct RestAdminDirectory {
    client: Client,
    table_url: String,
    anon_key: String,
}

impl RestAdminDirectory {
    pub fn new(client: Client, identity: &IdentityConfig, directory: &DirectoryConfig) -> Self {
        Self {
            client,
            table_url: format!(
                "{}/rest/v1/{}",
                identity.url.trim_end_matches('/'),
                directory.table
            ),
            anon_key: identity.anon_key.clone(),
        }
    }
}

#[async_trait]
impl AdminDirectory for RestAdminDirectory {
    async fn find_admin(&self, session: &Session) -> Result<Option<AdminUser>, DirectoryError> {
        let response = self
            .client
            .get(&self.table_url)
            .query(&[
                ("user_id", format!("eq.{}", session.user_id).as_str()),
                ("select", "*"),
                ("limit", "1"),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let rows = response
            .json::<Vec<AdminUser>>()
            .await
            .map_err(|e| DirectoryError::InvalidRecord(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}

/// SQL backed directory (SQLite or PostgreSQL, per feature).
pub struct SqlAdminDirectory {
    pool: DbPool,
}

impl SqlAdminDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn admin_from_row(row: &DbRow) -> Result<AdminUser, DirectoryError> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| DirectoryError::InvalidRecord(format!("created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(AdminUser {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            email: row.try_get("email")?,
            created_at,
        })
    }
}

#[async_trait]
impl AdminDirectory for SqlAdminDirectory {
    async fn find_admin(&self, session: &Session) -> Result<Option<AdminUser>, DirectoryError> {
        let row = sqlx::query(sql::SELECT_ADMIN_USER)
            .bind(&session.user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::admin_from_row).transpose()
    }
}

/// In-memory directory keyed by user id.
#[derive(Default)]
pub struct StaticAdminDirectory {
    admins: HashMap<String, AdminUser>,
}

impl StaticAdminDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, admin: AdminUser) -> Self {
        self.admins.insert(admin.user_id.clone(), admin);
        self
    }
}

#[async_trait]
impl AdminDirectory for StaticAdminDirectory {
    async fn find_admin(&self, session: &Session) -> Result<Option<AdminUser>, DirectoryError> {
        Ok(self.admins.get(&session.user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(user_id: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            email: None,
            access_token: "access-1".to_string(),
            expires_at: None,
        }
    }

    fn rest_directory(url: &str) -> RestAdminDirectory {
        let identity = IdentityConfig {
            url: format!("{url}/"),
            anon_key: "anon-key".to_string(),
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            secure_cookies: false,
            timeout_secs: 5,
        };
        RestAdminDirectory::new(Client::new(), &identity, &DirectoryConfig::default())
    }

    #[tokio::test]
    async fn test_rest_lookup_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .and(query_param("user_id", "eq.u1"))
            .and(query_param("select", "*"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "a1",
                "user_id": "u1",
                "email": "admin@tekki.studio",
                "created_at": "2024-05-01T10:00:00+00:00"
            }])))
            .mount(&server)
            .await;

        let admin = rest_directory(&server.uri())
            .find_admin(&session("u1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(admin.id, "a1");
        assert_eq!(admin.user_id, "u1");
        assert_eq!(admin.email.as_deref(), Some("admin@tekki.studio"));
    }

    #[tokio::test]
    async fn test_rest_lookup_empty_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let admin = rest_directory(&server.uri())
            .find_admin(&session("u2"))
            .await
            .unwrap();
        assert!(admin.is_none());
    }

    #[tokio::test]
    async fn test_rest_lookup_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/admin_users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let err = rest_directory(&server.uri())
            .find_admin(&session("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::UnexpectedStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticAdminDirectory::new().with_admin(AdminUser {
            id: "a1".into(),
            user_id: "u1".into(),
            email: None,
            created_at: Utc::now(),
        });

        assert!(directory.find_admin(&session("u1")).await.unwrap().is_some());
        assert!(directory.find_admin(&session("u2")).await.unwrap().is_none());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sql_lookup() {
        use crate::config::DatabaseConfig;
        use crate::db::Database;
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let db = Database::new(&DatabaseConfig::default(), temp.path())
            .await
            .unwrap();

        sqlx::query(sql::INSERT_ADMIN_USER)
            .bind("a1")
            .bind("u1")
            .bind("admin@tekki.studio")
            .bind("2024-05-01T10:00:00+00:00")
            .execute(&db.pool())
            .await
            .unwrap();

        let directory = SqlAdminDirectory::new(db.pool());

        let admin = directory.find_admin(&session("u1")).await.unwrap().unwrap();
        assert_eq!(admin.id, "a1");
        assert_eq!(admin.email.as_deref(), Some("admin@tekki.studio"));
        assert_eq!(admin.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        // Exact match only
        assert!(directory.find_admin(&session("U1")).await.unwrap().is_none());
        assert!(directory.find_admin(&session("u")).await.unwrap().is_none());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sql_lookup_bad_timestamp() {
        use crate::config::DatabaseConfig;
        use crate::db::Database;
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let db = Database::new(&DatabaseConfig::default(), temp.path())
            .await
            .unwrap();

        sqlx::query(sql::INSERT_ADMIN_USER)
            .bind("a1")
            .bind("u1")
            .bind(None::<String>)
            .bind("yesterday")
            .execute(&db.pool())
            .await
            .unwrap();

        let err = SqlAdminDirectory::new(db.pool())
            .find_admin(&session("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidRecord(_)));
    }
}
