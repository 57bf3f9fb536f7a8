//! Identity provider client.
//!
//! Reads the provider's credential cookies from a request and asks the
//! provider who the caller is. Handles:
//! - Access token validation against Supabase Auth (`/auth/v1/user`)
//! - Refresh-token rotation when the access token is rejected
//! - Cookie rewrites that must be forwarded to the client

use async_trait::async_trait;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::IdentityConfig;
use crate::error::IdentityError;

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    /// Known only when the session was just refreshed.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a session lookup.
///
/// `Absent` and `Failed` are kept apart for logging only; every caller
/// treats them the same way.
#[derive(Debug)]
pub enum SessionOutcome {
    Active(Session),
    Absent,
    Failed(IdentityError),
}

/// A session lookup together with the cookies the provider rewrote.
#[derive(Debug)]
pub struct SessionLookup {
    pub outcome: SessionOutcome,
    /// Cookies to write back on the response, unchanged.
    pub set_cookies: Vec<Cookie<'static>>,
}

impl SessionLookup {
    pub fn active(session: Session) -> Self {
        Self {
            outcome: SessionOutcome::Active(session),
            set_cookies: Vec::new(),
        }
    }

    pub fn absent() -> Self {
        Self {
            outcome: SessionOutcome::Absent,
            set_cookies: Vec::new(),
        }
    }

    pub fn failed(error: IdentityError) -> Self {
        Self {
            outcome: SessionOutcome::Failed(error),
            set_cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie<'static>>) -> Self {
        self.set_cookies = cookies;
        self
    }

    /// Collapse the lookup into an optional session plus the cookie jar to
    /// attach to the response. Failures are logged and become `None`.
    pub fn into_parts(self) -> (Option<Session>, CookieJar) {
        let jar = self
            .set_cookies
            .into_iter()
            .fold(CookieJar::new(), |jar, cookie| jar.add(cookie));

        let session = match self.outcome {
            SessionOutcome::Active(session) => Some(session),
            SessionOutcome::Absent => None,
            SessionOutcome::Failed(e) => {
                warn!(error = %e, "Session lookup failed, treating as signed out");
                None
            }
        };

        (session, jar)
    }
}

/// Source of the current session for a request.
///
/// Abstracts the provider so we can use either:
/// - Supabase Auth (production)
/// - A static token table (tests)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the session carried by the request cookies.
    async fn get_session(&self, jar: &CookieJar) -> SessionLookup;
}

/// User object returned by `/auth/v1/user` and embedded in token responses.
#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Response from the refresh-token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SupabaseUser,
}

impl TokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            (None, Some(secs)) => Some(Utc::now() + chrono::Duration::seconds(secs)),
            (None, None) => None,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Supabase Auth (GoTrue) client.
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    access_cookie: String,
    refresh_cookie: String,
    secure_cookies: bool,
}

impl SupabaseAuth {
    /// Create a client on a shared HTTP connection pool. Timeouts are
    /// whatever `client` was built with.
    pub fn with_client(client: Client, config: &IdentityConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_cookie: config.access_cookie.clone(),
            refresh_cookie: config.refresh_cookie.clone(),
            secure_cookies: config.secure_cookies,
        }
    }

    /// Resolve an access token to a user. `Ok(None)` means the provider
    /// rejected the token.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<SupabaseUser>, IdentityError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let user = response
                    .json::<SupabaseUser>()
                    .await
                    .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
                Ok(Some(user))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(unexpected_status(status, response).await),
        }
    }

    /// Exchange a refresh token for a new token pair. `Ok(None)` means the
    /// refresh token is no longer valid.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenResponse>, IdentityError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let tokens = response
                    .json::<TokenResponse>()
                    .await
                    .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
                Ok(Some(tokens))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Ok(None)
            }
            status => Err(unexpected_status(status, response).await),
        }
    }

    fn session_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .path("/")
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .build()
    }

    fn removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.session_cookie(name, String::new());
        cookie.make_removal();
        cookie
    }
}

async fn unexpected_status(status: StatusCode, response: reqwest::Response) -> IdentityError {
    let body = response.text().await.unwrap_or_default();
    IdentityError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn get_session(&self, jar: &CookieJar) -> SessionLookup {
        let access_token = jar.get(&self.access_cookie).map(|c| c.value().to_string());
        let refresh_token = jar.get(&self.refresh_cookie).map(|c| c.value().to_string());

        if access_token.is_none() && refresh_token.is_none() {
            return SessionLookup::absent();
        }

        if let Some(token) = access_token {
            match self.fetch_user(&token).await {
                Ok(Some(user)) => {
                    return SessionLookup::active(Session {
                        user_id: user.id,
                        email: user.email,
                        access_token: token,
                        expires_at: None,
                    });
                }
                Ok(None) => debug!("Access token rejected by identity provider"),
                Err(e) => return SessionLookup::failed(e),
            }
        }

        let Some(refresh_token) = refresh_token else {
            return SessionLookup::absent();
        };

        match self.refresh(&refresh_token).await {
            Ok(Some(tokens)) => {
                debug!(user_id = %tokens.user.id, "Refreshed identity provider session");
                let cookies = vec![
                    self.session_cookie(&self.access_cookie, tokens.access_token.clone()),
                    self.session_cookie(&self.refresh_cookie, tokens.refresh_token.clone()),
                ];
                let expires_at = tokens.expiry();
                SessionLookup::active(Session {
                    user_id: tokens.user.id,
                    email: tokens.user.email,
                    access_token: tokens.access_token,
                    expires_at,
                })
                .with_cookies(cookies)
            }
            Ok(None) => {
                debug!("Refresh token rejected, clearing session cookies");
                SessionLookup::absent().with_cookies(vec![
                    self.removal_cookie(&self.access_cookie),
                    self.removal_cookie(&self.refresh_cookie),
                ])
            }
            Err(e) => SessionLookup::failed(e),
        }
    }
}

/// Identity provider backed by a fixed token table.
///
/// Tokens are read from a single cookie; unknown tokens have no session.
pub struct StaticIdentityProvider {
    cookie_name: String,
    sessions: HashMap<String, Session>,
}

impl StaticIdentityProvider {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions: HashMap::new(),
        }
    }

    /// Register a token that resolves to a session for `user_id`.
    pub fn with_session(mut self, token: &str, user_id: &str) -> Self {
        self.sessions.insert(
            token.to_string(),
            Session {
                user_id: user_id.to_string(),
                email: None,
                access_token: token.to_string(),
                expires_at: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn get_session(&self, jar: &CookieJar) -> SessionLookup {
        jar.get(&self.cookie_name)
            .and_then(|cookie| self.sessions.get(cookie.value()))
            .cloned()
            .map_or_else(SessionLookup::absent, SessionLookup::active)
    }
}
