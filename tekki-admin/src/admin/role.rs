//! Administrator role check for protected handlers.
//!
//! A caller is an administrator when the identity provider reports a session
//! and the admin directory holds a row for that session's user id. Every
//! other outcome (no session, failed lookup, no row, failed query) denies.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::admin::middleware::AdminState;
use crate::directory::{AdminDirectory, AdminUser};
use crate::identity::{IdentityProvider, Session};

/// Result of an administrator check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheck {
    /// No session, or the session lookup failed.
    NotAuthenticated,
    /// Signed in, but no admin designation (or the lookup failed).
    NotAdmin(Session),
    /// Signed in and designated as administrator.
    Admin {
        session: Session,
        admin_user: AdminUser,
    },
}

impl AdminCheck {
    /// True only for administrators; `NotAdmin` counts as unauthenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AdminCheck::Admin { .. })
    }

    pub fn admin_user(&self) -> Option<&AdminUser> {
        match self {
            AdminCheck::Admin { admin_user, .. } => Some(admin_user),
            _ => None,
        }
    }

    /// Client-facing view. Both negative outcomes serialize identically.
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            is_authenticated: self.is_authenticated(),
            admin_user: self.admin_user().cloned(),
        }
    }
}

/// `{"isAuthenticated": bool, "adminUser": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<AdminUser>,
}

/// Check whether the request's credentials belong to an administrator.
///
/// Re-queries both the provider and the directory on every call. Returns the
/// provider's rewritten cookies alongside the result.
pub async fn check_admin(
    identity: &dyn IdentityProvider,
    directory: &dyn AdminDirectory,
    jar: &CookieJar,
) -> (AdminCheck, CookieJar) {
    let (session, cookies) = identity.get_session(jar).await.into_parts();

    let Some(session) = session else {
        return (AdminCheck::NotAuthenticated, cookies);
    };

    let check = match directory.find_admin(&session).await {
        Ok(Some(admin_user)) => AdminCheck::Admin {
            session,
            admin_user,
        },
        Ok(None) => {
            debug!(user_id = %session.user_id, "No admin designation for user");
            AdminCheck::NotAdmin(session)
        }
        Err(e) => {
            warn!(user_id = %session.user_id, error = %e, "Admin lookup failed, denying");
            AdminCheck::NotAdmin(session)
        }
    };

    (check, cookies)
}

/// Extractor that admits administrators only.
///
/// Handlers should return `cookies` with their response so refreshed
/// provider cookies reach the client.
pub struct AdminAccess {
    pub session: Session,
    pub admin_user: AdminUser,
    pub cookies: CookieJar,
}

/// Rejection for [`AdminAccess`]: 401 regardless of why access was denied.
pub struct AdminRejection {
    cookies: CookieJar,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            self.cookies,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

impl FromRequestParts<Arc<AdminState>> for AdminAccess {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AdminState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let (check, cookies) =
            check_admin(state.identity.as_ref(), state.directory.as_ref(), &jar).await;

        match check {
            AdminCheck::Admin {
                session,
                admin_user,
            } => Ok(Self {
                session,
                admin_user,
                cookies,
            }),
            AdminCheck::NotAuthenticated | AdminCheck::NotAdmin(_) => {
                Err(AdminRejection { cookies })
            }
        }
    }
}
