//! Admin route handlers.
//!
//! Provides HTTP handlers for the admin UI (login page, dashboard) and the
//! admin session APIs.

use askama::Template;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::admin::middleware::{AdminState, session_gate};
use crate::admin::role::{AdminAccess, AdminCheck, check_admin};
use crate::admin::templates::{DashboardTemplate, ForbiddenTemplate, LoginTemplate};

pub const SESSION_STATUS_PATH: &str = "/api/admin/session";
pub const CURRENT_ADMIN_PATH: &str = "/api/admin/me";
pub const HEALTH_PATH: &str = "/healthz";

/// Routes served regardless of configuration. Configured paths may not use them.
pub const FIXED_ROUTES: [&str; 3] = [SESSION_STATUS_PATH, CURRENT_ADMIN_PATH, HEALTH_PATH];

/// Build the admin router with the session gate in front of every route.
///
/// The configured paths must have passed [`PathsConfig::validate`]
/// (done by `Config::load`).
///
/// [`PathsConfig::validate`]: crate::config::PathsConfig::validate
pub fn admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route(&state.login_path, get(login_page))
        .route(&state.dashboard_path, get(dashboard))
        .route(SESSION_STATUS_PATH, get(session_status))
        .route(CURRENT_ADMIN_PATH, get(current_admin))
        .route(HEALTH_PATH, get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), session_gate)),
        )
        .with_state(state)
}

fn render(template: &impl Template) -> Html<String> {
    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {e}")),
    )
}

/// Login page handler. Signed-in users never get here; the gate redirects them.
async fn login_page(State(state): State<Arc<AdminState>>) -> Response {
    render(&LoginTemplate {
        dashboard_path: state.dashboard_path.clone(),
    })
    .into_response()
}

/// Dashboard handler.
///
/// Signed-out callers go to the login page. Signed-in callers without an
/// admin designation get a 403 page, never the login page: the gate would
/// redirect them straight back here.
async fn dashboard(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    let (check, cookies) =
        check_admin(state.identity.as_ref(), state.directory.as_ref(), &jar).await;

    let (session, admin_user) = match check {
        AdminCheck::Admin {
            session,
            admin_user,
        } => (session, admin_user),
        AdminCheck::NotAdmin(_) => {
            return (StatusCode::FORBIDDEN, cookies, render(&ForbiddenTemplate)).into_response();
        }
        AdminCheck::NotAuthenticated => {
            return (cookies, Redirect::to(&state.login_path)).into_response();
        }
    };

    let template = DashboardTemplate {
        user_id: session.user_id,
        email: session.email.or(admin_user.email),
        admin_since: admin_user.created_at.format("%Y-%m-%d").to_string(),
    };

    (cookies, render(&template)).into_response()
}

/// Role-check status for client-side code. Always 200.
async fn session_status(State(state): State<Arc<AdminState>>, jar: CookieJar) -> Response {
    let (check, cookies) =
        check_admin(state.identity.as_ref(), state.directory.as_ref(), &jar).await;
    (cookies, Json(check.status())).into_response()
}

/// The caller's admin record; 401 for anyone else.
async fn current_admin(access: AdminAccess) -> Response {
    (access.cookies, Json(access.admin_user)).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}
