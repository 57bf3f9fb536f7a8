//! Admin state and the login-page session gate.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::debug;

use crate::config::PathsConfig;
use crate::directory::AdminDirectory;
use crate::identity::IdentityProvider;

/// State shared by admin routes
pub struct AdminState {
    /// Session source (Supabase Auth in production)
    pub identity: Arc<dyn IdentityProvider>,
    /// Admin-designation lookups
    pub directory: Arc<dyn AdminDirectory>,
    /// Login path, matched exactly by the gate
    pub login_path: String,
    /// Where signed-in users are sent from the login page
    pub dashboard_path: String,
}

impl AdminState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn AdminDirectory>,
        paths: &PathsConfig,
    ) -> Self {
        Self {
            identity,
            directory,
            login_path: paths.login.clone(),
            dashboard_path: paths.dashboard.clone(),
        }
    }
}

/// Redirect signed-in users away from the login page.
///
/// Only requests whose path is exactly the login path trigger a session
/// lookup. A missing session and a failed lookup both let the request
/// through. Cookies rewritten by the provider are attached to whichever
/// response goes out.
pub async fn session_gate(
    State(state): State<Arc<AdminState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() != state.login_path {
        return next.run(request).await;
    }

    let (session, cookies) = state.identity.get_session(&jar).await.into_parts();

    match session {
        Some(session) => {
            debug!(user_id = %session.user_id, "Already signed in, redirecting to dashboard");
            (cookies, Redirect::to(&state.dashboard_path)).into_response()
        }
        None => (cookies, next.run(request).await).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticAdminDirectory;
    use crate::error::IdentityError;
    use crate::identity::{SessionLookup, StaticIdentityProvider};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header},
        middleware,
        routing::get,
    };
    use axum_extra::extract::cookie::Cookie;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Provider that fails every lookup and counts calls.
    #[derive(Default)]
    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for FailingProvider {
        async fn get_session(&self, _jar: &CookieJar) -> SessionLookup {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SessionLookup::failed(IdentityError::InvalidResponse("provider down".into()))
        }
    }

    /// Provider that always rotates cookies, with or without a session.
    struct RotatingProvider {
        signed_in: bool,
    }

    #[async_trait]
    impl IdentityProvider for RotatingProvider {
        async fn get_session(&self, _jar: &CookieJar) -> SessionLookup {
            let cookies = vec![Cookie::new("sb-access-token", "rotated")];
            let lookup = if self.signed_in {
                SessionLookup::active(crate::identity::Session {
                    user_id: "u1".into(),
                    email: None,
                    access_token: "rotated".into(),
                    expires_at: None,
                })
            } else {
                SessionLookup::absent()
            };
            lookup.with_cookies(cookies)
        }
    }

    fn app(identity: Arc<dyn IdentityProvider>) -> Router {
        let state = Arc::new(AdminState::new(
            identity,
            Arc::new(StaticAdminDirectory::new()),
            &PathsConfig::default(),
        ));
        Router::new()
            .route("/admin/login", get(|| async { "login page" }))
            .route("/admin/dashboard", get(|| async { "dashboard" }))
            .route("/", get(|| async { "home" }))
            .layer(middleware::from_fn_with_state(state, session_gate))
    }

    fn request(path: &str, cookie: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_signed_in_user_is_redirected_from_login() {
        let provider = StaticIdentityProvider::new("token").with_session("t1", "u1");
        let response = app(Arc::new(provider))
            .oneshot(request("/admin/login", Some("token=t1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/admin/dashboard"
        );
    }

    #[tokio::test]
    async fn test_no_session_renders_login() {
        let provider = StaticIdentityProvider::new("token").with_session("t1", "u1");
        let response = app(Arc::new(provider))
            .oneshot(request("/admin/login", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "login page");
    }

    #[tokio::test]
    async fn test_failed_lookup_renders_login() {
        let provider = Arc::new(FailingProvider::default());
        let response = app(provider.clone())
            .oneshot(request("/admin/login", Some("token=t1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "login page");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_paths_are_not_checked() {
        let provider = Arc::new(FailingProvider::default());
        let app = app(provider.clone());

        for path in ["/", "/admin/dashboard", "/admin/login/", "/admin/login/extra"] {
            let response = app
                .clone()
                .oneshot(request(path, Some("token=t1")))
                .await
                .unwrap();
            assert_ne!(response.status(), StatusCode::SEE_OTHER, "path {path}");
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_signed_in_user_on_other_path_is_not_redirected() {
        let provider = StaticIdentityProvider::new("token").with_session("t1", "u1");
        let response = app(Arc::new(provider))
            .oneshot(request("/", Some("token=t1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test]
    async fn test_rotated_cookies_forwarded_on_redirect() {
        let response = app(Arc::new(RotatingProvider { signed_in: true }))
            .oneshot(request("/admin/login", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert_eq!(set_cookie, "sb-access-token=rotated");
    }

    #[tokio::test]
    async fn test_rotated_cookies_forwarded_on_pass_through() {
        let response = app(Arc::new(RotatingProvider { signed_in: false }))
            .oneshot(request("/admin/login", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert_eq!(set_cookie, "sb-access-token=rotated");
    }
}
