//! Askama templates for the admin UI.

use askama::Template;

/// Login page template
///
/// Sign-in itself happens in the browser against the identity provider;
/// the page only needs to know where to go afterwards.
#[derive(Template)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub dashboard_path: String,
}

/// Dashboard page template
#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub user_id: String,
    pub email: Option<String>,
    pub admin_since: String,
}

/// Shown to signed-in users without an admin designation
#[derive(Template)]
#[template(path = "admin/forbidden.html")]
pub struct ForbiddenTemplate;
