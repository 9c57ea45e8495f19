//! Login, logout and current-user endpoints.
//!
//! Only the development login issues sessions here; it trusts the email it
//! is given and is refused unless dev mode is on.

use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};

use super::db as auth_db;
use super::middleware::{session_token, AuthContext};
use super::session::generate_session_token;
use crate::config::{SESSION_COOKIE_NAME, SESSION_DURATION_HOURS};
use crate::db::{try_lock, LogOnError};
use crate::domain::User;
use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DevLoginRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    /// Same value as the session cookie, for `Authorization: Bearer` clients
    pub token: String,
}

/// POST /api/auth/dev/login
pub async fn dev_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<DevLoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    if !state.config.dev_mode {
        return Err(Error::Authorization("Development login is disabled".into()));
    }

    let email = req.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(Error::Validation("a valid email is required".into()));
    }
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let is_admin = state.config.is_admin_email(&email);
    let now = state.now();

    let token = generate_session_token();
    let user = {
        let conn = try_lock(&state.db)?;

        if let Some(removed) = auth_db::cleanup_expired_sessions(&conn, now)
            .log_warn("Failed to clean up expired sessions")
            && removed > 0
        {
            tracing::debug!("Removed {} expired sessions", removed);
        }

        let user = auth_db::get_or_create_user(&conn, &email, &name, "dev", is_admin, now)?;
        auth_db::update_last_login(&conn, user.id, now)
            .log_warn("Failed to update last login");
        auth_db::create_session(&conn, user.id, &token, SESSION_DURATION_HOURS, now)?;

        auth_db::get_user_by_id(&conn, user.id)?.unwrap_or(user)
    };

    tracing::info!("Dev login for user {} (admin: {})", user.id, user.is_admin);

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, token.clone()))
        .path("/")
        .http_only(true)
        .secure(false) // Set to true in production with HTTPS
        .max_age(time::Duration::hours(SESSION_DURATION_HOURS))
        .build();

    Ok((jar.add(session_cookie), Json(LoginResponse { user, token })))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(token) = session_token(&headers)
        && let Ok(conn) = try_lock(&state.db)
    {
        auth_db::delete_session(&conn, &token).log_warn("Failed to delete session during logout");
    }

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (
        jar.remove(session_cookie),
        Json(serde_json::json!({ "success": true })),
    )
}

/// GET /api/auth/me
pub async fn me(auth: AuthContext) -> Json<User> {
    Json(auth.user)
}

/// Cheap shape check; the dev provider has no other proof of identity
fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_emails() {
        assert!(is_plausible_email("dev@example.com"));
        assert!(is_plausible_email("a@b"));
    }

    #[test]
    fn test_implausible_emails() {
        assert!(!is_plausible_email(""));
        assert!(!is_plausible_email("no-at-sign"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("a@"));
        assert!(!is_plausible_email("a@b@c"));
        assert!(!is_plausible_email("a b@c"));
    }
}
