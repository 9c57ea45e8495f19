//! Authentication extractors.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;

use super::db as auth_db;
use crate::config::SESSION_COOKIE_NAME;
use crate::db::try_lock;
use crate::domain::User;
use crate::error::Error;
use crate::state::AppState;

/// Authenticated request context.
/// Add this as a handler parameter to require authentication.
/// Rejects with 401 if no valid session is presented.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    /// Fails with 403 unless the user holds the admin role
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.user.is_admin {
            Ok(())
        } else {
            tracing::warn!("User {} attempted an admin action", self.user.id);
            Err(Error::Authorization("Admin access required".into()))
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(Error::Unauthenticated)?;

        let conn = try_lock(&state.db)?;
        let user = auth_db::get_session_user(&conn, &token, state.now())?
            .ok_or(Error::Unauthenticated)?;

        Ok(AuthContext { user })
    }
}

/// Session token from the session cookie, or an `Authorization: Bearer`
/// header for non-browser clients.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
