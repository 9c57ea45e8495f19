//! User and session persistence.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::session::hash_token;
use crate::db::{fmt_ts, parse_opt_ts, parse_ts};
use crate::domain::User;

const USER_COLUMNS: &str = "id, email, name, provider, is_admin, created_at, last_login_at";

/// Find a user by email or create one. Name and provider are refreshed on
/// every login; the admin flag is only ever raised, never lowered here.
pub fn get_or_create_user(
    conn: &Connection,
    email: &str,
    name: &str,
    provider: &str,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<User> {
    conn.execute(
        r#"
        INSERT INTO users (email, name, provider, is_admin, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(email) DO UPDATE SET
            name = excluded.name,
            provider = excluded.provider,
            is_admin = MAX(users.is_admin, excluded.is_admin)
        "#,
        params![email, name, provider, is_admin, fmt_ts(now)],
    )?;

    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
        params![email],
        row_to_user,
    )
}

pub fn get_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        row_to_user,
    )
    .optional()
}

pub fn update_last_login(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![fmt_ts(now), user_id],
    )?;
    Ok(())
}

pub fn create_session(
    conn: &Connection,
    user_id: i64,
    token: &str,
    duration_hours: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let expires_at = now + Duration::hours(duration_hours);
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![hash_token(token), user_id, fmt_ts(now), fmt_ts(expires_at)],
    )?;
    Ok(())
}

/// Resolve a raw token to its user, ignoring expired sessions
pub fn get_session_user(conn: &Connection, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
    conn.query_row(
        r#"
        SELECT u.id, u.email, u.name, u.provider, u.is_admin, u.created_at, u.last_login_at
        FROM sessions s
        INNER JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ?1 AND s.expires_at > ?2
        "#,
        params![hash_token(token), fmt_ts(now)],
        row_to_user,
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![hash_token(token)],
    )?;
    Ok(())
}

pub fn cleanup_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![fmt_ts(now)],
    )
}

fn row_to_user(row: &rusqlite::Row) -> Result<User> {
    let created_at: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        provider: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        last_login_at: parse_opt_ts(6, row.get(6)?)?,
    })
}
