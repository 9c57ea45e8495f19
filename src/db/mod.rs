pub mod packs;
pub mod samples;
pub mod schema;
pub mod submissions;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub use packs::*;
pub use samples::*;
pub use schema::run_migrations;
pub use submissions::*;

pub type DbPool = Arc<Mutex<Connection>>;

/// How long a writer waits for another connection's lock before giving up
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> crate::error::Result<MutexGuard<'_, Connection>> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    crate::error::Error::Lock
  })
}

/// Open a connection with the pragmas every connection needs.
///
/// WAL lets readers proceed while a pack transaction holds the write lock;
/// the busy timeout makes competing writers queue instead of failing.
pub fn open_connection(path: &Path) -> Result<Connection> {
  let conn = Connection::open(path)?;
  conn.busy_timeout(BUSY_TIMEOUT)?;
  let mode: String =
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
  tracing::trace!("journal_mode={}", mode);
  conn.pragma_update(None, "foreign_keys", "ON")?;
  Ok(conn)
}

pub fn init_db(path: &Path) -> Result<DbPool> {
  if let Some(parent) = path.parent() {
    if let Err(e) = std::fs::create_dir_all(parent) {
      tracing::warn!("Could not create database directory {}: {}", parent.display(), e);
    }
  }

  let conn = open_connection(path)?;
  run_migrations(&conn)?;
  Ok(Arc::new(Mutex::new(conn)))
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexical order matches chronological order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, value: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(idx: usize, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
  value.map(|v| parse_ts(idx, &v)).transpose()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_timestamp_roundtrip_keeps_order() {
    let a = Utc.with_ymd_and_hms(2026, 1, 9, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    assert!(fmt_ts(a) < fmt_ts(b));
    assert_eq!(parse_ts(0, &fmt_ts(a)).unwrap(), a);
  }

  #[test]
  fn test_parse_ts_rejects_garbage() {
    assert!(parse_ts(3, "not a date").is_err());
  }

  #[test]
  fn test_init_db_creates_parent_dir() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("nested").join("exchange.db");
    let pool = init_db(&path).unwrap();
    assert!(path.exists());
    let conn = try_lock(&pool).unwrap();
    let version = schema::get_schema_version(&conn).unwrap();
    assert_eq!(version, schema::DB_VERSION);
  }

  #[test]
  fn test_log_warn_default() {
    let failed: std::result::Result<i64, String> = Err("boom".into());
    assert_eq!(failed.log_warn_default("ctx"), 0);
    let ok: std::result::Result<i64, String> = Ok(5);
    assert_eq!(ok.log_warn("ctx"), Some(5));
  }
}
