//! Test utilities for database setup.
//!
//! Provides a file-backed database using the authoritative migrations, a
//! storage root and a pinned clock, all inside one temporary directory.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::auth::db as auth_db;
use crate::clock::{Clock, ManualClock};
use crate::db;
use crate::domain::{User, WindowSettings};
use crate::services::pack_manager::PackManager;
use crate::storage::Storage;

/// Wednesday 2026-01-07 12:00 UTC; with default settings the next pack
/// uploads from Friday 2026-01-09.
pub fn wednesday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap()
}

/// Temporary database, storage and clock.
///
/// Everything is removed when dropped.
pub struct TestEnv {
    /// Temporary directory (kept alive for file persistence)
    pub temp: TempDir,
    pub db_path: PathBuf,
    /// Migrated connection to `db_path`
    pub conn: Connection,
    pub storage: Storage,
    pub clock: Arc<ManualClock>,
}

impl TestEnv {
    pub fn new() -> rusqlite::Result<Self> {
        Self::at(wednesday_noon())
    }

    /// Create an environment whose clock starts at `now`
    pub fn at(now: DateTime<Utc>) -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let db_path = temp.path().join("exchange.db");
        let conn = db::open_connection(&db_path)?;
        db::run_migrations(&conn)?;

        let storage = Storage::new(temp.path().join("storage"));

        Ok(Self {
            temp,
            db_path,
            conn,
            storage,
            clock: Arc::new(ManualClock::new(now)),
        })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Manager with default window settings driven by this environment's clock
    pub fn manager(&self, bypass_time_windows: bool) -> PackManager {
        PackManager::new(WindowSettings::default(), bypass_time_windows, self.clock.clone())
    }

    /// Another connection to the same database file
    pub fn connect(&self) -> rusqlite::Result<Connection> {
        db::open_connection(&self.db_path)
    }

    pub fn user(&self, email: &str) -> User {
        auth_db::get_or_create_user(&self.conn, email, email, "dev", false, self.clock.now())
            .unwrap()
    }
}
