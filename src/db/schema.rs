//! Database schema with version-gated migrations.
//!
//! Each migration checks the recorded version, runs inside a transaction and
//! records the version it reached in `db_version`, so it runs exactly once.

use chrono::Utc;
use rusqlite::{params, Connection, Result};

/// Current schema version
/// Increment this when adding a new migration
pub const DB_VERSION: i32 = 3;

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Bootstrap: ensure db_version table exists (needed to check version)
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS db_version (
      version INTEGER PRIMARY KEY,
      applied_at TEXT NOT NULL,
      description TEXT
    );
    "#,
  )?;

  let current_version = get_schema_version(conn)?;
  tracing::debug!("schema version: {}", current_version);

  if current_version < 1 {
    migrate_v0_to_v1(conn)?;
  }
  if current_version < 2 {
    migrate_v1_to_v2(conn)?;
  }
  if current_version < 3 {
    migrate_v2_to_v3(conn)?;
  }

  Ok(())
}

/// v0→v1: users and sessions
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v0→v1: Create users and sessions");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      email TEXT NOT NULL UNIQUE COLLATE NOCASE,
      name TEXT NOT NULL DEFAULT '',
      provider TEXT NOT NULL,
      is_admin INTEGER NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL,
      last_login_at TEXT
    );

    CREATE TABLE IF NOT EXISTS sessions (
      token_hash TEXT PRIMARY KEY,
      user_id INTEGER NOT NULL,
      created_at TEXT NOT NULL,
      expires_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
    "#,
  )?;
  record_version(&tx, 1, "Create users and sessions")?;
  tx.commit()
}

/// v1→v2: sample packs, samples, submissions
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v1→v2: Create sample pack tables");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS sample_packs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      title TEXT NOT NULL DEFAULT '',
      description TEXT NOT NULL DEFAULT '',
      upload_start TEXT NOT NULL,
      upload_end TEXT NOT NULL,
      start_date TEXT NOT NULL,
      end_date TEXT NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL,
      closed_at TEXT,
      CHECK (upload_start < upload_end AND upload_end <= start_date AND start_date < end_date)
    );

    -- At most one active pack, enforced by storage
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sample_packs_single_active
      ON sample_packs(is_active) WHERE is_active = 1;
    CREATE INDEX IF NOT EXISTS idx_sample_packs_created_at ON sample_packs(created_at);

    CREATE TABLE IF NOT EXISTS samples (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      sample_pack_id INTEGER NOT NULL,
      user_id INTEGER NOT NULL,
      filename TEXT NOT NULL,
      file_size INTEGER NOT NULL,
      storage_locator TEXT NOT NULL,
      created_at TEXT NOT NULL,
      FOREIGN KEY (sample_pack_id) REFERENCES sample_packs(id),
      FOREIGN KEY (user_id) REFERENCES users(id),
      UNIQUE (sample_pack_id, filename)
    );

    CREATE TABLE IF NOT EXISTS submissions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      sample_pack_id INTEGER NOT NULL,
      user_id INTEGER NOT NULL,
      title TEXT NOT NULL,
      description TEXT NOT NULL DEFAULT '',
      filename TEXT NOT NULL,
      file_size INTEGER NOT NULL,
      storage_locator TEXT NOT NULL,
      submitted_at TEXT NOT NULL,
      FOREIGN KEY (sample_pack_id) REFERENCES sample_packs(id),
      FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_samples_pack ON samples(sample_pack_id);
    CREATE INDEX IF NOT EXISTS idx_submissions_pack ON submissions(sample_pack_id, submitted_at);
    CREATE INDEX IF NOT EXISTS idx_submissions_user ON submissions(user_id);
    "#,
  )?;
  record_version(&tx, 2, "Create sample_packs, samples, submissions")?;
  tx.commit()
}

/// v2→v3: sample filenames unique per pack regardless of case
fn migrate_v2_to_v3(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v2→v3: Case-insensitive sample filenames");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_samples_pack_filename_nocase
      ON samples(sample_pack_id, filename COLLATE NOCASE);
    "#,
  )?;
  record_version(&tx, 3, "Case-insensitive sample filename uniqueness")?;
  tx.commit()
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO db_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
    params![version, Utc::now().to_rfc3339(), description],
  )?;
  Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<i32> {
  conn.query_row(
    "SELECT COALESCE(MAX(version), 0) FROM db_version",
    [],
    |row| row.get(0),
  )
}
