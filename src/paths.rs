//! Project path functions - single source of truth for default file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//!
//! This allows running multiple isolated server instances for E2E testing:
//! ```bash
//! DATA_DIR=data/test/a PORT=8081 cargo run
//! ```

use std::env;
use std::sync::OnceLock;

/// Lazily initialized data directory from DATA_DIR env var
static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// SQLite database path
pub fn db_path() -> String {
    format!("{}/sample_exchange.db", data_dir())
}

/// Root of uploaded sample and submission files
pub fn storage_dir() -> String {
    format!("{}/storage", data_dir())
}

/// Built frontend served for non-API routes - not under DATA_DIR
pub const FRONTEND_DIST_DIR: &str = "frontend/dist";
