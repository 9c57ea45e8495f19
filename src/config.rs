//! Application configuration.
//!
//! Values are resolved with priority: `config.toml` > environment (`.env`
//! is loaded first) > defaults. Fixed limits that are not worth a setting
//! live here as constants.

use chrono::{Duration, FixedOffset, Weekday};
use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::WindowSettings;
use crate::error::{Error, Result};
use crate::paths;

// ==================== Server Configuration ====================

/// Default address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Default server port
pub const SERVER_PORT: u16 = 8080;

// ==================== Session Configuration ====================

/// Session lifetime in hours (1 week)
pub const SESSION_DURATION_HOURS: i64 = 24 * 7;

/// Session cookie name
pub const SESSION_COOKIE_NAME: &str = "sx_session";

// ==================== Query Limits ====================

/// Default number of packs returned by pack listings
pub const DEFAULT_PACK_LIST_LIMIT: i64 = 10;

/// Default page size for submission listings
pub const DEFAULT_SUBMISSION_PAGE: i64 = 20;

/// Upper bound for any client-supplied limit
pub const MAX_LIST_LIMIT: i64 = 100;

// ==================== Upload Rules ====================

/// Default per-file size limit (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Accepted audio file extensions (lowercase, without dot)
pub const ALLOWED_AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "aiff", "flac"];

// ==================== Runtime Configuration ====================

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub server_port: u16,
    pub database_path: PathBuf,
    pub storage_path: PathBuf,
    pub windows: WindowSettings,
    /// Disable window enforcement (development/testing only)
    pub bypass_time_windows: bool,
    /// Enables the development login endpoint
    pub dev_mode: bool,
    /// Emails granted the admin role on login (lowercase)
    pub admin_emails: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
            database_path: PathBuf::from(paths::db_path()),
            storage_path: PathBuf::from(paths::storage_dir()),
            windows: WindowSettings::default(),
            bypass_time_windows: false,
            dev_mode: false,
            admin_emails: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    database: Option<DatabaseSection>,
    storage: Option<StorageSection>,
    windows: Option<WindowsSection>,
    dev: Option<DevSection>,
    auth: Option<AuthSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    path: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct WindowsSection {
    upload_weekday: Option<String>,
    upload_hours: Option<i64>,
    submission_weekday: Option<String>,
    submission_hours: Option<i64>,
    utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct DevSection {
    enabled: Option<bool>,
    bypass_time_windows: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthSection {
    admin_emails: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from `config.toml` (or `CONFIG_PATH`) and the environment
    pub fn load() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!("Using configuration file {}", path);
                Some(contents)
            }
            Err(_) => None,
        };

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from optional TOML text and an environment lookup
    pub fn from_sources(toml_text: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: FileConfig = match toml_text {
            Some(text) => toml::from_str(text)
                .map_err(|e| Error::Config(format!("invalid config.toml: {}", e)))?,
            None => FileConfig::default(),
        };
        let defaults = Config::default();

        let server = file.server.unwrap_or_default();
        let database = file.database.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let windows = file.windows.unwrap_or_default();
        let dev = file.dev.unwrap_or_default();
        let auth = file.auth.unwrap_or_default();

        let server_port = match server.port {
            Some(port) => port,
            None => match env("PORT") {
                Some(v) => v
                    .parse()
                    .map_err(|_| Error::Config(format!("PORT must be a port number, got {:?}", v)))?,
                None => defaults.server_port,
            },
        };

        let database_path = database
            .path
            .or_else(|| env("DATABASE_PATH"))
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let storage_path = storage
            .path
            .or_else(|| env("STORAGE_PATH"))
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);

        let max_upload_bytes = match storage.max_upload_bytes {
            Some(n) => n,
            None => match env("MAX_UPLOAD_BYTES") {
                Some(v) => v.parse().map_err(|_| {
                    Error::Config(format!("MAX_UPLOAD_BYTES must be a byte count, got {:?}", v))
                })?,
                None => defaults.max_upload_bytes,
            },
        };
        if max_upload_bytes == 0 {
            return Err(Error::Config("max upload size must be positive".into()));
        }

        let base = defaults.windows;
        let upload_weekday = match windows.upload_weekday {
            Some(day) => parse_weekday(&day)?,
            None => base.upload_weekday,
        };
        let submission_weekday = match windows.submission_weekday {
            Some(day) => parse_weekday(&day)?,
            None => base.submission_weekday,
        };
        let upload_duration = match windows.upload_hours {
            Some(hours) => window_hours("upload_hours", hours)?,
            None => base.upload_duration,
        };
        let submission_duration = match windows.submission_hours {
            Some(hours) => window_hours("submission_hours", hours)?,
            None => base.submission_duration,
        };
        let utc_offset = match windows.utc_offset_minutes {
            Some(minutes) => FixedOffset::east_opt(minutes * 60)
                .ok_or_else(|| Error::Config(format!("utc_offset_minutes out of range: {}", minutes)))?,
            None => base.utc_offset,
        };
        let windows = WindowSettings::new(
            upload_weekday,
            upload_duration,
            submission_weekday,
            submission_duration,
            utc_offset,
        )?;

        let dev_mode = match dev.enabled {
            Some(b) => b,
            None => env_flag(&env, "DEV_MODE"),
        };
        let bypass_time_windows = match dev.bypass_time_windows {
            Some(b) => b,
            None => env_flag(&env, "DEV_BYPASS_TIME_WINDOWS"),
        };
        if bypass_time_windows {
            tracing::warn!("Time window enforcement is bypassed");
        }

        let admin_emails = auth
            .admin_emails
            .or_else(|| env("ADMIN_EMAILS").map(|v| v.split(',').map(str::to_string).collect()))
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            server_addr: server.addr.unwrap_or(defaults.server_addr),
            server_port,
            database_path,
            storage_path,
            windows,
            bypass_time_windows,
            dev_mode,
            admin_emails,
            max_upload_bytes,
        })
    }

    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn env_flag(env: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    env(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn window_hours(key: &str, hours: i64) -> Result<Duration> {
    Duration::try_hours(hours)
        .ok_or_else(|| Error::Config(format!("{} out of range: {}", key, hours)))
}

fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| Error::Config(format!("unknown weekday {:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, env_of(&[])).unwrap();
        assert_eq!(config.server_port, SERVER_PORT);
        assert_eq!(config.windows, WindowSettings::default());
        assert!(!config.bypass_time_windows);
        assert!(!config.dev_mode);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_of(&[
            ("PORT", "9000"),
            ("DATABASE_PATH", "/tmp/x.db"),
            ("DEV_BYPASS_TIME_WINDOWS", "true"),
            ("DEV_MODE", "1"),
            ("ADMIN_EMAILS", " Admin@Example.com ,ops@example.com,"),
        ]);
        let config = Config::from_sources(None, env).unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert!(config.bypass_time_windows);
        assert!(config.dev_mode);
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@example.com"]);
        assert!(config.is_admin_email("ADMIN@example.com"));
        assert!(!config.is_admin_email("user@example.com"));
    }

    #[test]
    fn test_file_overrides_env() {
        let toml = r#"
            [server]
            port = 7000

            [windows]
            upload_weekday = "saturday"
            upload_hours = 48
            submission_weekday = "Tue"
            submission_hours = 120
            utc_offset_minutes = 60

            [dev]
            bypass_time_windows = false
        "#;
        let env = env_of(&[("PORT", "9000"), ("DEV_BYPASS_TIME_WINDOWS", "true")]);
        let config = Config::from_sources(Some(toml), env).unwrap();

        assert_eq!(config.server_port, 7000);
        assert!(!config.bypass_time_windows);
        assert_eq!(config.windows.upload_weekday, Weekday::Sat);
        assert_eq!(config.windows.upload_duration, Duration::hours(48));
        assert_eq!(config.windows.submission_weekday, Weekday::Tue);
        assert_eq!(config.windows.submission_duration, Duration::hours(120));
        assert_eq!(config.windows.utc_offset.local_minus_utc(), 3600);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(Config::from_sources(None, env_of(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_sources(Some("[windows]\nupload_weekday = \"someday\""), env_of(&[])).is_err());
        assert!(Config::from_sources(Some("[windows]\nupload_hours = 0"), env_of(&[])).is_err());
        assert!(Config::from_sources(Some("not = [valid"), env_of(&[])).is_err());
    }

    #[test]
    fn test_oversized_window_hours_are_errors() {
        for toml in [
            "[windows]\nupload_hours = 9223372036854775807",
            "[windows]\nupload_hours = 1000000000000",
            "[windows]\nsubmission_hours = 673",
        ] {
            let err = Config::from_sources(Some(toml), env_of(&[])).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{}", toml);
        }
        let config =
            Config::from_sources(Some("[windows]\nsubmission_hours = 672"), env_of(&[])).unwrap();
        assert!(config.windows.compute(chrono::Utc::now()).is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), format!("{}:{}", SERVER_ADDR, SERVER_PORT));
    }
}
