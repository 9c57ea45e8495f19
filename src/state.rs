//! Application state shared by all handlers.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::DbPool;
use crate::services::PackManager;
use crate::storage::Storage;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared connection (packs, samples, submissions, users, sessions)
    pub db: DbPool,

    pub config: Arc<Config>,

    /// Uploaded sample and submission files
    pub storage: Storage,

    /// Lifecycle rules for sample packs
    pub packs: PackManager,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, clock: Arc<dyn Clock>) -> Self {
        let storage = Storage::new(config.storage_path.clone());
        let packs = PackManager::new(config.windows, config.bypass_time_windows, clock);
        Self {
            db,
            config: Arc::new(config),
            storage,
            packs,
        }
    }

    /// Current time according to the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.packs.now()
    }
}
