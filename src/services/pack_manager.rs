//! Sample pack lifecycle.
//!
//! Single source of truth for "may a sample be uploaded now" and "may a work
//! be submitted now", and the only code that creates or closes packs.
//! Handlers call these predicates instead of reading pack timestamps.
//!
//! The manager holds no pack state of its own. The active pack lives in the
//! database, where a partial unique index allows at most one `is_active = 1`
//! row; create/close run inside IMMEDIATE transactions so the deactivate and
//! insert steps are one atomic write.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::MAX_LIST_LIMIT;
use crate::db;
use crate::domain::{NewSample, PackWithSamples, Sample, SamplePack, WindowSettings};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct PackManager {
    settings: WindowSettings,
    bypass_time_windows: bool,
    clock: Arc<dyn Clock>,
}

impl PackManager {
    pub fn new(settings: WindowSettings, bypass_time_windows: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            bypass_time_windows,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    pub fn bypass_time_windows(&self) -> bool {
        self.bypass_time_windows
    }

    // ==================== Queries ====================

    /// The active pack. Two active rows means storage is corrupt and is
    /// reported as an integrity fault rather than picking one.
    pub fn get_current_pack(&self, conn: &Connection) -> Result<SamplePack> {
        let mut active = db::get_active_packs(conn)?;
        match active.len() {
            0 => Err(Error::NotFound("Active sample pack")),
            1 => Ok(active.remove(0)),
            n => {
                let ids: Vec<i64> = active.iter().map(|p| p.id).collect();
                tracing::error!("{} packs are marked active (ids {:?})", n, ids);
                Err(Error::Integrity(format!(
                    "more than one active sample pack (ids {:?})",
                    ids
                )))
            }
        }
    }

    pub fn get_pack(&self, conn: &Connection, id: i64) -> Result<SamplePack> {
        db::get_pack_by_id(conn, id)?.ok_or(Error::NotFound("Sample pack"))
    }

    pub fn get_pack_with_samples(&self, conn: &Connection, id: i64) -> Result<PackWithSamples> {
        let pack = self.get_pack(conn, id)?;
        let samples = db::get_pack_samples(conn, id)?;
        Ok(PackWithSamples { pack, samples })
    }

    /// Most recently created packs first, at most `limit` of them
    pub fn list_packs(&self, conn: &Connection, limit: i64) -> Result<Vec<SamplePack>> {
        Ok(db::list_packs(conn, limit.clamp(0, MAX_LIST_LIMIT))?)
    }

    // ==================== Transitions ====================

    /// Replace the active pack with a new one whose windows are anchored on
    /// the current time. Title and description start blank.
    pub fn create_pack(&self, conn: &mut Connection) -> Result<SamplePack> {
        self.create_pack_with_details(conn, "", "")
    }

    /// [`Self::create_pack`], with title and description written in the same
    /// transaction as the insert.
    pub fn create_pack_with_details(
        &self,
        conn: &mut Connection,
        title: &str,
        description: &str,
    ) -> Result<SamplePack> {
        let now = self.now();
        let windows = self.settings.compute(now)?;
        if !windows.is_well_ordered() {
            return Err(Error::Integrity(format!(
                "computed windows are out of order: {:?}",
                windows
            )));
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let closed = db::deactivate_active_packs(&tx, now)?;
        let id = db::insert_active_pack(&tx, &windows, now)?;
        if !title.is_empty() || !description.is_empty() {
            db::update_pack_details(&tx, id, title, description, now)?;
        }
        let pack = db::get_pack_by_id(&tx, id)?.ok_or(Error::NotFound("Sample pack"))?;
        tx.commit()?;

        tracing::info!(
            "Created sample pack {} (upload {} to {}, submissions {} to {}), closed {} previous",
            pack.id,
            pack.upload_start,
            pack.upload_end,
            pack.start_date,
            pack.end_date,
            closed
        );
        Ok(pack)
    }

    pub fn update_pack_details(
        &self,
        conn: &Connection,
        id: i64,
        title: &str,
        description: &str,
    ) -> Result<SamplePack> {
        let changed = db::update_pack_details(conn, id, title, description, self.now())?;
        if changed == 0 {
            return Err(Error::NotFound("Sample pack"));
        }
        self.get_pack(conn, id)
    }

    /// Deactivate a pack. Closing an inactive pack is a no-op; an unknown id
    /// is `NotFound`.
    pub fn close_active_pack(&self, conn: &mut Connection, id: i64) -> Result<SamplePack> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if db::get_pack_by_id(&tx, id)?.is_none() {
            return Err(Error::NotFound("Sample pack"));
        }
        let changed = db::deactivate_pack(&tx, id, self.now())?;
        let pack = db::get_pack_by_id(&tx, id)?.ok_or(Error::NotFound("Sample pack"))?;
        tx.commit()?;

        if changed > 0 {
            tracing::info!("Closed sample pack {}", id);
        } else {
            tracing::debug!("Sample pack {} was already closed", id);
        }
        Ok(pack)
    }

    // ==================== Window predicates ====================
    // These never fail: a missing pack or a storage error reads as "closed".

    pub fn is_upload_allowed(&self, conn: &Connection) -> bool {
        if self.bypass_time_windows {
            return true;
        }
        match self.get_current_pack(conn) {
            Ok(pack) => self.upload_open(&pack, self.now()),
            Err(e) => {
                log_predicate_miss("upload", &e);
                false
            }
        }
    }

    pub fn is_upload_allowed_for_pack(&self, conn: &Connection, id: i64) -> bool {
        if self.bypass_time_windows {
            return true;
        }
        match self.get_pack(conn, id) {
            Ok(pack) => self.upload_open(&pack, self.now()),
            Err(e) => {
                log_predicate_miss("upload", &e);
                false
            }
        }
    }

    pub fn is_submission_allowed(&self, conn: &Connection) -> bool {
        if self.bypass_time_windows {
            return true;
        }
        match self.get_current_pack(conn) {
            Ok(pack) => self.submission_open(&pack, self.now()),
            Err(e) => {
                log_predicate_miss("submission", &e);
                false
            }
        }
    }

    /// A pack's samples are released once its upload window has ended
    pub fn is_download_allowed_for_pack(&self, conn: &Connection, id: i64) -> bool {
        if self.bypass_time_windows {
            return true;
        }
        match self.get_pack(conn, id) {
            Ok(pack) => pack.windows().upload_finished(self.now()),
            Err(e) => {
                log_predicate_miss("download", &e);
                false
            }
        }
    }

    /// Window check against an already loaded pack, for callers that hold a
    /// transaction and must not re-read.
    pub fn submission_window_open(&self, pack: &SamplePack) -> bool {
        self.bypass_time_windows || self.submission_open(pack, self.now())
    }

    fn upload_open(&self, pack: &SamplePack, now: DateTime<Utc>) -> bool {
        tracing::debug!(
            "Upload window for pack {}: {} to {} (now: {})",
            pack.id,
            pack.upload_start,
            pack.upload_end,
            now
        );
        pack.windows().upload_open(now)
    }

    fn submission_open(&self, pack: &SamplePack, now: DateTime<Utc>) -> bool {
        tracing::debug!(
            "Submission window for pack {}: {} to {} (now: {})",
            pack.id,
            pack.start_date,
            pack.end_date,
            now
        );
        pack.windows().submission_open(now)
    }

    // ==================== Samples ====================

    /// Attach a sample to a pack. The upload window is checked again inside
    /// the write transaction, so a window that closed after an earlier check
    /// still rejects the insert.
    pub fn add_sample(&self, conn: &mut Connection, pack_id: i64, sample: NewSample) -> Result<Sample> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pack = db::get_pack_by_id(&tx, pack_id)?.ok_or(Error::NotFound("Sample pack"))?;
        let now = self.now();
        if !self.bypass_time_windows && !self.upload_open(&pack, now) {
            return Err(Error::Authorization("Upload window is closed".into()));
        }
        if db::sample_filename_exists(&tx, pack_id, &sample.filename)? {
            return Err(Error::Conflict(format!(
                "A sample named {:?} already exists in this pack",
                sample.filename
            )));
        }

        let id = db::insert_sample(&tx, pack_id, &sample, now)?;
        let stored = db::get_pack_samples(&tx, pack_id)?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(Error::NotFound("Sample"))?;
        tx.commit()?;

        tracing::info!(
            "User {} added sample {:?} ({} bytes) to pack {}",
            stored.user_id,
            stored.filename,
            stored.file_size,
            pack_id
        );
        Ok(stored)
    }
}

fn log_predicate_miss(window: &str, err: &Error) {
    if err.is_not_found() {
        tracing::debug!("No {} window: {}", window, err);
    } else {
        tracing::warn!("{} window check failed, treating as closed: {}", window, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;
    use chrono::{Datelike, Duration, TimeZone, Timelike, Weekday};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn new_sample(user_id: i64, filename: &str) -> NewSample {
        NewSample {
            user_id,
            filename: filename.to_string(),
            file_size: 4,
            storage_locator: format!("samples/2026/01/0_000000_{}", filename),
        }
    }

    #[test]
    fn test_no_pack_means_not_found_and_closed_windows() {
        let env = TestEnv::new().unwrap();
        let manager = env.manager(false);

        assert!(manager.get_current_pack(&env.conn).unwrap_err().is_not_found());
        assert!(manager.get_pack(&env.conn, 42).unwrap_err().is_not_found());
        assert!(!manager.is_upload_allowed(&env.conn));
        assert!(!manager.is_upload_allowed_for_pack(&env.conn, 42));
        assert!(!manager.is_submission_allowed(&env.conn));
        assert!(!manager.is_download_allowed_for_pack(&env.conn, 42));
    }

    #[test]
    fn test_create_pack_computes_default_windows() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);

        let pack = manager.create_pack(&mut env.conn).unwrap();
        assert!(pack.is_active);
        assert_eq!(pack.title, "");
        assert_eq!(pack.upload_start, Utc.with_ymd_and_hms(2026, 1, 9, 0, 0, 0).unwrap());
        assert_eq!(pack.upload_end, Utc.with_ymd_and_hms(2026, 1, 11, 23, 59, 59).unwrap());
        assert_eq!(pack.start_date, Utc.with_ymd_and_hms(2026, 1, 12, 0, 0, 0).unwrap());
        assert_eq!(pack.end_date, Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap());
        assert!(pack.windows().is_well_ordered());
    }

    #[test]
    fn test_create_pack_on_upload_weekday_pushes_a_week() {
        let friday = Utc.with_ymd_and_hms(2026, 1, 9, 8, 30, 0).unwrap();
        let mut env = TestEnv::at(friday).unwrap();
        let manager = env.manager(false);

        let pack = manager.create_pack(&mut env.conn).unwrap();
        assert_eq!(pack.upload_start, Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap());
        assert_eq!(pack.upload_start.weekday(), Weekday::Fri);
        assert_eq!(pack.upload_start.hour(), 0);
    }

    #[test]
    fn test_create_pack_replaces_active_pack() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);

        let first = manager.create_pack(&mut env.conn).unwrap();
        env.clock.advance(Duration::minutes(1));
        let second = manager.create_pack(&mut env.conn).unwrap();

        let current = manager.get_current_pack(&env.conn).unwrap();
        assert_eq!(current.id, second.id);

        let first = manager.get_pack(&env.conn, first.id).unwrap();
        assert!(!first.is_active);
        assert!(first.closed_at.is_some());
        assert_eq!(db::count_active_packs(&env.conn).unwrap(), 1);
    }

    #[test]
    fn test_list_packs_newest_first() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(manager.create_pack(&mut env.conn).unwrap().id);
            env.clock.advance(Duration::hours(1));
        }

        let listed: Vec<i64> = manager
            .list_packs(&env.conn, 10)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);
        assert_eq!(manager.list_packs(&env.conn, 2).unwrap().len(), 2);
        assert!(manager.list_packs(&env.conn, 0).unwrap().is_empty());
        assert!(manager.list_packs(&env.conn, -5).unwrap().is_empty());
    }

    #[test]
    fn test_create_pack_with_details() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager
            .create_pack_with_details(&mut env.conn, "Week 3", "Tape loops")
            .unwrap();
        assert_eq!(pack.title, "Week 3");
        assert_eq!(pack.description, "Tape loops");
        assert!(pack.is_active);
    }

    #[test]
    fn test_failed_details_write_rolls_back_create() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let first = manager.create_pack(&mut env.conn).unwrap();

        env.conn
            .execute_batch(
                "CREATE TRIGGER reject_title BEFORE UPDATE OF title ON sample_packs
                 WHEN NEW.title = 'rejected'
                 BEGIN SELECT RAISE(ABORT, 'title rejected'); END;",
            )
            .unwrap();
        env.clock.advance(Duration::minutes(1));
        assert!(manager
            .create_pack_with_details(&mut env.conn, "rejected", "")
            .is_err());

        // Neither the new pack nor the deactivation of the old one survived
        assert_eq!(manager.get_current_pack(&env.conn).unwrap().id, first.id);
        assert_eq!(manager.list_packs(&env.conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_create_pack_with_unrepresentable_window_fails_cleanly() {
        let mut env = TestEnv::new().unwrap();
        let first = env.manager(false).create_pack(&mut env.conn).unwrap();

        let settings = WindowSettings {
            submission_duration: Duration::MAX,
            ..WindowSettings::default()
        };
        let manager = PackManager::new(settings, false, env.clock.clone());
        let err = manager.create_pack(&mut env.conn).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // The existing pack stays active
        assert_eq!(manager.get_current_pack(&env.conn).unwrap().id, first.id);
    }

    #[test]
    fn test_close_active_pack_is_idempotent() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager.create_pack(&mut env.conn).unwrap();

        let closed = manager.close_active_pack(&mut env.conn, pack.id).unwrap();
        assert!(!closed.is_active);
        let closed_at = closed.closed_at;

        env.clock.advance(Duration::hours(1));
        let again = manager.close_active_pack(&mut env.conn, pack.id).unwrap();
        assert!(!again.is_active);
        assert_eq!(again.closed_at, closed_at);

        assert!(manager.get_current_pack(&env.conn).unwrap_err().is_not_found());
        assert!(manager.close_active_pack(&mut env.conn, 999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_pack_details() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager.create_pack(&mut env.conn).unwrap();

        let updated = manager
            .update_pack_details(&env.conn, pack.id, "Week 2", "Field recordings")
            .unwrap();
        assert_eq!(updated.title, "Week 2");
        assert_eq!(updated.description, "Field recordings");
        assert!(manager
            .update_pack_details(&env.conn, 999, "x", "")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_upload_window_boundaries() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager.create_pack(&mut env.conn).unwrap();

        env.clock.set(pack.upload_start - Duration::seconds(1));
        assert!(!manager.is_upload_allowed(&env.conn));

        env.clock.set(pack.upload_start);
        assert!(manager.is_upload_allowed(&env.conn));
        assert!(manager.is_upload_allowed_for_pack(&env.conn, pack.id));

        env.clock.set(pack.upload_end - Duration::milliseconds(1));
        assert!(manager.is_upload_allowed(&env.conn));

        env.clock.set(pack.upload_end);
        assert!(!manager.is_upload_allowed(&env.conn));
        assert!(!manager.is_upload_allowed_for_pack(&env.conn, pack.id));
    }

    #[test]
    fn test_submission_window_boundaries() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager.create_pack(&mut env.conn).unwrap();

        env.clock.set(pack.start_date - Duration::seconds(1));
        assert!(!manager.is_submission_allowed(&env.conn));
        env.clock.set(pack.start_date);
        assert!(manager.is_submission_allowed(&env.conn));
        env.clock.set(pack.end_date);
        assert!(!manager.is_submission_allowed(&env.conn));
    }

    #[test]
    fn test_download_opens_when_uploads_end() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let pack = manager.create_pack(&mut env.conn).unwrap();

        env.clock.set(pack.upload_start);
        assert!(!manager.is_download_allowed_for_pack(&env.conn, pack.id));
        env.clock.set(pack.upload_end);
        assert!(manager.is_download_allowed_for_pack(&env.conn, pack.id));
    }

    #[test]
    fn test_bypass_opens_every_window() {
        let env = TestEnv::new().unwrap();
        let manager = env.manager(true);
        assert!(manager.is_upload_allowed(&env.conn));
        assert!(manager.is_upload_allowed_for_pack(&env.conn, 7));
        assert!(manager.is_submission_allowed(&env.conn));
        assert!(manager.is_download_allowed_for_pack(&env.conn, 7));
    }

    #[test]
    fn test_add_sample_inside_window() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let user = env.user("a@example.com");
        let pack = manager.create_pack(&mut env.conn).unwrap();

        env.clock.set(pack.upload_start + Duration::hours(1));
        let sample = manager
            .add_sample(&mut env.conn, pack.id, new_sample(user.id, "kick.wav"))
            .unwrap();
        assert_eq!(sample.filename, "kick.wav");
        assert_eq!(sample.user_name, "a@example.com");

        let with_samples = manager.get_pack_with_samples(&env.conn, pack.id).unwrap();
        assert_eq!(with_samples.samples.len(), 1);
        assert_eq!(with_samples.samples[0].id, sample.id);
    }

    #[test]
    fn test_add_sample_just_after_window_closes() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let user = env.user("a@example.com");
        let pack = manager.create_pack(&mut env.conn).unwrap();

        env.clock.set(pack.upload_end + Duration::milliseconds(1));
        let err = manager
            .add_sample(&mut env.conn, pack.id, new_sample(user.id, "late.wav"))
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
        assert_eq!(db::count_pack_samples(&env.conn, pack.id).unwrap(), 0);
    }

    #[test]
    fn test_add_sample_errors() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        let user = env.user("a@example.com");
        let pack = manager.create_pack(&mut env.conn).unwrap();
        env.clock.set(pack.upload_start);

        let err = manager
            .add_sample(&mut env.conn, 999, new_sample(user.id, "a.wav"))
            .unwrap_err();
        assert!(err.is_not_found());

        manager
            .add_sample(&mut env.conn, pack.id, new_sample(user.id, "a.wav"))
            .unwrap();
        let err = manager
            .add_sample(&mut env.conn, pack.id, new_sample(user.id, "a.wav"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let err = manager
            .add_sample(&mut env.conn, pack.id, new_sample(user.id, "A.WAV"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_two_active_rows_are_an_integrity_error() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        manager.create_pack(&mut env.conn).unwrap();

        // Simulate a broken store by dropping the guard index
        env.conn
            .execute_batch(
                "DROP INDEX idx_sample_packs_single_active;
                 UPDATE sample_packs SET is_active = 1;",
            )
            .unwrap();
        env.clock.advance(Duration::minutes(1));
        let windows = manager.settings().compute(manager.now()).unwrap();
        db::insert_active_pack(&env.conn, &windows, manager.now()).unwrap();

        let err = manager.get_current_pack(&env.conn).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert!(!manager.is_upload_allowed(&env.conn));
    }

    #[test]
    fn test_concurrent_create_pack_keeps_one_active() {
        let mut env = TestEnv::new().unwrap();
        let manager = env.manager(false);
        manager.create_pack(&mut env.conn).unwrap();

        let db_path = env.db_path.clone();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let conn = db::open_connection(&db_path).unwrap();
                let mut observations = 0;
                loop {
                    assert_eq!(db::count_active_packs(&conn).unwrap(), 1);
                    observations += 1;
                    if done.load(Ordering::SeqCst) {
                        break observations;
                    }
                }
            });

            let writers: Vec<_> = (0..6)
                .map(|_| {
                    let manager = manager.clone();
                    let db_path = db_path.clone();
                    scope.spawn(move || {
                        let mut conn = db::open_connection(&db_path).unwrap();
                        for _ in 0..5 {
                            manager.create_pack(&mut conn).unwrap();
                        }
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, Ordering::SeqCst);
            assert!(reader.join().unwrap() > 0);
        });

        assert_eq!(db::count_active_packs(&env.conn).unwrap(), 1);
        let total: i64 = env
            .conn
            .query_row("SELECT COUNT(*) FROM sample_packs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 31);
    }
}
