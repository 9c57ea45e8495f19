//! Submissions of finished works against the active pack.

use rusqlite::{Connection, TransactionBehavior};

use super::pack_manager::PackManager;
use crate::db;
use crate::domain::{NewSubmission, Submission};
use crate::error::{Error, Result};

/// Record a submission for the active pack. The pack lookup and window check
/// share the insert's transaction.
pub fn create_submission(
    manager: &PackManager,
    conn: &mut Connection,
    user_id: i64,
    submission: NewSubmission,
) -> Result<Submission> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let pack = match manager.get_current_pack(&tx) {
        Ok(pack) => pack,
        Err(e) if e.is_not_found() => {
            return Err(Error::Authorization("No active sample pack".into()));
        }
        Err(e) => return Err(e),
    };
    if !manager.submission_window_open(&pack) {
        return Err(Error::Authorization(format!(
            "Submission window is closed (open from {} until {})",
            pack.start_date.to_rfc3339(),
            pack.end_date.to_rfc3339()
        )));
    }

    let id = db::insert_submission(&tx, pack.id, user_id, &submission, manager.now())?;
    let stored = db::get_submission_by_id(&tx, id)?.ok_or(Error::NotFound("Submission"))?;
    tx.commit()?;

    tracing::info!(
        "User {} submitted {:?} to pack {}",
        user_id,
        stored.title,
        pack.id
    );
    Ok(stored)
}

pub fn get_submission(conn: &Connection, id: i64) -> Result<Submission> {
    db::get_submission_by_id(conn, id)?.ok_or(Error::NotFound("Submission"))
}

/// Newest first
pub fn list_submissions(
    conn: &Connection,
    pack_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Submission>> {
    Ok(db::list_pack_submissions(conn, pack_id, limit, offset)?)
}
