use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::{fmt_ts, parse_ts};
use crate::domain::{NewSubmission, Submission};

const SUBMISSION_SELECT: &str = r#"
    SELECT s.id, s.sample_pack_id, s.user_id, COALESCE(u.name, ''), s.title, s.description,
           s.filename, s.file_size, s.storage_locator, s.submitted_at
    FROM submissions s
    LEFT JOIN users u ON u.id = s.user_id
"#;

pub fn insert_submission(
  conn: &Connection,
  pack_id: i64,
  user_id: i64,
  submission: &NewSubmission,
  submitted_at: DateTime<Utc>,
) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO submissions (sample_pack_id, user_id, title, description, filename, file_size,
                             storage_locator, submitted_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
    params![
      pack_id,
      user_id,
      submission.title,
      submission.description,
      submission.filename,
      submission.file_size,
      submission.storage_locator,
      fmt_ts(submitted_at),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_submission_by_id(conn: &Connection, id: i64) -> Result<Option<Submission>> {
  conn
    .query_row(
      &format!("{} WHERE s.id = ?1", SUBMISSION_SELECT),
      params![id],
      row_to_submission,
    )
    .optional()
}

/// Newest first
pub fn list_pack_submissions(
  conn: &Connection,
  pack_id: i64,
  limit: i64,
  offset: i64,
) -> Result<Vec<Submission>> {
  let mut stmt = conn.prepare(&format!(
    "{} WHERE s.sample_pack_id = ?1 ORDER BY s.submitted_at DESC, s.id DESC LIMIT ?2 OFFSET ?3",
    SUBMISSION_SELECT
  ))?;
  let submissions = stmt
    .query_map(params![pack_id, limit, offset], row_to_submission)?
    .collect::<Result<Vec<_>>>()?;
  Ok(submissions)
}

fn row_to_submission(row: &rusqlite::Row) -> Result<Submission> {
  let submitted_at: String = row.get(9)?;
  Ok(Submission {
    id: row.get(0)?,
    sample_pack_id: row.get(1)?,
    user_id: row.get(2)?,
    user_name: row.get(3)?,
    title: row.get(4)?,
    description: row.get(5)?,
    filename: row.get(6)?,
    file_size: row.get(7)?,
    storage_locator: row.get(8)?,
    submitted_at: parse_ts(9, &submitted_at)?,
  })
}
