use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};

use super::{fmt_ts, parse_ts};
use crate::domain::{NewSample, Sample};

pub fn insert_sample(
  conn: &Connection,
  pack_id: i64,
  sample: &NewSample,
  now: DateTime<Utc>,
) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO samples (sample_pack_id, user_id, filename, file_size, storage_locator, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#,
    params![
      pack_id,
      sample.user_id,
      sample.filename,
      sample.file_size,
      sample.storage_locator,
      fmt_ts(now),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Case-insensitive, matching `idx_samples_pack_filename_nocase`
pub fn sample_filename_exists(conn: &Connection, pack_id: i64, filename: &str) -> Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM samples WHERE sample_pack_id = ?1 AND filename = ?2 COLLATE NOCASE)",
    params![pack_id, filename],
    |row| row.get(0),
  )
}

/// Samples of a pack in upload order, with uploader names
pub fn get_pack_samples(conn: &Connection, pack_id: i64) -> Result<Vec<Sample>> {
  let mut stmt = conn.prepare(
    r#"
    SELECT s.id, s.sample_pack_id, s.user_id, COALESCE(u.name, ''), s.filename, s.file_size,
           s.storage_locator, s.created_at
    FROM samples s
    LEFT JOIN users u ON u.id = s.user_id
    WHERE s.sample_pack_id = ?1
    ORDER BY s.created_at ASC, s.id ASC
    "#,
  )?;

  let samples = stmt
    .query_map(params![pack_id], |row| {
      let created_at: String = row.get(7)?;
      Ok(Sample {
        id: row.get(0)?,
        sample_pack_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        filename: row.get(4)?,
        file_size: row.get(5)?,
        storage_locator: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(samples)
}

pub fn count_pack_samples(conn: &Connection, pack_id: i64) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM samples WHERE sample_pack_id = ?1",
    params![pack_id],
    |row| row.get(0),
  )
}
