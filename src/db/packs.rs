use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::{fmt_ts, parse_opt_ts, parse_ts};
use crate::domain::{PackWindows, SamplePack};

const PACK_COLUMNS: &str = "id, title, description, upload_start, upload_end, start_date, end_date,
                            is_active, created_at, updated_at, closed_at";

pub fn insert_active_pack(conn: &Connection, windows: &PackWindows, now: DateTime<Utc>) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO sample_packs (title, description, upload_start, upload_end, start_date, end_date,
                              is_active, created_at, updated_at)
    VALUES ('', '', ?1, ?2, ?3, ?4, 1, ?5, ?5)
    "#,
    params![
      fmt_ts(windows.upload_start),
      fmt_ts(windows.upload_end),
      fmt_ts(windows.start_date),
      fmt_ts(windows.end_date),
      fmt_ts(now),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Flip every active pack to inactive, returning how many rows changed
pub fn deactivate_active_packs(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
  conn.execute(
    "UPDATE sample_packs SET is_active = 0, closed_at = ?1, updated_at = ?1 WHERE is_active = 1",
    params![fmt_ts(now)],
  )
}

/// Deactivate one pack; an already inactive pack keeps its original closed_at
pub fn deactivate_pack(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<usize> {
  conn.execute(
    "UPDATE sample_packs SET is_active = 0, closed_at = ?1, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
    params![fmt_ts(now), id],
  )
}

pub fn update_pack_details(
  conn: &Connection,
  id: i64,
  title: &str,
  description: &str,
  now: DateTime<Utc>,
) -> Result<usize> {
  conn.execute(
    "UPDATE sample_packs SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
    params![title, description, fmt_ts(now), id],
  )
}

pub fn get_pack_by_id(conn: &Connection, id: i64) -> Result<Option<SamplePack>> {
  conn
    .query_row(
      &format!("SELECT {} FROM sample_packs WHERE id = ?1", PACK_COLUMNS),
      params![id],
      row_to_pack,
    )
    .optional()
}

/// All packs flagged active. More than one row means the invariant broke;
/// the caller decides how loudly to fail, so the query never hides extras.
pub fn get_active_packs(conn: &Connection) -> Result<Vec<SamplePack>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM sample_packs WHERE is_active = 1 ORDER BY id DESC LIMIT 2",
    PACK_COLUMNS
  ))?;
  let packs = stmt
    .query_map([], row_to_pack)?
    .collect::<Result<Vec<_>>>()?;
  Ok(packs)
}

pub fn count_active_packs(conn: &Connection) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM sample_packs WHERE is_active = 1",
    [],
    |row| row.get(0),
  )
}

/// Most recent packs first
pub fn list_packs(conn: &Connection, limit: i64) -> Result<Vec<SamplePack>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM sample_packs ORDER BY created_at DESC, id DESC LIMIT ?1",
    PACK_COLUMNS
  ))?;
  let packs = stmt
    .query_map(params![limit], row_to_pack)?
    .collect::<Result<Vec<_>>>()?;
  Ok(packs)
}

fn row_to_pack(row: &rusqlite::Row) -> Result<SamplePack> {
  let upload_start: String = row.get(3)?;
  let upload_end: String = row.get(4)?;
  let start_date: String = row.get(5)?;
  let end_date: String = row.get(6)?;
  let created_at: String = row.get(8)?;
  let updated_at: String = row.get(9)?;

  Ok(SamplePack {
    id: row.get(0)?,
    title: row.get(1)?,
    description: row.get(2)?,
    upload_start: parse_ts(3, &upload_start)?,
    upload_end: parse_ts(4, &upload_end)?,
    start_date: parse_ts(5, &start_date)?,
    end_date: parse_ts(6, &end_date)?,
    is_active: row.get(7)?,
    created_at: parse_ts(8, &created_at)?,
    updated_at: parse_ts(9, &updated_at)?,
    closed_at: parse_opt_ts(10, row.get(10)?)?,
  })
}
