//! Upload and submission window computation.
//!
//! A pack's four timestamps are anchored to fixed weekdays:
//!
//! ```text
//! uploadStart  next <upload weekday> 00:00:00, never today
//! uploadEnd    uploadStart + upload duration - 1s
//! startDate    next <submission weekday> 00:00:00 after uploadEnd
//! endDate      startDate + submission duration
//! ```
//!
//! Both windows are half-open: `[uploadStart, uploadEnd)` and
//! `[startDate, endDate)`.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use serde::Serialize;

use crate::error::{Error, Result};

/// Longest upload or submission window accepted from configuration
pub const MAX_WINDOW_HOURS: i64 = 24 * 28;

/// Weekday anchors and durations for newly created packs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
  pub upload_weekday: Weekday,
  pub upload_duration: Duration,
  pub submission_weekday: Weekday,
  pub submission_duration: Duration,
  /// Offset of the wall clock whose midnight anchors the windows
  pub utc_offset: FixedOffset,
}

impl Default for WindowSettings {
  fn default() -> Self {
    Self {
      upload_weekday: Weekday::Fri,
      upload_duration: Duration::hours(72),
      submission_weekday: Weekday::Mon,
      submission_duration: Duration::hours(96),
      utc_offset: Utc.fix(),
    }
  }
}

impl WindowSettings {
  pub fn new(
    upload_weekday: Weekday,
    upload_duration: Duration,
    submission_weekday: Weekday,
    submission_duration: Duration,
    utc_offset: FixedOffset,
  ) -> Result<Self> {
    // uploadEnd = start + duration - 1s must stay after uploadStart
    if upload_duration <= Duration::seconds(1) {
      return Err(Error::Config(format!(
        "upload window must be longer than one second, got {}s",
        upload_duration.num_seconds()
      )));
    }
    if submission_duration <= Duration::zero() {
      return Err(Error::Config(format!(
        "submission window must be positive, got {}s",
        submission_duration.num_seconds()
      )));
    }
    let max = Duration::hours(MAX_WINDOW_HOURS);
    if upload_duration > max || submission_duration > max {
      return Err(Error::Config(format!(
        "windows may last at most {}h, got upload {}h and submission {}h",
        MAX_WINDOW_HOURS,
        upload_duration.num_hours(),
        submission_duration.num_hours()
      )));
    }
    Ok(Self {
      upload_weekday,
      upload_duration,
      submission_weekday,
      submission_duration,
      utc_offset,
    })
  }

  /// Compute the four window timestamps for a pack created at `now`
  pub fn compute(&self, now: DateTime<Utc>) -> Result<PackWindows> {
    let upload_start = next_weekday_midnight(now, self.upload_weekday, self.utc_offset);
    let upload_end = self
      .upload_duration
      .checked_sub(&Duration::seconds(1))
      .and_then(|d| upload_start.checked_add_signed(d))
      .ok_or_else(|| out_of_range("upload", self.upload_duration))?;
    let start_date = next_weekday_midnight(upload_end, self.submission_weekday, self.utc_offset);
    let end_date = start_date
      .checked_add_signed(self.submission_duration)
      .ok_or_else(|| out_of_range("submission", self.submission_duration))?;

    Ok(PackWindows {
      upload_start,
      upload_end,
      start_date,
      end_date,
    })
  }
}

fn out_of_range(window: &str, duration: Duration) -> Error {
  Error::Config(format!(
    "{} window of {}h runs past the representable date range",
    window,
    duration.num_hours()
  ))
}

/// Midnight of the next `weekday` strictly after the local date of `after`.
///
/// The day offset is `(target - today + 7) mod 7`; a zero offset (today is
/// already the target) is pushed a full week forward.
pub fn next_weekday_midnight(
  after: DateTime<Utc>,
  weekday: Weekday,
  offset: FixedOffset,
) -> DateTime<Utc> {
  let local = after.with_timezone(&offset);
  let today = local.weekday().num_days_from_monday() as i64;
  let target = weekday.num_days_from_monday() as i64;

  let mut days = (target - today + 7) % 7;
  if days <= 0 {
    days += 7;
  }

  let midnight = (local.date_naive() + Duration::days(days)).and_time(NaiveTime::MIN);
  (midnight - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

/// The two half-open intervals of a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackWindows {
  pub upload_start: DateTime<Utc>,
  pub upload_end: DateTime<Utc>,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
}

impl PackWindows {
  pub fn upload_open(&self, now: DateTime<Utc>) -> bool {
    self.upload_start <= now && now < self.upload_end
  }

  pub fn submission_open(&self, now: DateTime<Utc>) -> bool {
    self.start_date <= now && now < self.end_date
  }

  /// Samples are only handed out once uploads have stopped
  pub fn upload_finished(&self, now: DateTime<Utc>) -> bool {
    now >= self.upload_end
  }

  /// `uploadStart < uploadEnd <= startDate < endDate`
  pub fn is_well_ordered(&self) -> bool {
    self.upload_start < self.upload_end
      && self.upload_end <= self.start_date
      && self.start_date < self.end_date
  }
}
