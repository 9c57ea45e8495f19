use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sample::Sample;
use super::window::PackWindows;

/// A time-boxed collection of uploaded samples and the works built from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePack {
  pub id: i64,
  pub title: String,
  pub description: String,
  pub upload_start: DateTime<Utc>,
  pub upload_end: DateTime<Utc>,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Set when the pack leaves the active state
  pub closed_at: Option<DateTime<Utc>>,
}

impl SamplePack {
  pub fn windows(&self) -> PackWindows {
    PackWindows {
      upload_start: self.upload_start,
      upload_end: self.upload_end,
      start_date: self.start_date,
      end_date: self.end_date,
    }
  }

  pub fn phase(&self, now: DateTime<Utc>) -> PackPhase {
    PackPhase::at(self, now)
  }
}

/// Where `now` falls relative to a pack's windows.
///
/// Derived on every read; only `is_active` is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackPhase {
  /// Active, upload window not yet open
  Upcoming,
  Uploading,
  /// Between upload end and submission start
  Curating,
  Submitting,
  /// Active but past the submission window
  Finished,
  Closed,
}

impl PackPhase {
  pub fn at(pack: &SamplePack, now: DateTime<Utc>) -> Self {
    if !pack.is_active {
      return Self::Closed;
    }
    let w = pack.windows();
    if now < w.upload_start {
      Self::Upcoming
    } else if w.upload_open(now) {
      Self::Uploading
    } else if now < w.start_date {
      Self::Curating
    } else if w.submission_open(now) {
      Self::Submitting
    } else {
      Self::Finished
    }
  }
}

/// A pack together with its sample collection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackWithSamples {
  #[serde(flatten)]
  pub pack: SamplePack,
  pub samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn pack(active: bool) -> SamplePack {
    let upload_start = Utc.with_ymd_and_hms(2026, 1, 9, 0, 0, 0).unwrap();
    SamplePack {
      id: 1,
      title: String::new(),
      description: String::new(),
      upload_start,
      upload_end: upload_start + Duration::hours(72) - Duration::seconds(1),
      start_date: upload_start + Duration::hours(72 + 24),
      end_date: upload_start + Duration::hours(72 + 24 + 96),
      is_active: active,
      created_at: upload_start - Duration::days(2),
      updated_at: upload_start - Duration::days(2),
      closed_at: None,
    }
  }

  #[test]
  fn test_phase_progression() {
    let p = pack(true);
    assert_eq!(p.phase(p.upload_start - Duration::hours(1)), PackPhase::Upcoming);
    assert_eq!(p.phase(p.upload_start), PackPhase::Uploading);
    assert_eq!(p.phase(p.upload_end), PackPhase::Curating);
    assert_eq!(p.phase(p.start_date), PackPhase::Submitting);
    assert_eq!(p.phase(p.end_date), PackPhase::Finished);
  }

  #[test]
  fn test_inactive_pack_is_closed_regardless_of_time() {
    let p = pack(false);
    assert_eq!(p.phase(p.upload_start), PackPhase::Closed);
    assert_eq!(p.phase(p.start_date), PackPhase::Closed);
  }

  #[test]
  fn test_pack_serializes_camel_case() {
    let json = serde_json::to_value(pack(true)).unwrap();
    assert!(json.get("uploadStart").is_some());
    assert!(json.get("isActive").is_some());
    assert_eq!(json["closedAt"], serde_json::Value::Null);
  }
}
