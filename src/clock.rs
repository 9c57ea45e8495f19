//! Wall-clock source for window checks.
//!
//! Window state is derived by comparing stored timestamps against "now" at
//! query time, so the clock is the only input that moves. Production uses
//! [`SystemClock`]; tests and local demos pin time with [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(now) }
  }

  pub fn set(&self, now: DateTime<Utc>) {
    if let Ok(mut guard) = self.now.lock() {
      *guard = now;
    }
  }

  pub fn advance(&self, by: Duration) {
    if let Ok(mut guard) = self.now.lock() {
      *guard += by;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    self.now.lock().map(|g| *g).unwrap_or_else(|p| *p.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_manual_clock_set_and_advance() {
    let start = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::hours(5));
    assert_eq!(clock.now(), start + Duration::hours(5));

    clock.set(start);
    assert_eq!(clock.now(), start);
  }
}
