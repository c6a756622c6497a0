use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in time held as float seconds, whole seconds and a display string.
///
/// Comparisons against the stored cooldown target always use `seconds`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
  seconds_f64: f64,
  seconds: i64,
  human_readable: String,
}

impl TimePoint {
  pub fn from_secs_f64(seconds: f64) -> Self {
    let mut point = Self {
      seconds_f64: 0.0,
      seconds: 0,
      human_readable: String::new(),
    };
    point.set_time(seconds);
    point
  }

  pub fn from_secs(seconds: i64) -> Self {
    Self::from_secs_f64(seconds as f64)
  }

  /// Replace the instant held by this value.
  pub fn set_time(&mut self, seconds: f64) {
    self.seconds_f64 = seconds;
    self.seconds = seconds as i64;
    self.human_readable = render(seconds);
  }

  /// A new point `seconds` after this one.
  pub fn advance(&self, seconds: i64) -> Self {
    let mut next = self.clone();
    next.set_time(self.seconds_f64 + seconds as f64);
    next
  }

  pub fn seconds_f64(&self) -> f64 {
    self.seconds_f64
  }

  pub fn seconds(&self) -> i64 {
    self.seconds
  }

  pub fn human_readable(&self) -> &str {
    &self.human_readable
  }
}

impl std::fmt::Display for TimePoint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.human_readable)
  }
}

/// ctime-style rendering, always in UTC.
fn render(seconds: f64) -> String {
  let whole = seconds.floor();
  let nanos = ((seconds - whole) * 1e9) as u32;
  match DateTime::<Utc>::from_timestamp(whole as i64, nanos) {
    Some(dt) => format!("{} (UTC)", dt.format("%a %b %e %H:%M:%S %Y")),
    None => format!("{} (epoch seconds)", whole as i64),
  }
}

pub fn minutes_to_seconds(minutes: u32) -> i64 {
  i64::from(minutes) * 60
}

/// Source of the current time.
pub trait Clock: Send + Sync {
  fn now(&self) -> TimePoint;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> TimePoint {
    let seconds = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs_f64())
      .unwrap_or(0.0);
    TimePoint::from_secs_f64(seconds)
  }
}
