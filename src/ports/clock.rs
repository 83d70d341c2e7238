//! Clock Port - Injectable Wall Clock
//!
//! Deadlines, throttle windows and audit timestamps all read time through
//! this trait so simulations and tests can drive it.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;
}
