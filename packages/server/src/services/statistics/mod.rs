//! Assignment and classroom analytics snapshots.
//!
//! Snapshots are keyed by (entity, UTC date) and rebuilt from the live rows,
//! so any recomputation converges on the same values.

pub mod assignment;
pub mod calculator;
pub mod classroom;

use chrono::{NaiveDate, Utc};

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
