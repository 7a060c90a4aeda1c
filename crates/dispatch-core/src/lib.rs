//! Foundational low-level utilities shared across dispatch crates.
//!
//! Provides UTC time helpers used by the cadence and retention policies, and the
//! GitHub Actions output writer used by the action binary.

pub mod action_output;
pub mod time_utils;

pub use action_output::ActionOutputWriter;
pub use time_utils::{current_utc, days_between, parse_rfc3339_utc};
