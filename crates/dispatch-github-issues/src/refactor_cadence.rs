//! Refactor cadence: when to switch from priority routing to refactor work, and when
//! autonomous refactor-issue creation has to wait.
//!
//! Nothing here is persisted. Every run rebuilds the decision from the most recently
//! closed issues, and the current time is always passed in by the caller.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use dispatch_core::days_between;
use serde::{Deserialize, Serialize};

use crate::issue_model::ClosedIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMode {
    Auto,
    Refactor,
}

impl AssignmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentMode::Auto => "auto",
            AssignmentMode::Refactor => "refactor",
        }
    }
}

impl std::fmt::Display for AssignmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssignmentMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "auto" => Ok(Self::Auto),
            "refactor" => Ok(Self::Refactor),
            other => bail!("invalid assignment mode '{other}'; expected auto|refactor"),
        }
    }
}

/// Mode actually used for this run, after the refactor-ratio override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceState {
    pub effective_mode: AssignmentMode,
    pub bypass_cooldown: bool,
}

impl CadenceState {
    pub fn configured(mode: AssignmentMode) -> Self {
        Self {
            effective_mode: mode,
            bypass_cooldown: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownDecision {
    pub should_wait: bool,
    pub reason: String,
}

/// Number of closed issues to fetch for the threshold check: the threshold window
/// plus the issue whose closing triggered the run.
pub fn closed_window_size(refactor_threshold: usize) -> usize {
    refactor_threshold.saturating_add(1)
}

/// True when any of the first `count` issues (most recently closed first) is refactor work.
pub fn has_recent_refactor_issue(recently_closed: &[ClosedIssue], count: usize) -> bool {
    recently_closed
        .iter()
        .take(count)
        .any(ClosedIssue::is_refactor)
}

/// Switches an `auto` run to `refactor` when the recent window holds no refactor work.
///
/// `closed_window` is only supplied for issue-closed triggers; without it the configured
/// mode is used unchanged. A threshold switch bypasses the cooldown, otherwise a broken
/// 1-in-N ratio could never recover.
pub fn resolve_cadence(
    configured: AssignmentMode,
    closed_window: Option<&[ClosedIssue]>,
    refactor_threshold: usize,
) -> CadenceState {
    match (configured, closed_window) {
        (AssignmentMode::Auto, Some(window))
            if !has_recent_refactor_issue(window, refactor_threshold) =>
        {
            CadenceState {
                effective_mode: AssignmentMode::Refactor,
                bypass_cooldown: true,
            }
        }
        _ => CadenceState::configured(configured),
    }
}

/// Scans the whole window, not just the latest closure: unrelated issues may have
/// closed after the last auto-created refactor issue.
pub fn should_wait_for_cooldown(
    recently_closed: &[ClosedIssue],
    cooldown_days: u64,
    now: DateTime<Utc>,
) -> CooldownDecision {
    if cooldown_days == 0 {
        return CooldownDecision {
            should_wait: false,
            reason: "refactor cooldown disabled".to_string(),
        };
    }
    let window_days = cooldown_days as f64;
    for issue in recently_closed {
        if !issue.is_refactor() || !issue.is_auto_created() {
            continue;
        }
        let Some(closed_at) = issue.closed_at else {
            continue;
        };
        let days_since_closed = days_between(closed_at, now).max(0.0);
        if days_since_closed < window_days {
            let remaining = (window_days - days_since_closed).ceil() as u64;
            return CooldownDecision {
                should_wait: true,
                reason: format!(
                    "auto-created refactor issue #{} closed {:.1} day(s) ago; cooldown of {} day(s) has {} day(s) remaining",
                    issue.number, days_since_closed, cooldown_days, remaining
                ),
            };
        }
    }
    CooldownDecision {
        should_wait: false,
        reason: format!(
            "no auto-created refactor issue closed within the last {cooldown_days} day(s)"
        ),
    }
}
