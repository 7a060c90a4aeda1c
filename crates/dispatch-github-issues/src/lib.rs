//! Shared issue-assignment policy for the dispatch GitHub issue runtime.
//! This crate holds the pure decision functions (skip/assign eligibility and
//! refactor cadence), the normalized issue model, trigger-event parsing, the
//! refactor-issue template loader, repository slug parsing and transport retry
//! helpers.

pub mod assignment_policy;
pub mod github_transport_helpers;
pub mod issue_model;
pub mod issue_template;
pub mod refactor_cadence;
pub mod repo_ref;
pub mod trigger_event;
