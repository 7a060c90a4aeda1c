//! Issue-assignment runtime for the dispatch GitHub Action.
//!
//! Wires the pure policies from `dispatch-github-issues` to the GitHub API: the
//! [`IssueTracker`] seam, its REST/GraphQL implementation, the priority-label
//! selection engine and the per-run assignment state machine.

mod assignment_runtime;

pub use assignment_runtime::github_api_client::{GithubApiClient, GithubApiClientConfig};
pub use assignment_runtime::issue_tracker::{AgentIdentity, CreatedIssue, IssueTracker};
pub use assignment_runtime::{
    AssignedIssue, AssignmentAction, AssignmentConfig, AssignmentOutcome, AssignmentRuntime,
};
