use anyhow::Result;
use async_trait::async_trait;
use dispatch_github_issues::issue_model::{ClosedIssue, Issue};
use futures_util::future::join_all;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The coding agent's bot account as an assignable actor.
pub struct AgentIdentity {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
}

/// Query and mutation surface the assignment runtime needs from the issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn resolve_agent_identity(&self) -> Result<AgentIdentity>;

    /// Open issues, oldest first, optionally restricted to one label.
    async fn list_open_issues(&self, label: Option<&str>) -> Result<Vec<Issue>>;

    /// Closed issues, most recently closed first, at most `limit` entries.
    async fn list_recently_closed_issues(&self, limit: usize) -> Result<Vec<ClosedIssue>>;

    async fn sub_issue_count(&self, issue_number: u64) -> Result<u64>;

    async fn find_label_id(&self, name: &str) -> Result<Option<String>>;

    async fn add_assignees(&self, issue_id: &str, actor_ids: &[String]) -> Result<()>;

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignee_ids: &[String],
    ) -> Result<CreatedIssue>;

    async fn add_labels(&self, issue_id: &str, label_ids: &[String]) -> Result<()>;

    /// Assignment is matched on the actor id; logins can be renamed.
    async fn list_issues_assigned_to(&self, agent: &AgentIdentity) -> Result<Vec<Issue>> {
        Ok(self
            .list_open_issues(None)
            .await?
            .into_iter()
            .filter(|issue| issue.is_assigned_to(&agent.id))
            .collect())
    }
}

/// Replace the bulk-listing sub-issue counts with per-issue lookups, fetched concurrently.
///
/// A failed lookup counts as zero sub-issues for that issue only.
pub(crate) async fn refresh_sub_issue_counts(
    tracker: &dyn IssueTracker,
    issues: Vec<Issue>,
) -> Vec<Issue> {
    let lookups = issues
        .iter()
        .map(|issue| tracker.sub_issue_count(issue.number));
    let counts = join_all(lookups).await;
    issues
        .into_iter()
        .zip(counts)
        .map(|(mut issue, count)| {
            issue.sub_issue_count = match count {
                Ok(count) => count,
                Err(error) => {
                    tracing::warn!(
                        issue = issue.number,
                        error = %error,
                        "sub-issue count lookup failed; assuming none"
                    );
                    0
                }
            };
            issue
        })
        .collect()
}
