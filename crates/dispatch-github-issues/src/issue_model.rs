//! Normalized issue model and the wire shapes it is built from.
//!
//! GraphQL wraps labels and assignees in `{ nodes: [...] }` connections while the REST
//! API returns flat arrays. Both are flattened into [`IssueLabels`] here so that policy
//! code only ever sees one representation.

use chrono::{DateTime, Utc};
use dispatch_core::parse_rfc3339_utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title marker stamped on issues the automation creates itself.
pub const AUTO_CREATED_MARKER: &str = "[AUTO]";
pub const REFACTOR_LABEL: &str = "refactor";
/// Label buckets searched in order when no override is configured.
pub const PRIORITY_LABELS: [&str; 4] = ["bug", "documentation", "refactor", "enhancement"];

/// Ordered, name-unique label names. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueLabels(Vec<String>);

impl IssueLabels {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || labels.iter().any(|existing| existing == name) {
                continue;
            }
            labels.push(name.to_string());
        }
        Self(labels)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|label| label == name)
    }

    /// First entry of `names` (in the caller's order) that this set carries.
    pub fn first_match<'a, S: AsRef<str>>(&self, names: &'a [S]) -> Option<&'a str> {
        names
            .iter()
            .map(|name| name.as_ref())
            .find(|name| self.contains(name))
    }

    pub fn is_refactor(&self) -> bool {
        self.contains(REFACTOR_LABEL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn is_auto_created_title(title: &str) -> bool {
    title.contains(AUTO_CREATED_MARKER)
}

/// An open issue as read from the tracker, after label normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub assignee_ids: Vec<String>,
    pub labels: IssueLabels,
    pub sub_issue_count: u64,
    pub tracked_in_count: u64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn is_assigned_to(&self, actor_id: &str) -> bool {
        self.assignee_ids.iter().any(|id| id == actor_id)
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate::from(self)
    }
}

/// A recently closed issue, used only by the refactor cadence policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedIssue {
    pub number: u64,
    pub title: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: IssueLabels,
}

impl ClosedIssue {
    pub fn is_refactor(&self) -> bool {
        self.labels.is_refactor()
    }

    pub fn is_auto_created(&self) -> bool {
        is_auto_created_title(&self.title)
    }
}

/// Per-evaluation projection of an [`Issue`]; rebuilt on every pass, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub is_assigned: bool,
    pub has_sub_issues: bool,
    pub is_sub_issue: bool,
    pub is_refactor_labeled: bool,
    pub labels: IssueLabels,
}

impl From<&Issue> for Candidate {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            number: issue.number,
            title: issue.title.clone(),
            url: issue.url.clone(),
            is_assigned: !issue.assignee_ids.is_empty(),
            has_sub_issues: issue.sub_issue_count > 0,
            is_sub_issue: issue.tracked_in_count > 0,
            is_refactor_labeled: issue.labels.is_refactor(),
            labels: issue.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlConnection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for GraphqlConnection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlLabelNode {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlActorNode {
    pub id: String,
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlTotalCount {
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlIssueNode {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub assignees: Option<GraphqlConnection<GraphqlActorNode>>,
    #[serde(default)]
    pub labels: Option<GraphqlConnection<GraphqlLabelNode>>,
    #[serde(default)]
    pub sub_issues: Option<GraphqlTotalCount>,
    #[serde(default)]
    pub tracked_in_issues: Option<GraphqlTotalCount>,
}

impl From<GraphqlIssueNode> for Issue {
    fn from(node: GraphqlIssueNode) -> Self {
        let labels = node.labels.unwrap_or_default();
        let assignees = node.assignees.unwrap_or_default();
        Self {
            id: node.id,
            number: node.number,
            title: node.title,
            url: node.url,
            assignee_ids: assignees.nodes.into_iter().map(|actor| actor.id).collect(),
            labels: IssueLabels::from_names(labels.nodes.iter().map(|label| label.name.as_str())),
            sub_issue_count: node.sub_issues.map(|count| count.total_count).unwrap_or(0),
            tracked_in_count: node
                .tracked_in_issues
                .map(|count| count.total_count)
                .unwrap_or(0),
            created_at: node.created_at.as_deref().and_then(parse_rfc3339_utc),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<RestLabel>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl RestIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl From<RestIssue> for ClosedIssue {
    fn from(issue: RestIssue) -> Self {
        Self {
            number: issue.number,
            labels: IssueLabels::from_names(issue.labels.iter().map(|label| label.name.as_str())),
            closed_at: issue.closed_at.as_deref().and_then(parse_rfc3339_utc),
            title: issue.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ClosedIssue, GraphqlIssueNode, Issue, IssueLabels, RestIssue, AUTO_CREATED_MARKER,
    };
    use serde_json::json;

    #[test]
    fn unit_issue_labels_trim_and_deduplicate_preserving_order() {
        let labels = IssueLabels::from_names(["bug", " refactor ", "bug", ""]);
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["bug", "refactor"]);
        assert!(labels.is_refactor());
        assert!(!labels.contains("Bug"));
    }

    #[test]
    fn unit_issue_labels_first_match_follows_caller_order() {
        let labels = IssueLabels::from_names(["wip", "no-ai"]);
        let skip = vec!["no-ai".to_string(), "wip".to_string()];
        assert_eq!(labels.first_match(&skip), Some("no-ai"));
        assert_eq!(labels.first_match(&["other"]), None);
    }

    #[test]
    fn functional_graphql_issue_node_flattens_connections() {
        let node: GraphqlIssueNode = serde_json::from_value(json!({
            "id": "I_1",
            "number": 12,
            "title": "Crash on start",
            "url": "https://github.com/owner/repo/issues/12",
            "createdAt": "2026-01-02T03:04:05Z",
            "assignees": {"nodes": [{"id": "BOT_1", "login": "copilot-swe-agent"}]},
            "labels": {"nodes": [{"name": "bug"}, {"name": "refactor"}]},
            "subIssues": {"totalCount": 2},
            "trackedInIssues": {"totalCount": 1}
        }))
        .expect("decode node");
        let issue = Issue::from(node);
        assert_eq!(issue.assignee_ids, vec!["BOT_1".to_string()]);
        assert!(issue.is_assigned_to("BOT_1"));
        let candidate = issue.to_candidate();
        assert!(candidate.is_assigned);
        assert!(candidate.has_sub_issues);
        assert!(candidate.is_sub_issue);
        assert!(candidate.is_refactor_labeled);
    }

    #[test]
    fn functional_graphql_issue_node_tolerates_missing_connections() {
        let node: GraphqlIssueNode = serde_json::from_value(json!({
            "id": "I_2",
            "number": 13,
            "title": "Docs",
            "url": "https://github.com/owner/repo/issues/13"
        }))
        .expect("decode node");
        let candidate = Issue::from(node).to_candidate();
        assert!(!candidate.is_assigned);
        assert!(!candidate.has_sub_issues);
        assert!(candidate.labels.is_empty());
    }

    #[test]
    fn functional_rest_issue_converts_to_closed_issue() {
        let issue: RestIssue = serde_json::from_value(json!({
            "number": 7,
            "title": format!("{AUTO_CREATED_MARKER} Refactor: housekeeping"),
            "closed_at": "2026-02-01T00:00:00Z",
            "labels": [{"name": "refactor", "color": "ffffff"}]
        }))
        .expect("decode rest issue");
        assert!(!issue.is_pull_request());
        let closed = ClosedIssue::from(issue);
        assert!(closed.is_refactor());
        assert!(closed.is_auto_created());
        assert!(closed.closed_at.is_some());
    }
}
