use anyhow::{Context, Result};
use dispatch_github_issues::assignment_policy::{find_assignable_issue, SkipRules};
use dispatch_github_issues::issue_model::{Candidate, Issue, PRIORITY_LABELS, REFACTOR_LABEL};

use super::issue_tracker::{refresh_sub_issue_counts, IssueTracker};

/// Label buckets searched in order: the override alone, or the fixed priority list.
pub(crate) fn priority_labels(label_override: Option<&str>) -> Vec<String> {
    match label_override
        .map(str::trim)
        .filter(|label| !label.is_empty())
    {
        Some(label) => vec![label.to_string()],
        None => PRIORITY_LABELS
            .iter()
            .map(|label| label.to_string())
            .collect(),
    }
}

/// Oldest first; issues without a creation time keep their listing order at the end.
fn sort_oldest_first(issues: &mut [Issue]) {
    issues.sort_by(|left, right| match (left.created_at, right.created_at) {
        (Some(left_at), Some(right_at)) => left_at
            .cmp(&right_at)
            .then(left.number.cmp(&right.number)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

async fn candidates_from(tracker: &dyn IssueTracker, mut issues: Vec<Issue>) -> Vec<Candidate> {
    sort_oldest_first(&mut issues);
    refresh_sub_issue_counts(tracker, issues)
        .await
        .iter()
        .map(Issue::to_candidate)
        .collect()
}

pub(crate) async fn find_in_label_bucket(
    tracker: &dyn IssueTracker,
    label: &str,
    rules: &SkipRules,
) -> Result<Option<Candidate>> {
    let issues = tracker
        .list_open_issues(Some(label))
        .await
        .with_context(|| format!("failed to list open issues labeled '{label}'"))?;
    let candidates = candidates_from(tracker, issues).await;
    let picked = find_assignable_issue(&candidates, rules).cloned();
    tracing::info!(
        label,
        candidates = candidates.len(),
        picked = ?picked.as_ref().map(|candidate| candidate.number),
        "searched label bucket"
    );
    Ok(picked)
}

/// Walks the label buckets in priority order and returns the first assignable issue.
pub(crate) async fn find_priority_issue(
    tracker: &dyn IssueTracker,
    labels: &[String],
    rules: &SkipRules,
) -> Result<Option<Candidate>> {
    for label in labels {
        if let Some(candidate) = find_in_label_bucket(tracker, label, rules).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Scans every open issue that carries none of `searched_labels`, oldest first.
pub(crate) async fn find_in_remaining_backlog(
    tracker: &dyn IssueTracker,
    searched_labels: &[String],
    rules: &SkipRules,
) -> Result<Option<Candidate>> {
    let issues = tracker
        .list_open_issues(None)
        .await
        .context("failed to list open issues")?
        .into_iter()
        .filter(|issue| {
            !searched_labels
                .iter()
                .any(|label| issue.labels.contains(label))
        })
        .collect::<Vec<_>>();
    let candidates = candidates_from(tracker, issues).await;
    let picked = find_assignable_issue(&candidates, rules).cloned();
    tracing::info!(
        candidates = candidates.len(),
        picked = ?picked.as_ref().map(|candidate| candidate.number),
        "searched remaining open issues"
    );
    Ok(picked)
}

pub(crate) async fn find_existing_refactor_issue(
    tracker: &dyn IssueTracker,
    rules: &SkipRules,
) -> Result<Option<Candidate>> {
    find_in_label_bucket(tracker, REFACTOR_LABEL, rules).await
}
