use crate::issue_model::{Candidate, IssueLabels};
use crate::refactor_cadence::AssignmentMode;

/// Per-run eligibility rules applied to every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipRules {
    pub allow_parent_issues: bool,
    pub skip_labels: Vec<String>,
    pub required_label: Option<String>,
}

impl SkipRules {
    pub fn required_label(&self) -> Option<&str> {
        self.required_label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub should_skip: bool,
    pub reason: String,
}

impl SkipDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_skip: true,
            reason: reason.into(),
        }
    }

    fn eligible() -> Self {
        Self {
            should_skip: false,
            reason: "eligible for assignment".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignDecision {
    pub should_assign: bool,
    pub reason: String,
}

impl AssignDecision {
    fn assign(reason: impl Into<String>) -> Self {
        Self {
            should_assign: true,
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_assign: false,
            reason: reason.into(),
        }
    }
}

/// Checks run in a fixed order and the first hit wins, so the reported reason is
/// always the most definitive one.
pub fn should_skip_issue(candidate: &Candidate, rules: &SkipRules) -> SkipDecision {
    if candidate.is_assigned {
        return SkipDecision::skip("already assigned");
    }
    if candidate.has_sub_issues && !rules.allow_parent_issues {
        return SkipDecision::skip("has sub-issues");
    }
    if let Some(label) = candidate.labels.first_match(&rules.skip_labels) {
        return SkipDecision::skip(format!("has skip label: {label}"));
    }
    if let Some(required) = rules.required_label() {
        if !has_required_label(&candidate.labels, Some(required)) {
            return SkipDecision::skip(format!("missing required label: {required}"));
        }
    }
    SkipDecision::eligible()
}

pub fn has_required_label(labels: &IssueLabels, required_label: Option<&str>) -> bool {
    match required_label.map(str::trim).filter(|label| !label.is_empty()) {
        Some(required) => labels.contains(required),
        None => true,
    }
}

/// Returns the first candidate, in the caller's order, that survives [`should_skip_issue`].
pub fn find_assignable_issue<'a>(
    candidates: &'a [Candidate],
    rules: &SkipRules,
) -> Option<&'a Candidate> {
    candidates.iter().find(|candidate| {
        let decision = should_skip_issue(candidate, rules);
        if decision.should_skip {
            tracing::debug!(
                issue = candidate.number,
                reason = %decision.reason,
                "skipping candidate issue"
            );
        }
        !decision.should_skip
    })
}

/// Decides whether the agent may take on more work given what it already holds.
pub fn should_assign_new_issue(
    current_assignments: &[Candidate],
    effective_mode: AssignmentMode,
    force: bool,
) -> AssignDecision {
    if current_assignments.is_empty() {
        return AssignDecision::assign("no issues currently assigned");
    }
    if force {
        return AssignDecision::assign(format!(
            "force=true overrides {} existing assignment(s)",
            current_assignments.len()
        ));
    }
    match effective_mode {
        AssignmentMode::Refactor => {
            if current_assignments
                .iter()
                .any(|issue| issue.is_refactor_labeled)
            {
                AssignDecision::skip("already has a refactor issue assigned")
            } else {
                AssignDecision::skip("working on other issues, skipping refactor creation")
            }
        }
        AssignmentMode::Auto => AssignDecision::skip("already has assigned issues and force=false"),
    }
}
