use dispatch_github_issues::issue_model::Candidate;
use dispatch_github_issues::issue_template::RefactorIssueDraft;
use dispatch_github_issues::refactor_cadence::AssignmentMode;

/// Where the routing loop looks next. Transitions only move forward, so the auto-mode
/// fallback into refactor work can never cycle back into priority routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoutingStage {
    PriorityLabels,
    AnyOpenIssue,
    ExistingRefactor,
    CreateRefactor,
    Exhausted,
}

impl RoutingStage {
    pub(crate) fn first(mode: AssignmentMode) -> Self {
        match mode {
            AssignmentMode::Auto => Self::PriorityLabels,
            AssignmentMode::Refactor => Self::ExistingRefactor,
        }
    }

    /// With a label override the search is confined to that one bucket.
    pub(crate) fn next(self, has_label_override: bool) -> Self {
        match self {
            Self::PriorityLabels if has_label_override => Self::Exhausted,
            Self::PriorityLabels => Self::AnyOpenIssue,
            // The refactor bucket was already searched as a priority label.
            Self::AnyOpenIssue => Self::CreateRefactor,
            Self::ExistingRefactor => Self::CreateRefactor,
            Self::CreateRefactor | Self::Exhausted => Self::Exhausted,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::PriorityLabels => "priority_labels",
            Self::AnyOpenIssue => "any_open_issue",
            Self::ExistingRefactor => "existing_refactor",
            Self::CreateRefactor => "create_refactor",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Terminal action chosen by routing, before dry-run or mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedAction {
    Skip { reason: String },
    AssignExisting { candidate: Candidate },
    CreateAndAssign { draft: RefactorIssueDraft },
}
