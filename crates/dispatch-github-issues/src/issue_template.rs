use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::issue_model::AUTO_CREATED_MARKER;

pub const DEFAULT_REFACTOR_ISSUE_BODY: &str = "\
## Codebase housekeeping

Review the repository and make focused improvements to code quality without changing behavior:

- Remove dead code and unused dependencies.
- Simplify overly complex functions and reduce duplication.
- Improve naming, module boundaries and error messages where they are unclear.
- Add or tighten tests around code you touch.

Keep the change small enough to review in one sitting.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefactorIssueDraft {
    pub title: String,
    pub body: String,
}

pub fn refactor_issue_title(now: DateTime<Utc>) -> String {
    format!(
        "{AUTO_CREATED_MARKER} Refactor: codebase housekeeping ({})",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub fn build_refactor_issue_draft(
    workspace_root: &Path,
    template_path: &str,
    now: DateTime<Utc>,
) -> RefactorIssueDraft {
    RefactorIssueDraft {
        title: refactor_issue_title(now),
        body: read_template(workspace_root, template_path),
    }
}

/// Loads the refactor issue body template.
///
/// Never fails: an empty path, a path escaping the workspace, a missing or unreadable
/// file, or an empty file all yield [`DEFAULT_REFACTOR_ISSUE_BODY`].
pub fn read_template(workspace_root: &Path, template_path: &str) -> String {
    let template_path = template_path.trim();
    if template_path.is_empty() {
        return DEFAULT_REFACTOR_ISSUE_BODY.to_string();
    }
    let Some(resolved) = resolve_inside_workspace(workspace_root, Path::new(template_path))
    else {
        tracing::warn!(
            path = template_path,
            "refactor template path is outside the workspace; using default body"
        );
        return DEFAULT_REFACTOR_ISSUE_BODY.to_string();
    };
    match std::fs::read_to_string(&resolved) {
        Ok(content) if !content.trim().is_empty() => content,
        Ok(_) => {
            tracing::warn!(path = %resolved.display(), "refactor template is empty; using default body");
            DEFAULT_REFACTOR_ISSUE_BODY.to_string()
        }
        Err(error) => {
            tracing::warn!(
                path = %resolved.display(),
                error = %error,
                "failed to read refactor template; using default body"
            );
            DEFAULT_REFACTOR_ISSUE_BODY.to_string()
        }
    }
}

fn resolve_inside_workspace(workspace_root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = workspace_root.canonicalize().ok()?;
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = joined.canonicalize().ok()?;
    resolved.starts_with(&root).then_some(resolved)
}
