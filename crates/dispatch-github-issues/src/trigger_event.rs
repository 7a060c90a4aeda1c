use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates the workflow events the action distinguishes between.
pub enum TriggerEvent {
    IssueClosed,
    IssueStateChange { action: String },
    Schedule,
    WorkflowDispatch,
    Other(String),
}

impl TriggerEvent {
    /// Classify a workflow run from `GITHUB_EVENT_NAME` and the payload `action`.
    pub fn from_event(event_name: &str, action: Option<&str>) -> Self {
        let action = action.map(str::trim).filter(|value| !value.is_empty());
        match event_name.trim() {
            "issues" => match action {
                Some("closed") => Self::IssueClosed,
                Some(other) => Self::IssueStateChange {
                    action: other.to_string(),
                },
                None => Self::IssueStateChange {
                    action: "unknown".to_string(),
                },
            },
            "schedule" => Self::Schedule,
            "workflow_dispatch" => Self::WorkflowDispatch,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_issue_state_change(&self) -> bool {
        matches!(self, Self::IssueClosed | Self::IssueStateChange { .. })
    }

    pub fn is_issue_closed(&self) -> bool {
        matches!(self, Self::IssueClosed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::IssueClosed => "issues.closed",
            Self::IssueStateChange { .. } => "issues",
            Self::Schedule => "schedule",
            Self::WorkflowDispatch => "workflow_dispatch",
            Self::Other(name) => name.as_str(),
        }
    }
}

/// Read the `action` field from the webhook payload GitHub writes to `GITHUB_EVENT_PATH`.
pub fn read_event_action(payload_path: &Path) -> Result<Option<String>> {
    let raw = std::fs::read_to_string(payload_path).with_context(|| {
        format!(
            "failed to read workflow event payload {}",
            payload_path.display()
        )
    })?;
    let payload = serde_json::from_str::<Value>(&raw).with_context(|| {
        format!(
            "failed to parse workflow event payload {}",
            payload_path.display()
        )
    })?;
    Ok(payload
        .get("action")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned))
}
