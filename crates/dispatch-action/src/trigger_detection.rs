use std::path::Path;

use dispatch_github_issues::trigger_event::{read_event_action, TriggerEvent};

/// Classifies the triggering workflow event. An unreadable payload only loses the
/// issue `action`; the run continues as a generic issue event.
pub(crate) fn detect_trigger(event_name: &str, event_path: Option<&Path>) -> TriggerEvent {
    let action = if event_name.trim() == "issues" {
        event_path.and_then(|path| match read_event_action(path) {
            Ok(action) => action,
            Err(error) => {
                tracing::warn!(error = %error, "could not read event payload action");
                None
            }
        })
    } else {
        None
    };
    let trigger = TriggerEvent::from_event(event_name, action.as_deref());
    tracing::info!(event = event_name, trigger = trigger.as_str(), "detected trigger");
    trigger
}
