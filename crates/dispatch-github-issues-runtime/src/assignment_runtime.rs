use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use dispatch_github_issues::assignment_policy::{should_assign_new_issue, SkipRules};
use dispatch_github_issues::issue_model::{Candidate, REFACTOR_LABEL};
use dispatch_github_issues::issue_template::build_refactor_issue_draft;
use dispatch_github_issues::refactor_cadence::{
    closed_window_size, resolve_cadence, should_wait_for_cooldown, AssignmentMode, CadenceState,
};
use dispatch_github_issues::trigger_event::TriggerEvent;

use self::issue_selection::{
    find_existing_refactor_issue, find_in_remaining_backlog, find_priority_issue,
    priority_labels,
};
use self::issue_tracker::{AgentIdentity, IssueTracker};
use self::routing_stage::{PlannedAction, RoutingStage};

pub mod github_api_client;
pub mod issue_tracker;
mod issue_selection;
mod routing_stage;

/// Minimum number of recently closed issues scanned by the cooldown check.
const COOLDOWN_WINDOW_MIN: usize = 20;

#[derive(Debug, Clone)]
/// Validated per-run settings for [`AssignmentRuntime`].
pub struct AssignmentConfig {
    pub mode: AssignmentMode,
    pub label_override: Option<String>,
    pub skip_rules: SkipRules,
    pub force: bool,
    pub dry_run: bool,
    pub refactor_threshold: usize,
    pub create_refactor_issue: bool,
    pub wait_seconds: u64,
    pub refactor_cooldown_days: u64,
    pub trigger: TriggerEvent,
    pub workspace_root: PathBuf,
    pub refactor_template_path: String,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            mode: AssignmentMode::Auto,
            label_override: None,
            skip_rules: SkipRules::default(),
            force: false,
            dry_run: false,
            refactor_threshold: 4,
            create_refactor_issue: true,
            wait_seconds: 0,
            refactor_cooldown_days: 7,
            trigger: TriggerEvent::WorkflowDispatch,
            workspace_root: PathBuf::from("."),
            refactor_template_path: String::new(),
        }
    }
}

impl AssignmentConfig {
    fn label_override(&self) -> Option<&str> {
        self.label_override
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedIssue {
    pub number: u64,
    pub title: String,
    pub url: String,
}

impl From<&Candidate> for AssignedIssue {
    fn from(candidate: &Candidate) -> Self {
        Self {
            number: candidate.number,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentAction {
    Skipped { reason: String },
    Assigned { issue: AssignedIssue },
    Created { issue: AssignedIssue },
    WouldAssign { issue: AssignedIssue },
    WouldCreate { title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one assignment run.
pub struct AssignmentOutcome {
    pub effective_mode: AssignmentMode,
    pub action: AssignmentAction,
    pub dry_run: bool,
}

impl AssignmentOutcome {
    /// Issue reported in action outputs; `None` for skips and dry-run creations.
    pub fn issue(&self) -> Option<&AssignedIssue> {
        match &self.action {
            AssignmentAction::Assigned { issue }
            | AssignmentAction::Created { issue }
            | AssignmentAction::WouldAssign { issue } => Some(issue),
            AssignmentAction::Skipped { .. } | AssignmentAction::WouldCreate { .. } => None,
        }
    }

    pub fn summary_line(&self) -> String {
        match &self.action {
            AssignmentAction::Skipped { reason } => format!("Skipped: {reason}"),
            AssignmentAction::Assigned { issue } => {
                format!("Assigned #{} {}", issue.number, issue.title)
            }
            AssignmentAction::Created { issue } => {
                format!("Created and assigned #{} {}", issue.number, issue.title)
            }
            AssignmentAction::WouldAssign { issue } => {
                format!("Dry run: would assign #{} {}", issue.number, issue.title)
            }
            AssignmentAction::WouldCreate { title } => {
                format!("Dry run: would create and assign '{title}'")
            }
        }
    }
}

fn cooldown_window_size(refactor_threshold: usize) -> usize {
    closed_window_size(refactor_threshold).max(COOLDOWN_WINDOW_MIN)
}

/// Decides and performs the single assignment action of one workflow run.
pub struct AssignmentRuntime<'a> {
    tracker: &'a dyn IssueTracker,
    config: &'a AssignmentConfig,
    now: DateTime<Utc>,
}

impl<'a> AssignmentRuntime<'a> {
    pub fn new(
        tracker: &'a dyn IssueTracker,
        config: &'a AssignmentConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tracker,
            config,
            now,
        }
    }

    pub async fn run(&self) -> Result<AssignmentOutcome> {
        self.grace_wait().await;

        let cadence = self.effective_cadence().await?;
        tracing::info!(
            configured_mode = %self.config.mode,
            effective_mode = %cadence.effective_mode,
            bypass_cooldown = cadence.bypass_cooldown,
            trigger = self.config.trigger.as_str(),
            "resolved assignment mode"
        );

        let agent = self
            .tracker
            .resolve_agent_identity()
            .await
            .context("failed to resolve coding agent identity")?;
        let current_assignments = self
            .tracker
            .list_issues_assigned_to(&agent)
            .await
            .with_context(|| format!("failed to list issues assigned to {}", agent.login))?
            .iter()
            .map(Candidate::from)
            .collect::<Vec<_>>();
        let decision = should_assign_new_issue(
            &current_assignments,
            cadence.effective_mode,
            self.config.force,
        );
        tracing::info!(
            agent = %agent.login,
            current_assignments = current_assignments.len(),
            should_assign = decision.should_assign,
            reason = %decision.reason,
            "checked current work"
        );
        if !decision.should_assign {
            return Ok(self.outcome(
                cadence,
                AssignmentAction::Skipped {
                    reason: decision.reason,
                },
            ));
        }

        let planned = self.plan(cadence).await?;
        let action = self.execute(planned, &agent).await?;
        Ok(self.outcome(cadence, action))
    }

    async fn grace_wait(&self) {
        if !self.config.trigger.is_issue_state_change() || self.config.wait_seconds == 0 {
            return;
        }
        tracing::info!(
            wait_seconds = self.config.wait_seconds,
            "waiting for issue state to settle"
        );
        tokio::time::sleep(Duration::from_secs(self.config.wait_seconds)).await;
    }

    async fn effective_cadence(&self) -> Result<CadenceState> {
        if self.config.mode != AssignmentMode::Auto || !self.config.trigger.is_issue_closed() {
            return Ok(CadenceState::configured(self.config.mode));
        }
        let window = self
            .tracker
            .list_recently_closed_issues(closed_window_size(self.config.refactor_threshold))
            .await
            .context("failed to list recently closed issues")?;
        Ok(resolve_cadence(
            self.config.mode,
            Some(window.as_slice()),
            self.config.refactor_threshold,
        ))
    }

    async fn plan(&self, cadence: CadenceState) -> Result<PlannedAction> {
        let rules = &self.config.skip_rules;
        let label_override = self.config.label_override();
        let labels = priority_labels(label_override);
        let mut stage = RoutingStage::first(cadence.effective_mode);
        loop {
            tracing::debug!(stage = stage.as_str(), "routing");
            let found = match stage {
                RoutingStage::PriorityLabels => {
                    find_priority_issue(self.tracker, &labels, rules).await?
                }
                RoutingStage::AnyOpenIssue => {
                    find_in_remaining_backlog(self.tracker, &labels, rules).await?
                }
                RoutingStage::ExistingRefactor => {
                    find_existing_refactor_issue(self.tracker, rules).await?
                }
                RoutingStage::CreateRefactor => return self.plan_refactor_creation(cadence).await,
                RoutingStage::Exhausted => {
                    let reason = match label_override {
                        Some(label) => format!("no assignable issues labeled '{label}'"),
                        None => "no assignable issues found".to_string(),
                    };
                    return Ok(PlannedAction::Skip { reason });
                }
            };
            if let Some(candidate) = found {
                return Ok(PlannedAction::AssignExisting { candidate });
            }
            stage = stage.next(label_override.is_some());
        }
    }

    async fn plan_refactor_creation(&self, cadence: CadenceState) -> Result<PlannedAction> {
        if !self.config.create_refactor_issue {
            return Ok(PlannedAction::Skip {
                reason: "no assignable issues found and refactor issue creation is disabled"
                    .to_string(),
            });
        }
        if cadence.bypass_cooldown {
            tracing::info!("refactor threshold reached; bypassing refactor cooldown");
        } else if self.config.refactor_cooldown_days > 0 {
            let window = self
                .tracker
                .list_recently_closed_issues(cooldown_window_size(self.config.refactor_threshold))
                .await
                .context("failed to list recently closed issues for refactor cooldown")?;
            let cooldown =
                should_wait_for_cooldown(&window, self.config.refactor_cooldown_days, self.now);
            tracing::info!(
                should_wait = cooldown.should_wait,
                reason = %cooldown.reason,
                "checked refactor cooldown"
            );
            if cooldown.should_wait {
                return Ok(PlannedAction::Skip {
                    reason: cooldown.reason,
                });
            }
        }
        Ok(PlannedAction::CreateAndAssign {
            draft: build_refactor_issue_draft(
                &self.config.workspace_root,
                &self.config.refactor_template_path,
                self.now,
            ),
        })
    }

    async fn execute(
        &self,
        planned: PlannedAction,
        agent: &AgentIdentity,
    ) -> Result<AssignmentAction> {
        let dry_run = self.config.dry_run;
        match planned {
            PlannedAction::Skip { reason } => {
                tracing::info!(reason = %reason, "no assignment this run");
                Ok(AssignmentAction::Skipped { reason })
            }
            PlannedAction::AssignExisting { candidate } => {
                let issue = AssignedIssue::from(&candidate);
                if dry_run {
                    tracing::info!(issue = issue.number, "dry run: would assign issue");
                    return Ok(AssignmentAction::WouldAssign { issue });
                }
                self.tracker
                    .add_assignees(&candidate.id, std::slice::from_ref(&agent.id))
                    .await
                    .with_context(|| format!("failed to assign issue #{}", issue.number))?;
                tracing::info!(issue = issue.number, agent = %agent.login, "assigned issue");
                Ok(AssignmentAction::Assigned { issue })
            }
            PlannedAction::CreateAndAssign { draft } => {
                let required_label_id = self.required_label_id().await?;
                if dry_run {
                    tracing::info!(title = %draft.title, "dry run: would create refactor issue");
                    return Ok(AssignmentAction::WouldCreate { title: draft.title });
                }
                let created = self
                    .tracker
                    .create_issue(&draft.title, &draft.body, std::slice::from_ref(&agent.id))
                    .await
                    .context("failed to create refactor issue")?;
                tracing::info!(
                    issue = created.number,
                    agent = %agent.login,
                    "created and assigned refactor issue"
                );
                let mut label_ids = required_label_id.into_iter().collect::<Vec<_>>();
                match self.tracker.find_label_id(REFACTOR_LABEL).await {
                    Ok(Some(id)) => label_ids.push(id),
                    Ok(None) => tracing::warn!(
                        label = REFACTOR_LABEL,
                        "label does not exist; created issue left without it"
                    ),
                    Err(error) => tracing::warn!(
                        label = REFACTOR_LABEL,
                        error = %error,
                        "label lookup failed; created issue left without it"
                    ),
                }
                label_ids.dedup();
                if !label_ids.is_empty() {
                    if let Err(error) = self.tracker.add_labels(&created.id, &label_ids).await {
                        tracing::warn!(
                            issue = created.number,
                            error = %error,
                            "failed to label created refactor issue"
                        );
                    }
                }
                Ok(AssignmentAction::Created {
                    issue: AssignedIssue {
                        number: created.number,
                        title: created.title,
                        url: created.url,
                    },
                })
            }
        }
    }

    /// A configured required label must exist before an issue is created for it.
    async fn required_label_id(&self) -> Result<Option<String>> {
        let Some(label) = self.config.skip_rules.required_label() else {
            return Ok(None);
        };
        let id = self
            .tracker
            .find_label_id(label)
            .await
            .with_context(|| format!("failed to look up required label '{label}'"))?
            .ok_or_else(|| anyhow!("required label '{label}' does not exist in the repository"))?;
        Ok(Some(id))
    }

    fn outcome(&self, cadence: CadenceState, action: AssignmentAction) -> AssignmentOutcome {
        AssignmentOutcome {
            effective_mode: cadence.effective_mode,
            action,
            dry_run: self.config.dry_run,
        }
    }
}
