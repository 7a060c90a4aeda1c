use std::path::Path;

use dispatch_github_issues::assignment_policy::SkipRules;
use dispatch_github_issues::github_transport_helpers::GithubRetryPolicy;
use dispatch_github_issues::refactor_cadence::AssignmentMode;
use dispatch_github_issues::repo_ref::RepoRef;
use dispatch_github_issues::trigger_event::TriggerEvent;
use dispatch_github_issues_runtime::{AssignmentConfig, GithubApiClientConfig};
use dispatch_release_retention::{GithubReleaseClientConfig, ReleaseCleanupConfig};

use crate::{CliAssignArgs, CliCleanupReleasesArgs, CliGithubFlags, InputError};

pub fn parse_repository(raw: &str) -> Result<RepoRef, InputError> {
    RepoRef::parse(raw).map_err(|error| InputError::InvalidRepository {
        value: raw.to_string(),
        reason: error.to_string(),
    })
}

fn require_token(flags: &CliGithubFlags) -> Result<String, InputError> {
    let token = flags.token.trim();
    if token.is_empty() {
        return Err(InputError::MissingToken);
    }
    Ok(token.to_string())
}

fn retry_policy(flags: &CliGithubFlags) -> GithubRetryPolicy {
    GithubRetryPolicy::new(flags.retry_max_attempts, flags.retry_base_delay_ms)
}

pub fn build_github_api_client_config(
    flags: &CliGithubFlags,
    agent_login: &str,
) -> Result<GithubApiClientConfig, InputError> {
    let agent_login = agent_login.trim();
    if agent_login.is_empty() {
        return Err(InputError::EmptyAgentLogin);
    }
    Ok(GithubApiClientConfig {
        api_base: flags.api_url.trim().to_string(),
        token: require_token(flags)?,
        repo: parse_repository(&flags.repository)?,
        agent_login: agent_login.to_string(),
        request_timeout_ms: flags.request_timeout_ms,
        retry: retry_policy(flags),
    })
}

pub fn build_release_client_config(
    flags: &CliGithubFlags,
) -> Result<GithubReleaseClientConfig, InputError> {
    Ok(GithubReleaseClientConfig {
        api_base: flags.api_url.trim().to_string(),
        token: require_token(flags)?,
        repo: parse_repository(&flags.repository)?,
        request_timeout_ms: flags.request_timeout_ms,
        retry: retry_policy(flags),
    })
}

/// Trimmed, non-empty, first occurrence wins.
fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for label in labels.iter().map(|label| label.trim()) {
        if !label.is_empty() && !normalized.iter().any(|existing| existing == label) {
            normalized.push(label.to_string());
        }
    }
    normalized
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn build_assignment_config(
    args: &CliAssignArgs,
    workspace_root: &Path,
    trigger: TriggerEvent,
) -> Result<AssignmentConfig, InputError> {
    let mode = args
        .mode
        .parse::<AssignmentMode>()
        .map_err(|_| InputError::InvalidMode(args.mode.trim().to_string()))?;
    Ok(AssignmentConfig {
        mode,
        label_override: non_empty(args.label.as_deref()),
        skip_rules: SkipRules {
            allow_parent_issues: args.allow_parent_issues,
            skip_labels: normalize_labels(&args.skip_labels),
            required_label: non_empty(args.required_label.as_deref()),
        },
        force: args.force,
        dry_run: args.dry_run,
        refactor_threshold: args.refactor_threshold,
        create_refactor_issue: args.create_refactor_issue,
        wait_seconds: args.wait_seconds,
        refactor_cooldown_days: args.refactor_cooldown_days,
        trigger,
        workspace_root: workspace_root.to_path_buf(),
        refactor_template_path: args.refactor_issue_template.trim().to_string(),
    })
}

pub fn build_release_cleanup_config(args: &CliCleanupReleasesArgs) -> ReleaseCleanupConfig {
    ReleaseCleanupConfig {
        delete_tags: args.delete_tags,
        dry_run: args.dry_run,
    }
}
