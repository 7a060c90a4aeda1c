use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub(crate) fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

pub(crate) fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "copilot-dispatch",
    about = "Assigns the Copilot coding agent to issues and prunes old releases",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub github: CliGithubFlags,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Pick one issue (or create a refactor issue) and assign it to the coding agent.
    Assign(CliAssignArgs),
    /// Delete releases that fall outside the retention policy.
    CleanupReleases(CliCleanupReleasesArgs),
}

/// Repository, credentials and transport tuning shared by every subcommand.
#[derive(Debug, Args)]
pub struct CliGithubFlags {
    #[arg(
        long,
        global = true,
        env = "GITHUB_REPOSITORY",
        default_value = "",
        help = "Target repository in owner/repo form"
    )]
    pub repository: String,

    #[arg(
        long = "api-url",
        global = true,
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "GitHub REST API base URL; GraphQL is derived from it"
    )]
    pub api_url: String,

    #[arg(
        long,
        global = true,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        default_value = "",
        help = "Token used for every GitHub API call"
    )]
    pub token: String,

    #[arg(
        long = "workspace",
        global = true,
        env = "GITHUB_WORKSPACE",
        default_value = ".",
        help = "Checked-out repository root; template paths resolve inside it"
    )]
    pub workspace: PathBuf,

    #[arg(
        long = "request-timeout-ms",
        global = true,
        env = "INPUT_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single GitHub API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        global = true,
        env = "INPUT_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per GitHub request before giving up on retryable failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        global = true,
        env = "INPUT_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Args)]
pub struct CliAssignArgs {
    #[arg(
        long,
        env = "INPUT_MODE",
        default_value = "auto",
        help = "Assignment mode: auto (priority labels) or refactor"
    )]
    pub mode: String,

    #[arg(
        long,
        env = "INPUT_LABEL",
        help = "Only consider open issues carrying this label"
    )]
    pub label: Option<String>,

    #[arg(
        long = "required-label",
        env = "INPUT_REQUIRED_LABEL",
        help = "Skip issues without this label; it is also attached to created refactor issues"
    )]
    pub required_label: Option<String>,

    #[arg(
        long = "skip-labels",
        env = "INPUT_SKIP_LABELS",
        value_delimiter = ',',
        default_value = "no-ai,refining",
        help = "Comma-separated labels that exclude an issue from assignment"
    )]
    pub skip_labels: Vec<String>,

    #[arg(
        long,
        env = "INPUT_FORCE",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Assign even when the agent already has open assignments"
    )]
    pub force: bool,

    #[arg(
        long = "dry-run",
        env = "INPUT_DRY_RUN",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Decide and report without assigning or creating anything"
    )]
    pub dry_run: bool,

    #[arg(
        long = "allow-parent-issues",
        env = "INPUT_ALLOW_PARENT_ISSUES",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Allow assigning issues that have sub-issues"
    )]
    pub allow_parent_issues: bool,

    #[arg(
        long = "refactor-threshold",
        env = "INPUT_REFACTOR_THRESHOLD",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Switch to refactor mode when none of this many recently closed issues was refactor work"
    )]
    pub refactor_threshold: usize,

    #[arg(
        long = "create-refactor-issue",
        env = "INPUT_CREATE_REFACTOR_ISSUE",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Create a refactor issue when no existing issue is assignable"
    )]
    pub create_refactor_issue: bool,

    #[arg(
        long = "wait-seconds",
        env = "INPUT_WAIT_SECONDS",
        default_value_t = 0,
        help = "Grace period before reading state on issue events"
    )]
    pub wait_seconds: u64,

    #[arg(
        long = "refactor-cooldown-days",
        env = "INPUT_REFACTOR_COOLDOWN_DAYS",
        default_value_t = 7,
        help = "Days after an auto-created refactor issue closes before another is created (0 disables)"
    )]
    pub refactor_cooldown_days: u64,

    #[arg(
        long = "refactor-issue-template",
        env = "INPUT_REFACTOR_ISSUE_TEMPLATE",
        default_value = ".github/REFACTOR_ISSUE_TEMPLATE.md",
        help = "Workspace-relative markdown file used as the refactor issue body"
    )]
    pub refactor_issue_template: String,

    #[arg(
        long = "agent-login",
        env = "INPUT_AGENT_LOGIN",
        default_value = "copilot-swe-agent",
        help = "Login of the coding agent among the repository's assignable actors"
    )]
    pub agent_login: String,

    #[arg(
        long = "event-name",
        env = "GITHUB_EVENT_NAME",
        default_value = "workflow_dispatch",
        help = "Name of the workflow event that triggered this run"
    )]
    pub event_name: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the webhook payload of the triggering event"
    )]
    pub event_path: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CliCleanupReleasesArgs {
    #[arg(
        long = "delete-tags",
        env = "INPUT_DELETE_TAGS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Also delete the git tag of every deleted release"
    )]
    pub delete_tags: bool,

    #[arg(
        long = "dry-run",
        env = "INPUT_DRY_RUN",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Report the releases that would be deleted without deleting them"
    )]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::{parse_positive_u64, parse_positive_usize, Cli, CliCommand};
    use clap::Parser;

    #[test]
    fn unit_parse_positive_helpers_reject_zero_and_garbage() {
        assert_eq!(parse_positive_usize("4"), Ok(4));
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_u64("abc").is_err());
        assert_eq!(parse_positive_u64(" 30 "), Ok(30));
    }

    #[test]
    fn functional_assign_flags_parse_with_explicit_values() {
        let cli = Cli::try_parse_from([
            "copilot-dispatch",
            "--repository",
            "octo/widgets",
            "--token",
            "t",
            "assign",
            "--mode",
            "refactor",
            "--skip-labels",
            "no-ai,wip",
            "--force=true",
            "--dry-run",
            "--refactor-threshold",
            "6",
            "--refactor-cooldown-days",
            "0",
        ])
        .expect("parse");

        assert_eq!(cli.github.repository, "octo/widgets");
        let CliCommand::Assign(args) = cli.command else {
            panic!("expected assign subcommand");
        };
        assert_eq!(args.mode, "refactor");
        assert_eq!(args.skip_labels, vec!["no-ai", "wip"]);
        assert!(args.force);
        assert!(args.dry_run);
        assert!(args.create_refactor_issue);
        assert_eq!(args.refactor_threshold, 6);
        assert_eq!(args.refactor_cooldown_days, 0);
    }

    #[test]
    fn regression_zero_refactor_threshold_is_rejected() {
        let error = Cli::try_parse_from([
            "copilot-dispatch",
            "assign",
            "--refactor-threshold",
            "0",
        ])
        .expect_err("zero threshold should fail");

        assert!(error.to_string().contains("value must be greater than 0"));
    }

    #[test]
    fn functional_cleanup_releases_parses_delete_tags() {
        let cli = Cli::try_parse_from([
            "copilot-dispatch",
            "cleanup-releases",
            "--delete-tags=true",
        ])
        .expect("parse");

        let CliCommand::CleanupReleases(args) = cli.command else {
            panic!("expected cleanup-releases subcommand");
        };
        assert!(args.delete_tags);
        assert!(!args.dry_run);
    }
}
