use anyhow::{Context, Result};
use dispatch_cli::{
    build_assignment_config, build_github_api_client_config, CliAssignArgs, CliGithubFlags,
};
use dispatch_core::{current_utc, ActionOutputWriter};
use dispatch_github_issues_runtime::{AssignmentOutcome, AssignmentRuntime, GithubApiClient};

use crate::trigger_detection::detect_trigger;

pub(crate) async fn run_assign_command(
    github: &CliGithubFlags,
    args: &CliAssignArgs,
    outputs: &ActionOutputWriter,
) -> Result<()> {
    let trigger = detect_trigger(&args.event_name, args.event_path.as_deref());
    let config = build_assignment_config(args, &github.workspace, trigger)?;
    let client = GithubApiClient::new(build_github_api_client_config(github, &args.agent_login)?)?;
    tracing::info!(
        repository = %client.repo().as_slug(),
        mode = %config.mode,
        dry_run = config.dry_run,
        "starting assignment run"
    );

    let outcome = AssignmentRuntime::new(&client, &config, current_utc())
        .run()
        .await?;
    tracing::info!(summary = %outcome.summary_line(), "assignment run finished");
    write_assignment_outputs(outputs, &outcome)
}

/// Issue outputs are written empty when the run picked no issue.
pub(crate) fn write_assignment_outputs(
    outputs: &ActionOutputWriter,
    outcome: &AssignmentOutcome,
) -> Result<()> {
    let (number, url) = match outcome.issue() {
        Some(issue) => (issue.number.to_string(), issue.url.clone()),
        None => (String::new(), String::new()),
    };
    let persisted = outputs
        .set_output("issue-number", &number)
        .context("failed to write issue-number output")?;
    outputs
        .set_output("issue-url", &url)
        .context("failed to write issue-url output")?;
    outputs
        .set_output("assignment-mode", outcome.effective_mode.as_str())
        .context("failed to write assignment-mode output")?;
    if !persisted {
        tracing::info!(
            issue_number = %number,
            issue_url = %url,
            assignment_mode = outcome.effective_mode.as_str(),
            "GITHUB_OUTPUT not set; outputs logged only"
        );
    }

    let mut summary = format!(
        "### Copilot dispatch\n\n- Mode: `{}`\n- Result: {}\n",
        outcome.effective_mode,
        outcome.summary_line()
    );
    if !url.is_empty() {
        summary.push_str(&format!("- Issue: {url}\n"));
    }
    outputs
        .append_summary(&summary)
        .context("failed to write job summary")?;
    Ok(())
}
