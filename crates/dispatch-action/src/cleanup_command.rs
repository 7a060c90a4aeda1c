use anyhow::{Context, Result};
use dispatch_cli::{
    build_release_cleanup_config, build_release_client_config, CliCleanupReleasesArgs,
    CliGithubFlags,
};
use dispatch_core::{current_utc, ActionOutputWriter};
use dispatch_release_retention::{run_release_cleanup, GithubReleaseClient, ReleaseCleanupReport};

pub(crate) async fn run_cleanup_releases_command(
    github: &CliGithubFlags,
    args: &CliCleanupReleasesArgs,
    outputs: &ActionOutputWriter,
) -> Result<()> {
    let config = build_release_cleanup_config(args);
    let client = GithubReleaseClient::new(build_release_client_config(github)?)?;
    let report = run_release_cleanup(&client, config, current_utc()).await?;
    tracing::info!(summary = %report.summary_line(), "release cleanup finished");
    write_cleanup_outputs(outputs, &report)
}

pub(crate) fn write_cleanup_outputs(
    outputs: &ActionOutputWriter,
    report: &ReleaseCleanupReport,
) -> Result<()> {
    outputs
        .set_output("deleted-count", &report.deleted_count().to_string())
        .context("failed to write deleted-count output")?;
    outputs
        .set_output("deleted-tags", &report.deleted_tags.join(","))
        .context("failed to write deleted-tags output")?;
    outputs
        .set_output("retained-count", &report.retained_count().to_string())
        .context("failed to write retained-count output")?;

    let mut summary = format!("### Release cleanup\n\n{}\n", report.summary_line());
    if !report.deleted_tags.is_empty() {
        summary.push('\n');
        for tag in &report.deleted_tags {
            summary.push_str(&format!("- `{tag}`\n"));
        }
    }
    outputs
        .append_summary(&summary)
        .context("failed to write job summary")?;
    Ok(())
}
