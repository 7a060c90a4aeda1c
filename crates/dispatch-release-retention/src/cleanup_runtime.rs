use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::release_client::ReleaseStore;
use crate::plan_retention;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseCleanupConfig {
    pub delete_tags: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// What a cleanup run kept and removed. In dry-run mode `deleted_tags` lists what
/// would have been removed.
pub struct ReleaseCleanupReport {
    pub retained_tags: Vec<String>,
    pub deleted_tags: Vec<String>,
    pub ignored_tags: Vec<String>,
    pub dry_run: bool,
}

impl ReleaseCleanupReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted_tags.len()
    }

    pub fn retained_count(&self) -> usize {
        self.retained_tags.len()
    }

    pub fn summary_line(&self) -> String {
        let verb = if self.dry_run { "would delete" } else { "deleted" };
        format!(
            "Release cleanup {verb} {} release(s), retained {}",
            self.deleted_count(),
            self.retained_count()
        )
    }
}

/// Lists every release, applies retention at `now` and deletes the rest.
///
/// The first failed deletion aborts the run; releases deleted before it stay deleted.
pub async fn run_release_cleanup(
    store: &dyn ReleaseStore,
    config: ReleaseCleanupConfig,
    now: DateTime<Utc>,
) -> Result<ReleaseCleanupReport> {
    let releases = store
        .list_releases()
        .await
        .context("failed to list releases")?;
    let plan = plan_retention(&releases, now);
    tracing::info!(
        total = releases.len(),
        retained = plan.retained.len(),
        deletable = plan.deletable.len(),
        ignored = plan.invalid_tags.len(),
        dry_run = config.dry_run,
        "planned release cleanup"
    );
    for tag in &plan.invalid_tags {
        tracing::debug!(tag = %tag, "ignoring release with non-semver tag");
    }

    let mut deleted_tags = Vec::with_capacity(plan.deletable.len());
    for release in &plan.deletable {
        if config.dry_run {
            tracing::info!(tag = %release.tag_name, "dry run: would delete release");
        } else {
            store
                .delete_release(release.id)
                .await
                .with_context(|| format!("failed to delete release {}", release.tag_name))?;
            if config.delete_tags {
                store
                    .delete_tag(&release.tag_name)
                    .await
                    .with_context(|| format!("failed to delete tag {}", release.tag_name))?;
            }
            tracing::info!(tag = %release.tag_name, "deleted release");
        }
        deleted_tags.push(release.tag_name.clone());
    }

    Ok(ReleaseCleanupReport {
        retained_tags: plan
            .retained
            .into_iter()
            .map(|release| release.tag_name)
            .collect(),
        deleted_tags,
        ignored_tags: plan.invalid_tags,
        dry_run: config.dry_run,
    })
}
