//! Release retention for the dispatch action.
//!
//! Parses `vMAJOR.MINOR.PATCH` release tags, decides which releases survive the
//! keep-N-per-major policy with its age floor, and drives deletion of the rest
//! through the GitHub releases API.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Months, Utc};
use regex::Regex;

pub mod cleanup_runtime;
pub mod release_client;

pub use cleanup_runtime::{run_release_cleanup, ReleaseCleanupConfig, ReleaseCleanupReport};
pub use release_client::{GithubReleaseClient, GithubReleaseClientConfig, ReleaseStore};

/// Releases kept per major, highest major first. Majors beyond this list are dropped.
pub const RELEASES_KEPT_PER_MAJOR: [usize; 3] = [5, 3, 2];
/// Older majors only keep releases younger than this.
pub const OLDER_MAJOR_MAX_AGE_MONTHS: u32 = 6;
/// Releases younger than this are always kept.
pub const RECENT_RELEASE_FLOOR_MONTHS: u32 = 1;

const RELEASE_TAG_PATTERN: &str = r"^v(\d+)\.(\d+)\.(\d+)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Semantic version triple; ordering is numeric, field by field.
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl std::fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub id: u64,
    pub tag_name: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl ReleaseRecord {
    pub fn version(&self) -> Option<ReleaseVersion> {
        parse_release_tag(&self.tag_name)
    }
}

fn release_tag_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(RELEASE_TAG_PATTERN).ok())
        .as_ref()
}

/// Parses `vMAJOR.MINOR.PATCH`; anything else (pre-release suffixes included) is `None`.
pub fn parse_release_tag(tag: &str) -> Option<ReleaseVersion> {
    let captures = release_tag_regex()?.captures(tag.trim())?;
    let segment = |index: usize| captures.get(index)?.as_str().parse::<u64>().ok();
    Some(ReleaseVersion {
        major: segment(1)?,
        minor: segment(2)?,
        patch: segment(3)?,
    })
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn is_published_after(release: &ReleaseRecord, cutoff: DateTime<Utc>) -> bool {
    release
        .published_at
        .is_some_and(|published_at| published_at > cutoff)
}

/// Returns the releases that survive retention, highest version first.
///
/// Invalid tags never appear in the result. Releases without a publish time are
/// treated as old: they are kept only by rank within the highest major.
pub fn filter_retained_releases(
    releases: &[ReleaseRecord],
    now: DateTime<Utc>,
) -> Vec<ReleaseRecord> {
    let floor_cutoff = months_before(now, RECENT_RELEASE_FLOOR_MONTHS);
    let older_major_cutoff = months_before(now, OLDER_MAJOR_MAX_AGE_MONTHS);

    let mut by_major: BTreeMap<u64, Vec<(ReleaseVersion, &ReleaseRecord)>> = BTreeMap::new();
    for release in releases {
        if let Some(version) = release.version() {
            by_major
                .entry(version.major)
                .or_default()
                .push((version, release));
        }
    }

    let mut retained: Vec<(ReleaseVersion, &ReleaseRecord)> = Vec::new();
    for (rank, (_, mut group)) in by_major.into_iter().rev().enumerate() {
        group.sort_by(|left, right| right.0.cmp(&left.0));
        let keep = RELEASES_KEPT_PER_MAJOR.get(rank).copied().unwrap_or(0);
        for (position, (version, release)) in group.into_iter().enumerate() {
            let ranked_in = position < keep
                && (rank == 0 || is_published_after(release, older_major_cutoff));
            if ranked_in || is_published_after(release, floor_cutoff) {
                retained.push((version, release));
            }
        }
    }

    retained.sort_by(|left, right| right.0.cmp(&left.0));
    retained
        .into_iter()
        .map(|(_, release)| release.clone())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Partition of a release listing into kept, deletable and ignored entries.
pub struct RetentionPlan {
    pub retained: Vec<ReleaseRecord>,
    pub deletable: Vec<ReleaseRecord>,
    pub invalid_tags: Vec<String>,
}

pub fn plan_retention(releases: &[ReleaseRecord], now: DateTime<Utc>) -> RetentionPlan {
    let retained = filter_retained_releases(releases, now);
    let mut plan = RetentionPlan::default();
    for release in releases {
        if release.version().is_none() {
            plan.invalid_tags.push(release.tag_name.clone());
        } else if !retained.iter().any(|kept| kept.id == release.id) {
            plan.deletable.push(release.clone());
        }
    }
    plan.retained = retained;
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-15T00:00:00Z")
            .expect("fixed now")
            .with_timezone(&Utc)
    }

    fn release(id: u64, tag: &str, age_days: i64) -> ReleaseRecord {
        ReleaseRecord {
            id,
            tag_name: tag.to_string(),
            published_at: Some(fixed_now() - Duration::days(age_days)),
        }
    }

    fn tags(releases: &[ReleaseRecord]) -> Vec<&str> {
        releases
            .iter()
            .map(|release| release.tag_name.as_str())
            .collect()
    }

    #[test]
    fn unit_parse_release_tag_accepts_only_plain_semver_tags() {
        assert_eq!(
            parse_release_tag("v1.20.3"),
            Some(ReleaseVersion {
                major: 1,
                minor: 20,
                patch: 3
            })
        );
        assert_eq!(parse_release_tag("1.2.3"), None);
        assert_eq!(parse_release_tag("v1.2"), None);
        assert_eq!(parse_release_tag("v1.2.3-beta.1"), None);
        assert_eq!(parse_release_tag("release-2026"), None);
    }

    #[test]
    fn unit_release_versions_order_numerically_not_lexically() {
        let low = parse_release_tag("v1.9.0").expect("low");
        let high = parse_release_tag("v1.10.0").expect("high");
        assert!(high > low);
        assert_eq!(high.to_string(), "v1.10.0");
    }

    #[test]
    fn functional_highest_major_keeps_five_newest_regardless_of_age() {
        let releases = (0..7)
            .map(|patch| release(patch, &format!("v4.0.{patch}"), 400))
            .collect::<Vec<_>>();

        let retained = filter_retained_releases(&releases, fixed_now());

        assert_eq!(
            tags(&retained),
            vec!["v4.0.6", "v4.0.5", "v4.0.4", "v4.0.3", "v4.0.2"]
        );
    }

    #[test]
    fn functional_older_majors_keep_young_releases_only() {
        let releases = vec![
            release(1, "v4.0.0", 10),
            release(2, "v3.1.0", 60),
            release(3, "v3.0.7", 150),
            release(4, "v2.3.0", 240),
            release(5, "v2.2.0", 20),
        ];

        let retained = filter_retained_releases(&releases, fixed_now());

        assert_eq!(tags(&retained), vec!["v4.0.0", "v3.1.0", "v3.0.7", "v2.2.0"]);
    }

    #[test]
    fn functional_second_major_scenario_drops_release_past_six_months() {
        let releases = vec![
            release(1, "v4.2.0", 5),
            release(2, "v3.1.0", 61),
            release(3, "v3.0.7", 152),
            release(4, "v2.3.0", 243),
        ];

        let retained = filter_retained_releases(&releases, fixed_now());

        assert!(tags(&retained).contains(&"v3.1.0"));
        assert!(tags(&retained).contains(&"v3.0.7"));
        assert!(!tags(&retained).contains(&"v2.3.0"));
    }

    #[test]
    fn functional_latest_major_keeps_older_minor_while_aged_second_major_goes() {
        let releases = vec![
            release(1, "v3.1.0", 61),
            release(2, "v3.0.7", 152),
            release(3, "v2.3.0", 243),
        ];

        let plan = plan_retention(&releases, fixed_now());

        assert_eq!(tags(&plan.retained), vec!["v3.1.0", "v3.0.7"]);
        assert_eq!(tags(&plan.deletable), vec!["v2.3.0"]);
        assert!(plan.invalid_tags.is_empty());
    }

    #[test]
    fn functional_majors_beyond_third_are_dropped_unless_recent() {
        let releases = vec![
            release(1, "v5.0.0", 100),
            release(2, "v4.0.0", 100),
            release(3, "v3.0.0", 100),
            release(4, "v2.0.0", 100),
            release(5, "v1.0.0", 3),
        ];

        let retained = filter_retained_releases(&releases, fixed_now());

        assert_eq!(
            tags(&retained),
            vec!["v5.0.0", "v4.0.0", "v3.0.0", "v1.0.0"]
        );
    }

    #[test]
    fn regression_invalid_tags_are_neither_retained_nor_deletable() {
        let releases = vec![
            release(1, "v1.0.0", 400),
            release(2, "nightly", 1),
            release(3, "v1.0.0-rc.1", 1),
        ];

        let plan = plan_retention(&releases, fixed_now());

        assert_eq!(tags(&plan.retained), vec!["v1.0.0"]);
        assert!(plan.deletable.is_empty());
        assert_eq!(plan.invalid_tags, vec!["nightly", "v1.0.0-rc.1"]);
    }

    #[test]
    fn regression_plan_retention_lists_dropped_valid_releases() {
        let releases = vec![
            release(1, "v3.0.0", 5),
            release(2, "v2.0.0", 300),
        ];

        let plan = plan_retention(&releases, fixed_now());

        assert_eq!(tags(&plan.retained), vec!["v3.0.0"]);
        assert_eq!(tags(&plan.deletable), vec!["v2.0.0"]);
    }

    fn arbitrary_releases() -> impl Strategy<Value = Vec<ReleaseRecord>> {
        prop::collection::vec((0u64..6, 0u64..4, 0u64..4, 0i64..400), 0..30).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, (major, minor, patch, age_days))| {
                        release(
                            index as u64,
                            &format!("v{major}.{minor}.{patch}"),
                            age_days,
                        )
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn unit_filter_retained_releases_is_idempotent(releases in arbitrary_releases()) {
            let once = filter_retained_releases(&releases, fixed_now());
            let twice = filter_retained_releases(&once, fixed_now());
            let once_ids = once.iter().map(|release| release.id).collect::<Vec<_>>();
            let twice_ids = twice.iter().map(|release| release.id).collect::<Vec<_>>();
            prop_assert_eq!(once_ids, twice_ids);
        }

        #[test]
        fn unit_releases_younger_than_a_month_are_always_retained(releases in arbitrary_releases()) {
            let retained = filter_retained_releases(&releases, fixed_now());
            for release in &releases {
                if release.published_at.is_some_and(|at| at > months_before(fixed_now(), 1)) {
                    prop_assert!(retained.iter().any(|kept| kept.id == release.id));
                }
            }
        }
    }
}
