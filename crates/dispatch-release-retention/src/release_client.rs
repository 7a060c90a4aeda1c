use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dispatch_core::parse_rfc3339_utc;
use dispatch_github_issues::github_transport_helpers::{
    send_github_request, send_with_retry, GithubRetryPolicy,
};
use dispatch_github_issues::repo_ref::RepoRef;
use serde::Deserialize;

use crate::ReleaseRecord;

const RELEASES_PAGE_SIZE: usize = 100;
/// Tag deletes answering with these statuses found no ref to remove.
const MISSING_TAG_STATUSES: [u16; 2] = [404, 422];

/// Release listing and deletion surface used by the cleanup runtime.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn list_releases(&self) -> Result<Vec<ReleaseRecord>>;

    async fn delete_release(&self, release_id: u64) -> Result<()>;

    async fn delete_tag(&self, tag_name: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct GithubReleaseClientConfig {
    pub api_base: String,
    pub token: String,
    pub repo: RepoRef,
    pub request_timeout_ms: u64,
    pub retry: GithubRetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    id: u64,
    tag_name: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<GithubRelease> for ReleaseRecord {
    fn from(release: GithubRelease) -> Self {
        // Drafts have no publish time yet; their creation time stands in.
        let published_at = release
            .published_at
            .as_deref()
            .or(release.created_at.as_deref())
            .and_then(parse_rfc3339_utc);
        Self {
            id: release.id,
            tag_name: release.tag_name,
            published_at,
        }
    }
}

pub struct GithubReleaseClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry: GithubRetryPolicy,
}

impl GithubReleaseClient {
    pub fn new(config: GithubReleaseClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("copilot-dispatch-release-cleanup"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let mut auth_value =
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
                .context("invalid github authorization header")?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github release client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            repo: config.repo,
            retry: config.retry,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, suffix
        )
    }
}

#[async_trait]
impl ReleaseStore for GithubReleaseClient {
    async fn list_releases(&self) -> Result<Vec<ReleaseRecord>> {
        let url = self.repo_url("releases");
        let per_page = RELEASES_PAGE_SIZE.to_string();
        let mut releases = Vec::new();
        let mut page = 1_u32;
        loop {
            let page_value = page.to_string();
            let chunk = send_with_retry(&self.retry, "list releases", || {
                self.http.get(&url).query(&[
                    ("per_page", per_page.as_str()),
                    ("page", page_value.as_str()),
                ])
            })
            .await?
            .json::<Vec<GithubRelease>>()
            .await
            .context("failed to decode github release listing")?;
            let chunk_len = chunk.len();
            releases.extend(chunk.into_iter().map(ReleaseRecord::from));
            if chunk_len < RELEASES_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(releases)
    }

    async fn delete_release(&self, release_id: u64) -> Result<()> {
        let url = self.repo_url(&format!("releases/{release_id}"));
        send_with_retry(&self.retry, "delete release", || self.http.delete(&url)).await?;
        Ok(())
    }

    async fn delete_tag(&self, tag_name: &str) -> Result<()> {
        let url = self.repo_url(&format!("git/refs/tags/{tag_name}"));
        let response = send_github_request(
            &self.retry,
            "delete tag",
            &MISSING_TAG_STATUSES,
            || self.http.delete(&url),
        )
        .await?;
        if !response.status().is_success() {
            tracing::info!(
                tag = %tag_name,
                status = response.status().as_u16(),
                "tag already absent"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{GithubReleaseClient, GithubReleaseClientConfig, ReleaseStore};
    use dispatch_github_issues::github_transport_helpers::GithubRetryPolicy;
    use dispatch_github_issues::repo_ref::RepoRef;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client(base_url: &str) -> GithubReleaseClient {
        GithubReleaseClient::new(GithubReleaseClientConfig {
            api_base: base_url.to_string(),
            token: "test-token".to_string(),
            repo: RepoRef::parse("owner/repo").expect("repo"),
            request_timeout_ms: 2_000,
            retry: GithubRetryPolicy::new(2, 1),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn integration_list_releases_uses_created_at_for_drafts() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/owner/repo/releases")
                .query_param("page", "1")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!([
                { "id": 1, "tag_name": "v1.0.0", "published_at": "2026-01-01T00:00:00Z" },
                { "id": 2, "tag_name": "v1.1.0", "published_at": null, "created_at": "2026-02-01T00:00:00Z", "draft": true }
            ]));
        });

        let releases = test_client(&server.base_url())
            .list_releases()
            .await
            .expect("releases");

        listing.assert();
        assert_eq!(releases.len(), 2);
        assert_eq!(
            releases[1].published_at.map(|at| at.to_rfc3339()),
            Some("2026-02-01T00:00:00+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn integration_delete_release_and_tag_hit_expected_endpoints() {
        let server = MockServer::start();
        let release = server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/releases/42");
            then.status(204);
        });
        let tag = server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/git/refs/tags/v1.0.0");
            then.status(204);
        });

        let client = test_client(&server.base_url());
        client.delete_release(42).await.expect("delete release");
        client.delete_tag("v1.0.0").await.expect("delete tag");

        release.assert();
        tag.assert();
    }

    #[tokio::test]
    async fn regression_delete_tag_treats_missing_ref_as_deleted() {
        let server = MockServer::start();
        let not_found = server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/git/refs/tags/v1.0.0");
            then.status(404).body("{\"message\":\"Not Found\"}");
        });
        let unprocessable = server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/git/refs/tags/v1.1.0");
            then.status(422).body("{\"message\":\"Reference does not exist\"}");
        });

        let client = test_client(&server.base_url());
        client.delete_tag("v1.0.0").await.expect("404 tag delete");
        client.delete_tag("v1.1.0").await.expect("422 tag delete");

        not_found.assert_calls(1);
        unprocessable.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_delete_tag_still_fails_on_server_error() {
        let server = MockServer::start();
        let tag = server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/git/refs/tags/v2.0.0");
            then.status(500).body("boom");
        });

        let error = test_client(&server.base_url())
            .delete_tag("v2.0.0")
            .await
            .expect_err("500 should fail");

        tag.assert_calls(2);
        assert!(error.to_string().contains("status 500"));
    }

    #[tokio::test]
    async fn regression_delete_release_reports_failure_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/repos/owner/repo/releases/7");
            then.status(403).body("{\"message\":\"Resource not accessible\"}");
        });

        let error = test_client(&server.base_url())
            .delete_release(7)
            .await
            .expect_err("403 should fail");

        assert!(error.to_string().contains("status 403"));
        assert!(error.to_string().contains("Resource not accessible"));
    }
}
