use chrono::{DateTime, Utc};
use dispatch_github_issues::github_transport_helpers::GithubRetryPolicy;
use dispatch_github_issues::refactor_cadence::AssignmentMode;
use dispatch_github_issues::repo_ref::RepoRef;
use dispatch_github_issues::trigger_event::TriggerEvent;
use dispatch_github_issues_runtime::{
    AssignmentAction, AssignmentConfig, AssignmentRuntime, GithubApiClient, GithubApiClientConfig,
};
use dispatch_release_retention::{
    run_release_cleanup, GithubReleaseClient, GithubReleaseClientConfig, ReleaseCleanupConfig,
};
use httpmock::prelude::*;
use serde_json::{json, Value};

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-15T12:00:00Z")
        .expect("fixed now")
        .with_timezone(&Utc)
}

fn issue_client(base_url: &str) -> GithubApiClient {
    GithubApiClient::new(GithubApiClientConfig {
        api_base: base_url.to_string(),
        token: "integration-token".to_string(),
        repo: RepoRef::parse("owner/repo").expect("repo"),
        agent_login: "copilot-swe-agent".to_string(),
        request_timeout_ms: 5_000,
        retry: GithubRetryPolicy::new(1, 1),
    })
    .expect("issue client")
}

fn issues_page(nodes: Vec<Value>) -> Value {
    json!({
        "data": { "repository": { "issues": {
            "nodes": nodes,
            "pageInfo": { "hasNextPage": false, "endCursor": null }
        }}}
    })
}

fn open_issue_node(number: u64, label: &str, assignee: Option<&str>) -> Value {
    let assignees = assignee
        .map(|id| vec![json!({ "id": id, "login": "someone" })])
        .unwrap_or_default();
    json!({
        "id": format!("I_{number}"),
        "number": number,
        "title": format!("Issue {number}"),
        "url": format!("https://github.com/owner/repo/issues/{number}"),
        "createdAt": "2026-05-01T00:00:00Z",
        "assignees": { "nodes": assignees },
        "labels": { "nodes": [{ "name": label }] },
        "subIssues": { "totalCount": 0 },
        "trackedInIssues": { "totalCount": 0 }
    })
}

fn mock_agent_identity(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("suggestedActors");
        then.status(200).json_body(json!({
            "data": { "repository": { "suggestedActors": { "nodes": [
                { "login": "copilot-swe-agent", "id": "BOT_copilot" }
            ]}}}
        }));
    });
}

#[tokio::test]
async fn integration_issue_closed_run_switches_to_refactor_and_creates_issue() {
    let server = MockServer::start();
    let closed = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/owner/repo/issues")
            .query_param("state", "closed")
            .query_param("per_page", "100");
        then.status(200).json_body(json!([
            { "number": 50, "title": "Crash", "closed_at": "2026-06-15T11:00:00Z", "labels": [{"name": "bug"}] },
            { "number": 49, "title": "Docs", "closed_at": "2026-06-14T00:00:00Z", "labels": [{"name": "documentation"}] },
            { "number": 48, "title": "Feature", "closed_at": "2026-06-13T00:00:00Z", "labels": [{"name": "enhancement"}] },
            { "number": 47, "title": "Crash 2", "closed_at": "2026-06-12T00:00:00Z", "labels": [{"name": "bug"}] },
            { "number": 46, "title": "[AUTO] Refactor: codebase housekeeping (2026-06-10 00:00:00 UTC)", "closed_at": "2026-06-11T00:00:00Z", "labels": [{"name": "refactor"}] }
        ]));
    });
    mock_agent_identity(&server);
    let all_open = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("\"labels\":null");
        then.status(200)
            .json_body(issues_page(vec![open_issue_node(10, "bug", Some("U_other"))]));
    });
    let refactor_bucket = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("\"labels\":[\"refactor\"]");
        then.status(200).json_body(issues_page(Vec::new()));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("repository(owner: $owner, name: $name) { id }");
        then.status(200)
            .json_body(json!({ "data": { "repository": { "id": "R_repo" } } }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("createIssue")
            .body_includes("[AUTO] Refactor: codebase housekeeping (2026-06-15 12:00:00 UTC)")
            .body_includes("\"assigneeIds\":[\"BOT_copilot\"]");
        then.status(200).json_body(json!({
            "data": { "createIssue": { "issue": {
                "id": "I_77",
                "number": 77,
                "title": "[AUTO] Refactor: codebase housekeeping (2026-06-15 12:00:00 UTC)",
                "url": "https://github.com/owner/repo/issues/77"
            }}}
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("label(name: $label)");
        then.status(200).json_body(json!({
            "data": { "repository": { "label": { "id": "LA_refactor" } } }
        }));
    });
    let add_labels = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("addLabelsToLabelable")
            .body_includes("\"labelIds\":[\"LA_refactor\"]");
        then.status(200)
            .json_body(json!({ "data": { "addLabelsToLabelable": { "clientMutationId": null } } }));
    });

    let client = issue_client(&server.base_url());
    let config = AssignmentConfig {
        trigger: TriggerEvent::IssueClosed,
        refactor_threshold: 4,
        refactor_cooldown_days: 7,
        ..AssignmentConfig::default()
    };
    let outcome = AssignmentRuntime::new(&client, &config, fixed_now())
        .run()
        .await
        .expect("assignment run");

    closed.assert();
    all_open.assert();
    refactor_bucket.assert();
    create.assert();
    add_labels.assert();
    assert_eq!(outcome.effective_mode, AssignmentMode::Refactor);
    assert!(matches!(outcome.action, AssignmentAction::Created { .. }));
    assert_eq!(outcome.issue().map(|issue| issue.number), Some(77));
}

#[tokio::test]
async fn integration_scheduled_run_assigns_oldest_bug() {
    let server = MockServer::start();
    mock_agent_identity(&server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("\"labels\":null");
        then.status(200).json_body(issues_page(Vec::new()));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("\"labels\":[\"bug\"]");
        then.status(200)
            .json_body(issues_page(vec![open_issue_node(5, "bug", None)]));
    });
    let sub_issues = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/5/sub_issues");
        then.status(200).json_body(json!([]));
    });
    let assign = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("addAssigneesToAssignable")
            .body_includes("\"assignableId\":\"I_5\"")
            .body_includes("\"assigneeIds\":[\"BOT_copilot\"]");
        then.status(200).json_body(json!({
            "data": { "addAssigneesToAssignable": { "clientMutationId": null } }
        }));
    });

    let client = issue_client(&server.base_url());
    let config = AssignmentConfig {
        trigger: TriggerEvent::Schedule,
        ..AssignmentConfig::default()
    };
    let outcome = AssignmentRuntime::new(&client, &config, fixed_now())
        .run()
        .await
        .expect("assignment run");

    sub_issues.assert();
    assign.assert();
    assert_eq!(outcome.effective_mode, AssignmentMode::Auto);
    assert!(matches!(outcome.action, AssignmentAction::Assigned { .. }));
    assert_eq!(
        outcome.issue().map(|issue| issue.url.as_str()),
        Some("https://github.com/owner/repo/issues/5")
    );
}

#[tokio::test]
async fn integration_release_cleanup_deletes_stale_releases_and_tags() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/releases");
        then.status(200).json_body(json!([
            { "id": 3, "tag_name": "v3.1.0", "published_at": "2026-04-15T00:00:00Z" },
            { "id": 2, "tag_name": "v2.3.0", "published_at": "2025-10-15T00:00:00Z" },
            { "id": 1, "tag_name": "v3.0.7", "published_at": "2026-01-15T00:00:00Z" }
        ]));
    });
    let delete_release = server.mock(|when, then| {
        when.method(DELETE).path("/repos/owner/repo/releases/2");
        then.status(204);
    });
    let delete_tag = server.mock(|when, then| {
        when.method(DELETE).path("/repos/owner/repo/git/refs/tags/v2.3.0");
        then.status(204);
    });

    let client = GithubReleaseClient::new(GithubReleaseClientConfig {
        api_base: server.base_url(),
        token: "integration-token".to_string(),
        repo: RepoRef::parse("owner/repo").expect("repo"),
        request_timeout_ms: 5_000,
        retry: GithubRetryPolicy::new(1, 1),
    })
    .expect("release client");
    let report = run_release_cleanup(
        &client,
        ReleaseCleanupConfig {
            delete_tags: true,
            dry_run: false,
        },
        fixed_now(),
    )
    .await
    .expect("cleanup");

    delete_release.assert();
    delete_tag.assert();
    assert_eq!(report.retained_tags, vec!["v3.1.0", "v3.0.7"]);
    assert_eq!(report.deleted_tags, vec!["v2.3.0"]);
}
