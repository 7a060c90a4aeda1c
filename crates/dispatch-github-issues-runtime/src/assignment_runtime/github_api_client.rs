use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use dispatch_github_issues::github_transport_helpers::{
    send_with_retry, truncate_for_error, GithubRetryPolicy,
};
use dispatch_github_issues::issue_model::{
    ClosedIssue, GraphqlConnection, GraphqlIssueNode, Issue, RestIssue,
};
use dispatch_github_issues::repo_ref::RepoRef;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::issue_tracker::{AgentIdentity, CreatedIssue, IssueTracker};

const REST_PAGE_SIZE: usize = 100;
/// Closed-issue listings stop here even when pull requests crowd out the issues.
const MAX_CLOSED_ISSUE_PAGES: u32 = 5;
const USER_AGENT: &str = "copilot-dispatch";

const AGENT_IDENTITY_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    suggestedActors(capabilities: [CAN_BE_ASSIGNED], first: 100) {
      nodes {
        login
        ... on Bot { id }
        ... on User { id }
      }
    }
  }
}"#;

const OPEN_ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $labels: [String!], $after: String) {
  repository(owner: $owner, name: $name) {
    issues(first: 100, after: $after, states: [OPEN], labels: $labels, orderBy: {field: CREATED_AT, direction: ASC}) {
      nodes {
        id
        number
        title
        url
        createdAt
        assignees: assignedActors(first: 20) {
          nodes {
            ... on Bot { id login }
            ... on User { id login }
          }
        }
        labels(first: 50) { nodes { name } }
        subIssues { totalCount }
        trackedInIssues { totalCount }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

const REPOSITORY_ID_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) { id }
}"#;

const LABEL_ID_QUERY: &str = r#"
query($owner: String!, $name: String!, $label: String!) {
  repository(owner: $owner, name: $name) {
    label(name: $label) { id }
  }
}"#;

const ADD_ASSIGNEES_MUTATION: &str = r#"
mutation($assignableId: ID!, $assigneeIds: [ID!]!) {
  addAssigneesToAssignable(input: {assignableId: $assignableId, assigneeIds: $assigneeIds}) {
    clientMutationId
  }
}"#;

const CREATE_ISSUE_MUTATION: &str = r#"
mutation($repositoryId: ID!, $title: String!, $body: String!, $assigneeIds: [ID!]) {
  createIssue(input: {repositoryId: $repositoryId, title: $title, body: $body, assigneeIds: $assigneeIds}) {
    issue { id number title url }
  }
}"#;

const ADD_LABELS_MUTATION: &str = r#"
mutation($labelableId: ID!, $labelIds: [ID!]!) {
  addLabelsToLabelable(input: {labelableId: $labelableId, labelIds: $labelIds}) {
    clientMutationId
  }
}"#;

#[derive(Debug, Clone)]
/// Connection settings for [`GithubApiClient`].
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub repo: RepoRef,
    pub agent_login: String,
    pub request_timeout_ms: u64,
    pub retry: GithubRetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedActorsRepository {
    suggested_actors: GraphqlConnection<SuggestedActorNode>,
}

#[derive(Debug, Deserialize)]
struct SuggestedActorNode {
    login: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuePage {
    nodes: Vec<GraphqlIssueNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct IssuesRepository {
    issues: IssuePage,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LabelRepository {
    label: Option<IdNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIssueData {
    create_issue: Option<CreateIssuePayload>,
}

#[derive(Debug, Deserialize)]
struct CreateIssuePayload {
    issue: Option<CreatedIssueNode>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssueNode {
    id: String,
    number: u64,
    title: String,
    url: String,
}

/// GitHub REST + GraphQL client scoped to one repository.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    graphql_url: String,
    repo: RepoRef,
    agent_login: String,
    retry: GithubRetryPolicy,
    repository_id: OnceCell<String>,
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .context("invalid github authorization header")?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        let api_base = config.api_base.trim().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            graphql_url: graphql_url_for(&api_base),
            api_base,
            repo: config.repo,
            agent_login: config.agent_login.trim().to_string(),
            retry: config.retry,
            repository_id: OnceCell::new(),
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    async fn repository_id(&self) -> Result<&str> {
        let id = self
            .repository_id
            .get_or_try_init(|| async {
                let data: RepositoryData<IdNode> = self
                    .graphql("resolve repository id", REPOSITORY_ID_QUERY, self.repo_variables())
                    .await?;
                data.repository
                    .map(|repository| repository.id)
                    .ok_or_else(|| anyhow!("repository {} not found", self.repo.as_slug()))
            })
            .await?;
        Ok(id.as_str())
    }

    fn repo_variables(&self) -> Value {
        json!({ "owner": self.repo.owner, "name": self.repo.name })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        let payload = json!({ "query": query, "variables": variables });
        let envelope: GraphqlEnvelope<T> = self
            .request_json(operation, || self.http.post(&self.graphql_url).json(&payload))
            .await?;
        if !envelope.errors.is_empty() {
            let messages = envelope
                .errors
                .iter()
                .map(|error| error.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            bail!(
                "github graphql {operation} failed: {}",
                truncate_for_error(&messages, 800)
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("github graphql {operation} returned no data"))
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = send_with_retry(&self.retry, operation, request_builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }
}

#[async_trait]
impl IssueTracker for GithubApiClient {
    async fn resolve_agent_identity(&self) -> Result<AgentIdentity> {
        let data: RepositoryData<SuggestedActorsRepository> = self
            .graphql(
                "resolve coding agent",
                AGENT_IDENTITY_QUERY,
                self.repo_variables(),
            )
            .await?;
        let actors = data
            .repository
            .ok_or_else(|| anyhow!("repository {} not found", self.repo.as_slug()))?
            .suggested_actors
            .nodes;
        actors
            .into_iter()
            .find(|actor| actor.login.eq_ignore_ascii_case(&self.agent_login))
            .and_then(|actor| {
                actor.id.map(|id| AgentIdentity {
                    id,
                    login: actor.login,
                })
            })
            .ok_or_else(|| {
                anyhow!(
                    "coding agent '{}' is not an assignable actor in {}; is the Copilot coding agent enabled for this repository?",
                    self.agent_login,
                    self.repo.as_slug()
                )
            })
    }

    async fn list_open_issues(&self, label: Option<&str>) -> Result<Vec<Issue>> {
        let labels = label.map(|label| vec![label.to_string()]);
        let mut after: Option<String> = None;
        let mut issues = Vec::new();
        loop {
            let variables = json!({
                "owner": self.repo.owner,
                "name": self.repo.name,
                "labels": labels,
                "after": after,
            });
            let data: RepositoryData<IssuesRepository> = self
                .graphql("list open issues", OPEN_ISSUES_QUERY, variables)
                .await?;
            let page = data
                .repository
                .ok_or_else(|| anyhow!("repository {} not found", self.repo.as_slug()))?
                .issues;
            issues.extend(page.nodes.into_iter().map(Issue::from));
            match (page.page_info.has_next_page, page.page_info.end_cursor) {
                (true, Some(cursor)) => after = Some(cursor),
                _ => break,
            }
        }
        Ok(issues)
    }

    async fn list_recently_closed_issues(&self, limit: usize) -> Result<Vec<ClosedIssue>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let per_page = REST_PAGE_SIZE.to_string();
        let url = format!(
            "{}/repos/{}/{}/issues",
            self.api_base, self.repo.owner, self.repo.name
        );
        let mut issues: Vec<ClosedIssue> = Vec::new();
        for page in 1..=MAX_CLOSED_ISSUE_PAGES {
            let page_value = page.to_string();
            let chunk: Vec<RestIssue> = self
                .request_json("list closed issues", || {
                    self.http.get(&url).query(&[
                        ("state", "closed"),
                        ("sort", "updated"),
                        ("direction", "desc"),
                        ("per_page", per_page.as_str()),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            issues.extend(
                chunk
                    .into_iter()
                    .filter(|issue| !issue.is_pull_request())
                    .map(ClosedIssue::from),
            );
            if issues.len() >= limit || chunk_len < REST_PAGE_SIZE {
                break;
            }
            if page == MAX_CLOSED_ISSUE_PAGES {
                tracing::warn!(
                    pages = MAX_CLOSED_ISSUE_PAGES,
                    found = issues.len(),
                    limit,
                    "closed issue listing hit the page cap"
                );
            }
        }
        issues.sort_by(|left, right| right.closed_at.cmp(&left.closed_at));
        issues.truncate(limit);
        Ok(issues)
    }

    async fn sub_issue_count(&self, issue_number: u64) -> Result<u64> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/sub_issues",
            self.api_base, self.repo.owner, self.repo.name, issue_number
        );
        let mut page = 1_u32;
        let mut count = 0_u64;
        loop {
            let page_value = page.to_string();
            let chunk: Vec<Value> = self
                .request_json("list sub-issues", || {
                    self.http.get(&url).query(&[
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            count = count.saturating_add(chunk.len() as u64);
            if chunk.len() < REST_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(count)
    }

    async fn find_label_id(&self, name: &str) -> Result<Option<String>> {
        let variables = json!({
            "owner": self.repo.owner,
            "name": self.repo.name,
            "label": name,
        });
        let data: RepositoryData<LabelRepository> = self
            .graphql("look up label", LABEL_ID_QUERY, variables)
            .await?;
        Ok(data
            .repository
            .and_then(|repository| repository.label)
            .map(|label| label.id))
    }

    async fn add_assignees(&self, issue_id: &str, actor_ids: &[String]) -> Result<()> {
        let variables = json!({ "assignableId": issue_id, "assigneeIds": actor_ids });
        let _: Value = self
            .graphql("add assignees", ADD_ASSIGNEES_MUTATION, variables)
            .await?;
        Ok(())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignee_ids: &[String],
    ) -> Result<CreatedIssue> {
        let repository_id = self.repository_id().await?;
        let variables = json!({
            "repositoryId": repository_id,
            "title": title,
            "body": body,
            "assigneeIds": assignee_ids,
        });
        let data: CreateIssueData = self
            .graphql("create issue", CREATE_ISSUE_MUTATION, variables)
            .await?;
        let node = data
            .create_issue
            .and_then(|payload| payload.issue)
            .ok_or_else(|| anyhow!("github graphql create issue returned no issue"))?;
        Ok(CreatedIssue {
            id: node.id,
            number: node.number,
            title: node.title,
            url: node.url,
        })
    }

    async fn add_labels(&self, issue_id: &str, label_ids: &[String]) -> Result<()> {
        let variables = json!({ "labelableId": issue_id, "labelIds": label_ids });
        let _: Value = self
            .graphql("add labels", ADD_LABELS_MUTATION, variables)
            .await?;
        Ok(())
    }
}

/// `https://api.github.com` -> `/graphql`; GHES `https://host/api/v3` -> `/api/graphql`.
fn graphql_url_for(api_base: &str) -> String {
    match api_base.strip_suffix("/api/v3") {
        Some(host) => format!("{host}/api/graphql"),
        None => format!("{api_base}/graphql"),
    }
}
