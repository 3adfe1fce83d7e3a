use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::types::{
    CheckState, GraphQlError, GraphQlResponse, LatestCommit, PullRequestSummary, Section,
    SectionKind,
};

const GITHUB_GRAPHQL: &str = "https://api.github.com/graphql";
const SEARCH_PAGE_SIZE: usize = 50;
const RECENTLY_CLOSED_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct GraphQlPullRequestCommits {
    nodes: Vec<GraphQlPullRequestCommit>,
}

#[derive(Debug, Deserialize)]
struct GraphQlPullRequestCommit {
    commit: Option<GraphQlCommit>,
}

#[derive(Debug, Deserialize)]
struct GraphQlCommit {
    #[serde(rename = "statusCheckRollup")]
    status_check_rollup: Option<GraphQlStatusCheckRollup>,
}

#[derive(Debug, Deserialize)]
struct GraphQlStatusCheckRollup {
    state: Option<CheckState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRepository {
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlPullRequest {
    id: String,
    number: u64,
    title: String,
    permalink: String,
    repository: GraphQlRepository,
    commits: Option<GraphQlPullRequestCommits>,
}

#[derive(Debug, Deserialize)]
struct GraphQlSearchConnection {
    nodes: Vec<Option<GraphQlPullRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyPullRequestsData {
    open: GraphQlSearchConnection,
    assigned: GraphQlSearchConnection,
    mentioned: GraphQlSearchConnection,
    review_requests: GraphQlSearchConnection,
    reviewed: GraphQlSearchConnection,
    recently_closed: GraphQlSearchConnection,
}

impl MyPullRequestsData {
    fn into_connections(self) -> Vec<(SectionKind, GraphQlSearchConnection)> {
        vec![
            (SectionKind::Open, self.open),
            (SectionKind::Assigned, self.assigned),
            (SectionKind::Mentioned, self.mentioned),
            (SectionKind::ReviewRequests, self.review_requests),
            (SectionKind::Reviewed, self.reviewed),
            (SectionKind::RecentlyClosed, self.recently_closed),
        ]
    }
}

const PULL_REQUEST_FRAGMENT: &str = r#"
fragment PullRequestFields on PullRequest {
  id
  number
  title
  permalink
  repository {
    nameWithOwner
  }
  commits(last: 1) {
    nodes {
      commit {
        statusCheckRollup {
          state
        }
      }
    }
  }
}
"#;

fn page_size(kind: SectionKind) -> usize {
    match kind {
        SectionKind::RecentlyClosed => RECENTLY_CLOSED_PAGE_SIZE,
        _ => SEARCH_PAGE_SIZE,
    }
}

fn my_pull_requests_query() -> String {
    let params = SectionKind::ALL
        .iter()
        .map(|kind| format!("${}: String!", kind.graphql_alias()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut query = format!("query MyPullRequests({params}) {{\n");
    for kind in SectionKind::ALL {
        let alias = kind.graphql_alias();
        query.push_str(&format!(
            "  {alias}: search(query: ${alias}, type: ISSUE, first: {}) {{\n    nodes {{\n      ...PullRequestFields\n    }}\n  }}\n",
            page_size(kind)
        ));
    }
    query.push_str("}\n");
    query.push_str(PULL_REQUEST_FRAGMENT);
    query
}

fn search_variables(repository: Option<&str>) -> Value {
    let repo_filter = repository
        .map(str::trim)
        .filter(|repo| !repo.is_empty())
        .map(|repo| format!(" repo:{repo}"))
        .unwrap_or_default();

    let mut variables = Map::new();
    for kind in SectionKind::ALL {
        variables.insert(
            kind.graphql_alias().to_string(),
            Value::String(format!("{}{repo_filter}", kind.search_qualifiers())),
        );
    }
    Value::Object(variables)
}

fn latest_commit(pr: &GraphQlPullRequest) -> Option<LatestCommit> {
    let node = pr.commits.as_ref().and_then(|commits| commits.nodes.first())?;
    let check_state = node
        .commit
        .as_ref()
        .and_then(|commit| commit.status_check_rollup.as_ref())
        .and_then(|rollup| rollup.state);

    Some(LatestCommit { check_state })
}

fn transform_pull_request(pr: GraphQlPullRequest) -> PullRequestSummary {
    let latest_commit = latest_commit(&pr);
    PullRequestSummary {
        id: pr.id,
        number: pr.number,
        title: pr.title,
        permalink: pr.permalink,
        repository: pr.repository.name_with_owner,
        latest_commit,
    }
}

fn build_sections(data: MyPullRequestsData) -> Vec<Section> {
    let sections = data
        .into_connections()
        .into_iter()
        .map(|(kind, connection)| {
            let entries = connection
                .nodes
                .into_iter()
                .map(|node| node.map(transform_pull_request))
                .collect();
            Section::new(kind, entries)
        })
        .collect();

    dedupe_sections(sections)
}

/// Keeps each pull request only in the first section that lists it.
fn dedupe_sections(sections: Vec<Section>) -> Vec<Section> {
    let mut seen = HashSet::new();

    sections
        .into_iter()
        .map(|section| {
            let entries = section
                .entries
                .into_iter()
                .filter(|entry| match entry {
                    Some(pr) => seen.insert(pr.id.clone()),
                    None => true,
                })
                .collect();
            Section::new(section.kind, entries)
        })
        .collect()
}

fn handle_graphql_errors(errors: &[GraphQlError]) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }

    let insufficient = errors.iter().find(|e| {
        e.r#type
            .as_deref()
            .map(|t| t == "INSUFFICIENT_SCOPES")
            .unwrap_or(false)
    });

    if insufficient.is_some() {
        return Err(anyhow!(
            "token is missing the 'repo' scope. Run: gh auth refresh -h github.com -s repo"
        ));
    }

    Err(anyhow!("GraphQL error: {}", errors[0].message))
}

/// Maps a failed HTTP status to the error shown to the user.
fn status_error(status: StatusCode, body: &str) -> Option<anyhow::Error> {
    if status.is_success() {
        return None;
    }
    let err = match status {
        StatusCode::TOO_MANY_REQUESTS => anyhow!("GitHub rate limited. Retrying later."),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
            "GitHub authentication failed ({}). {}",
            status,
            body.trim()
        ),
        _ => anyhow!("GitHub API error: {}", status),
    };
    Some(err)
}

async fn post_graphql<T: DeserializeOwned>(
    client: &Client,
    token: &str,
    query: &str,
    variables: Value,
) -> Result<Option<T>> {
    let response = client
        .post(GITHUB_GRAPHQL)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .header("User-Agent", "prbar")
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await
        .context("failed to fetch pull requests")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body)
            .unwrap_or_else(|| anyhow!("GitHub API error: {}", status)));
    }

    let payload: GraphQlResponse<T> = response
        .json()
        .await
        .context("failed to decode GitHub response")?;
    if let Some(errors) = payload.errors {
        handle_graphql_errors(&errors)?;
    }

    Ok(payload.data)
}

/// Fetches every pull request category for the viewer in a single request.
pub async fn fetch_my_pull_requests(
    client: &Client,
    token: &str,
    repository: Option<&str>,
) -> Result<Vec<Section>> {
    let query = my_pull_requests_query();
    let data: Option<MyPullRequestsData> =
        post_graphql(client, token, &query, search_variables(repository)).await?;

    let sections = match data {
        Some(data) => build_sections(data),
        None => SectionKind::ALL
            .iter()
            .map(|kind| Section::new(*kind, Vec::new()))
            .collect(),
    };

    let absent: usize = sections
        .iter()
        .map(|section| section.entries.len() - section.len())
        .sum();
    if absent > 0 {
        log::warn!("GitHub returned {absent} empty pull request entries");
    }

    Ok(sections)
}
