use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::types::{WirePullRequest, WireReview};
use super::{GitHubError, PullRequest, RepositoryClient, RepositoryTarget, Review, ReviewEvent};
use crate::config::Config;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "lgtm-bot";
// GitHub caps a page at 100 items.
const MAX_PAGE_SIZE: usize = 100;

/// `RepositoryClient` backed by the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    /// Build a client from configuration. The token comes from the config
    /// file or the `GITHUB_TOKEN` environment variable.
    pub fn from_config(config: &Config) -> Result<Self, GitHubError> {
        let token = config.github_token().ok_or(GitHubError::MissingToken)?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.github.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn repo_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, owner, name)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    /// GET `first` and follow `Link: rel="next"` until the pages run out or
    /// at least `limit` items have been read.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first: RequestBuilder,
        limit: usize,
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        let mut request = first;
        loop {
            let response = check_status(self.authorized(request).send().await?).await?;
            let next = next_page_url(response.headers());
            items.extend(response.json::<Vec<T>>().await?);

            match next {
                Some(url) if items.len() < limit => {
                    debug!(read = items.len(), "following next page");
                    request = self.http.get(url);
                }
                _ => return Ok(items),
            }
        }
    }
}

/// Turn a non-2xx response into `GitHubError::Api`, keeping the body for
/// diagnostics.
async fn check_status(response: Response) -> Result<Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitHubError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Extract the `rel="next"` target from a `Link` header:
/// `<https://api.github.com/...&page=2>; rel="next", <...>; rel="last"`
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| p.trim() == "rel=\"next\"");
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    #[instrument(skip(self), fields(repo = %target))]
    async fn list_open_pull_requests(
        &self,
        target: &RepositoryTarget,
        limit: usize,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        let url = format!("{}/pulls", self.repo_url(&target.owner, &target.name));
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        debug!("listing open pull requests");
        let first = self.http.get(&url).query(&[
            ("state", "open"),
            ("sort", "updated"),
            ("direction", "desc"),
            ("per_page", page_size.as_str()),
        ]);
        let pulls = self.get_paginated::<WirePullRequest>(first, limit).await?;
        debug!(count = pulls.len(), "received pull requests");

        Ok(pulls
            .into_iter()
            .map(|wire| wire.into_pull_request(target))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_reviews(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> Result<Vec<Review>, GitHubError> {
        let url = format!("{}/pulls/{}/reviews", self.repo_url(owner, name), number);
        let page_size = MAX_PAGE_SIZE.to_string();

        let first = self
            .http
            .get(&url)
            .query(&[("per_page", page_size.as_str())]);
        // Every page: a self-approval may sit anywhere in the history.
        let reviews = self
            .get_paginated::<WireReview>(first, usize::MAX)
            .await?;
        debug!(count = reviews.len(), "received reviews");

        Ok(reviews.into_iter().map(Review::from).collect())
    }

    #[instrument(skip(self, body))]
    async fn create_review(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        event: ReviewEvent,
        body: &str,
    ) -> Result<(), GitHubError> {
        let url = format!("{}/pulls/{}/reviews", self.repo_url(owner, name), number);
        let payload = serde_json::json!({
            "event": event.as_str(),
            "body": body,
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&payload)
            .send()
            .await?;
        check_status(response).await?;
        debug!("review submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::github::types::HeadRepository;
    use crate::github::ReviewState;
    use crate::pipeline::ReviewPipeline;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with_token(api_url: Option<&str>) -> Config {
        Config {
            github: GitHubConfig {
                token: Some("test-token".to_string()),
                api_url: api_url.map(str::to_string),
                ..GitHubConfig::default()
            },
            ..Config::default()
        }
    }

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::from_config(&config_with_token(Some(&server.uri()))).unwrap()
    }

    fn wire_pull(number: u64, title: &str, head: Option<(&str, &str)>) -> serde_json::Value {
        let repo = head.map(|(owner, name)| json!({"name": name, "owner": {"login": owner}}));
        json!({
            "number": number,
            "title": title,
            "user": {"login": "alice"},
            "head": {"repo": repo},
        })
    }

    #[test]
    fn test_repo_url_uses_default_api() {
        let client = GitHubClient::from_config(&config_with_token(None)).unwrap();
        assert_eq!(
            client.repo_url("octo", "widgets"),
            "https://api.github.com/repos/octo/widgets"
        );
    }

    #[test]
    fn test_repo_url_trims_trailing_slash() {
        let client =
            GitHubClient::from_config(&config_with_token(Some("https://ghe.example.com/api/v3/")))
                .unwrap();
        assert_eq!(
            client.repo_url("octo", "widgets"),
            "https://ghe.example.com/api/v3/repos/octo/widgets"
        );
    }

    #[test]
    fn test_next_page_url() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repos/o/r/pulls?page=2>; rel=\"next\", \
                 <https://api.github.com/repos/o/r/pulls?page=5>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://api.github.com/repos/o/r/pulls?page=2")
        );

        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/repos/o/r/pulls?page=1>; rel=\"prev\""),
        );
        assert!(next_page_url(&headers).is_none());
        assert!(next_page_url(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_list_open_pull_requests_request_and_parsing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("state", "open"))
            .and(query_param("sort", "updated"))
            .and(query_param("direction", "desc"))
            .and(query_param("per_page", "10"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("accept", "application/vnd.github+json"))
            .and(header("user-agent", "lgtm-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                wire_pull(4, "Fix typo", Some(("alice", "widgets-fork"))),
                wire_pull(2, "Orphaned", None),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let target = RepositoryTarget::new("octo", "widgets");
        let pulls = client_for(&server)
            .list_open_pull_requests(&target, 10)
            .await
            .unwrap();

        assert_eq!(pulls.len(), 2);
        assert_eq!(pulls[0].number, 4);
        assert_eq!(
            pulls[0].head,
            HeadRepository {
                owner: "alice".to_string(),
                name: "widgets-fork".to_string(),
            }
        );
        // deleted fork falls back to the polled repository
        assert_eq!(
            pulls[1].head,
            HeadRepository {
                owner: "octo".to_string(),
                name: "widgets".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_list_open_pull_requests_follows_next_page() {
        let server = MockServer::start().await;
        let next = format!("<{}/repos/octo/widgets/pulls?page=2>; rel=\"next\"", server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([wire_pull(1, "a", None), wire_pull(2, "b", None)])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([wire_pull(3, "c", None)])))
            .expect(1)
            .mount(&server)
            .await;

        let target = RepositoryTarget::new("octo", "widgets");
        let pulls = client_for(&server)
            .list_open_pull_requests(&target, 150)
            .await
            .unwrap();
        let numbers: Vec<u64> = pulls.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_open_pull_requests_stops_at_limit() {
        let server = MockServer::start().await;
        let next = format!("<{}/repos/octo/widgets/pulls?page=2>; rel=\"next\"", server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("per_page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([wire_pull(1, "a", None), wire_pull(2, "b", None)])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let target = RepositoryTarget::new("octo", "widgets");
        let pulls = client_for(&server)
            .list_open_pull_requests(&target, 2)
            .await
            .unwrap();
        assert_eq!(pulls.len(), 2);
    }

    #[tokio::test]
    async fn test_list_reviews_reads_every_page() {
        let server = MockServer::start().await;
        let next = format!("<{}/repos/alice/fork/pulls/5/reviews?page=2>; rel=\"next\"", server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/alice/fork/pulls/5/reviews"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([
                        {"user": {"login": "bob"}, "state": "COMMENTED", "body": "LGTM"}
                    ])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/fork/pulls/5/reviews"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"user": {"login": "lgtm-bot"}, "state": "APPROVED", "body": "LGTM"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let reviews = client_for(&server)
            .list_reviews("alice", "fork", 5)
            .await
            .unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[1].login.as_deref(), Some("lgtm-bot"));
        assert_eq!(reviews[1].state, ReviewState::Approved);
    }

    #[tokio::test]
    async fn test_create_review_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/alice/fork/pulls/5/reviews"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({"event": "APPROVE", "body": "LGTM"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .create_review("alice", "fork", 5, ReviewEvent::Approve, "LGTM")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/missing/pulls"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let target = RepositoryTarget::new("octo", "missing");
        let err = client_for(&server)
            .list_open_pull_requests(&target, 10)
            .await
            .unwrap_err();
        match err {
            GitHubError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Not Found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pipeline_approves_orphaned_pull_request_on_polled_repo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                wire_pull(9, "Bump deps", None),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls/9/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/widgets/pulls/9/reviews"))
            .and(body_json(json!({"event": "APPROVE", "body": "LGTM"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            user: "lgtm-bot".to_string(),
            repositories: vec![RepositoryTarget::new("octo", "widgets")],
            ..config_with_token(Some(&server.uri()))
        };
        let client = GitHubClient::from_config(&config).unwrap();
        let mut pipeline = ReviewPipeline::new(client, config);

        pipeline
            .retrieve()
            .await
            .unwrap()
            .filter_work_in_progress()
            .filter_do_not_merge()
            .filter_own_authored()
            .filter_sufficiently_reviewed()
            .await
            .unwrap();
        let approved = pipeline.approve_all().await.into_result().unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].number, 9);
    }
}
