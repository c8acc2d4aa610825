//! Review Board Web API client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::ReviewBoardError;
use crate::models::{DiffRevision, Draft, DraftUpdate, ReviewRequest};
use crate::traits::ReviewSystem;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A hyperlink to another API resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbLink {
    pub href: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl RbLink {
    /// Trailing numeric path segment of the link, e.g. `42` for
    /// `https://rb.example.com/api/review-requests/42/`.
    pub fn resource_id(&self) -> Option<u64> {
        self.href
            .split('/')
            .filter(|part| !part.is_empty())
            .last()
            .and_then(|id| id.parse().ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbReviewRequest {
    pub id: u64,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub depends_on: Vec<RbLink>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub absolute_url: String,
}

impl From<RbReviewRequest> for ReviewRequest {
    fn from(rr: RbReviewRequest) -> Self {
        Self {
            id: rr.id,
            commit_id: rr.commit_id,
            summary: rr.summary,
            description: rr.description,
            branch: rr.branch,
            depends_on: rr.depends_on.iter().filter_map(RbLink::resource_id).collect(),
            public: rr.public,
            absolute_url: rr.absolute_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbDraft {
    pub id: u64,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub depends_on: Vec<RbLink>,
}

impl From<RbDraft> for Draft {
    fn from(d: RbDraft) -> Self {
        Self {
            id: d.id,
            commit_id: d.commit_id,
            summary: d.summary,
            description: d.description,
            branch: d.branch,
            depends_on: d.depends_on.iter().filter_map(RbLink::resource_id).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbDiff {
    pub id: u64,
    pub revision: u32,
    #[serde(default)]
    pub base_commit_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbSession {
    pub authenticated: bool,
}

#[derive(Deserialize)]
struct ReviewRequestEnvelope {
    review_request: RbReviewRequest,
}

#[derive(Deserialize)]
struct ReviewRequestList {
    total_results: u64,
    #[serde(default)]
    review_requests: Vec<RbReviewRequest>,
}

#[derive(Deserialize)]
struct DiffEnvelope {
    diff: RbDiff,
}

#[derive(Deserialize)]
struct DraftEnvelope {
    draft: RbDraft,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: RbSession,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Asynchronous Review Board client bound to one repository.
#[derive(Clone)]
pub struct ReviewBoardClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    repository: u64,
}

impl ReviewBoardClient {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        repository: u64,
    ) -> Result<Self, ReviewBoardError> {
        let url = url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("rbhook/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder().default_headers(headers).build()?;
        let client = Self {
            http,
            url,
            username: username.into(),
            password: password.into(),
            repository,
        };
        info!(url = %client.url, username = %client.username, repository, "created ReviewBoardClient");
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn repository(&self) -> u64 {
        self.repository
    }

    /// Verify the configured credentials against `/api/session/`.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn check_session(&self) -> Result<(), ReviewBoardError> {
        let resp = self
            .http
            .get(self.endpoint("/api/session/"))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let body: SessionEnvelope = check_response(resp).await?.json().await?;
        if !body.session.authenticated {
            return Err(ReviewBoardError::AuthenticationFailed(format!(
                "session for '{}' is not authenticated",
                self.username
            )));
        }
        debug!(username = %self.username, "session authenticated");
        Ok(())
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn find_review_request(
        &self,
        commit_id: &str,
    ) -> Result<Option<ReviewRequest>, ReviewBoardError> {
        let repository = self.repository.to_string();
        let resp = self
            .http
            .get(self.endpoint("/api/review-requests/"))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("repository", repository.as_str()),
                ("commit-id", commit_id),
                ("status", "all"),
                ("max-results", "1"),
            ])
            .send()
            .await?;
        let list: ReviewRequestList = check_response(resp).await?.json().await?;
        debug!(total = list.total_results, "looked up review request");
        if list.total_results == 0 {
            return Ok(None);
        }
        Ok(list.review_requests.into_iter().next().map(Into::into))
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn create_review_request(
        &self,
        commit_id: &str,
    ) -> Result<ReviewRequest, ReviewBoardError> {
        let repository = self.repository.to_string();
        let resp = self
            .http
            .post(self.endpoint("/api/review-requests/"))
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("repository", repository.as_str()), ("commit_id", commit_id)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Err(ReviewBoardError::Conflict {
                commit_id: commit_id.to_string(),
            });
        }
        let body: ReviewRequestEnvelope = check_response(resp).await?.json().await?;
        info!(id = body.review_request.id, commit_id, "created review request");
        Ok(body.review_request.into())
    }

    #[instrument(skip(self, content), fields(url = %self.url, bytes = content.len()))]
    pub async fn upload_diff(
        &self,
        request_id: u64,
        content: &[u8],
        base_commit_id: Option<&str>,
    ) -> Result<DiffRevision, ReviewBoardError> {
        let part = Part::bytes(content.to_vec()).file_name("patch.diff");
        let mut form = Form::new().part("path", part);
        if let Some(base) = base_commit_id {
            form = form.text("base_commit_id", base.to_string());
        }
        let resp = self
            .http
            .post(self.endpoint(&format!("/api/review-requests/{}/diffs/", request_id)))
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await?;
        let body: DiffEnvelope = check_response(resp).await?.json().await?;
        info!(request_id, revision = body.diff.revision, "uploaded diff");
        Ok(DiffRevision {
            id: body.diff.id,
            revision: body.diff.revision,
            base_commit_id: body.diff.base_commit_id,
        })
    }

    #[instrument(skip(self, update), fields(url = %self.url))]
    pub async fn update_draft(
        &self,
        request_id: u64,
        update: &DraftUpdate,
    ) -> Result<Draft, ReviewBoardError> {
        let resp = self
            .http
            .put(self.endpoint(&format!("/api/review-requests/{}/draft/", request_id)))
            .basic_auth(&self.username, Some(&self.password))
            .form(&draft_form(update))
            .send()
            .await?;
        let body: DraftEnvelope = check_response(resp).await?.json().await?;
        info!(request_id, public = update.public, "updated draft");
        Ok(body.draft.into())
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn get_review_request(
        &self,
        request_id: u64,
    ) -> Result<ReviewRequest, ReviewBoardError> {
        let resp = self
            .http
            .get(self.endpoint(&format!("/api/review-requests/{}/", request_id)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let body: ReviewRequestEnvelope = check_response(resp).await?.json().await?;
        Ok(body.review_request.into())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

/// Form fields for a draft update. Unset optional fields are omitted so the
/// server keeps their current values.
fn draft_form(update: &DraftUpdate) -> Vec<(&'static str, String)> {
    let depends_on = update
        .depends_on
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let mut form = vec![
        ("commit_id", update.commit_id.clone()),
        ("summary", update.summary.clone()),
        ("description", update.description.clone()),
        ("branch", update.branch.clone()),
        ("depends_on", depends_on),
    ];
    if let Some(bugs) = &update.bugs_closed {
        form.push(("bugs_closed", bugs.clone()));
    }
    if update.public {
        form.push(("public", "true".to_string()));
    }
    form
}

async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ReviewBoardError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ReviewBoardError::AuthenticationFailed(format!(
            "HTTP {}",
            status
        )));
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(ReviewBoardError::ApiError {
        status: status.as_u16(),
        body: format!("{}: {}", url, body),
    })
}

#[async_trait]
impl ReviewSystem for ReviewBoardClient {
    async fn find_by_commit_id(
        &self,
        commit_id: &str,
    ) -> Result<Option<ReviewRequest>, ReviewBoardError> {
        self.find_review_request(commit_id).await
    }

    async fn create(&self, commit_id: &str) -> Result<ReviewRequest, ReviewBoardError> {
        self.create_review_request(commit_id).await
    }

    async fn upload_diff(
        &self,
        request_id: u64,
        content: &[u8],
        base_commit_id: Option<&str>,
    ) -> Result<DiffRevision, ReviewBoardError> {
        ReviewBoardClient::upload_diff(self, request_id, content, base_commit_id).await
    }

    async fn update_draft(
        &self,
        request_id: u64,
        update: &DraftUpdate,
    ) -> Result<Draft, ReviewBoardError> {
        ReviewBoardClient::update_draft(self, request_id, update).await
    }

    async fn get(&self, request_id: u64) -> Result<ReviewRequest, ReviewBoardError> {
        self.get_review_request(request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ReviewBoardClient {
        ReviewBoardClient::new(server.uri(), "admin", "admin", 1).unwrap()
    }

    fn review_request_json(id: u64, commit_id: &str, depends_on: &[u64]) -> serde_json::Value {
        let links: Vec<_> = depends_on
            .iter()
            .map(|dep| serde_json::json!({ "href": format!("http://rb/api/review-requests/{}/", dep), "method": "GET" }))
            .collect();
        serde_json::json!({
            "id": id,
            "commit_id": commit_id,
            "summary": "Fix bug",
            "description": "Fix bug\n\nDetails",
            "branch": "feature-x",
            "depends_on": links,
            "public": true,
            "absolute_url": format!("http://rb/r/{}/", id),
        })
    }

    #[test]
    fn test_link_resource_id() {
        let link = RbLink {
            href: "http://reviewboard.example.org/api/review-requests/42/".into(),
            title: None,
        };
        assert_eq!(link.resource_id(), Some(42));

        let link = RbLink {
            href: "http://reviewboard.example.org/api/session/".into(),
            title: None,
        };
        assert_eq!(link.resource_id(), None);
    }

    #[test]
    fn test_draft_form_fields() {
        let update = DraftUpdate {
            commit_id: "feature-x".into(),
            summary: "Squashed commits for feature-x".into(),
            description: "/r/1 - A\n/r/2 - B".into(),
            branch: "feature-x".into(),
            depends_on: vec![1, 2],
            bugs_closed: None,
            public: true,
        };
        let form = draft_form(&update);
        assert!(form.contains(&("depends_on", "1,2".to_string())));
        assert!(form.contains(&("public", "true".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "bugs_closed"));
    }

    #[tokio::test]
    async fn test_find_review_request_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/review-requests/"))
            .and(query_param("commit-id", "abc123"))
            .and(query_param("repository", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_results": 0,
                "review_requests": [],
            })))
            .mount(&server)
            .await;

        let found = client(&server).find_review_request("abc123").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_review_request_parses_dependencies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/review-requests/"))
            .and(query_param("commit-id", "feature-x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_results": 1,
                "review_requests": [review_request_json(9, "feature-x", &[7, 8])],
            })))
            .mount(&server)
            .await;

        let found = client(&server)
            .find_review_request("feature-x")
            .await
            .unwrap()
            .expect("review request should be found");
        assert_eq!(found.id, 9);
        assert_eq!(found.depends_on, vec![7, 8]);
        assert_eq!(found.absolute_url, "http://rb/r/9/");
    }

    #[tokio::test]
    async fn test_create_review_request_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review-requests/"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let result = client(&server).create_review_request("abc123").await;
        assert!(matches!(
            result,
            Err(ReviewBoardError::Conflict { ref commit_id }) if commit_id == "abc123"
        ));
    }

    #[tokio::test]
    async fn test_create_review_request_sends_commit_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review-requests/"))
            .and(body_string_contains("commit_id=abc123"))
            .and(body_string_contains("repository=1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "review_request": review_request_json(3, "abc123", &[]),
            })))
            .mount(&server)
            .await;

        let created = client(&server).create_review_request("abc123").await.unwrap();
        assert_eq!(created.id, 3);
    }

    #[tokio::test]
    async fn test_upload_diff_with_base() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/review-requests/3/diffs/"))
            .and(body_string_contains("base_commit_id"))
            .and(body_string_contains("diff --git a/x b/x"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "diff": { "id": 11, "revision": 2, "base_commit_id": "fff000" },
            })))
            .mount(&server)
            .await;

        let revision = client(&server)
            .upload_diff(3, b"diff --git a/x b/x\n", Some("fff000"))
            .await
            .unwrap();
        assert_eq!(revision.revision, 2);
        assert_eq!(revision.base_commit_id.as_deref(), Some("fff000"));
    }

    #[tokio::test]
    async fn test_update_draft_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/review-requests/9/draft/"))
            .and(body_string_contains("public=true"))
            .and(body_string_contains("depends_on=7%2C8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "draft": {
                    "id": 90,
                    "commit_id": "feature-x",
                    "summary": "Squashed commits for feature-x",
                    "description": "",
                    "branch": "feature-x",
                    "depends_on": [
                        { "href": "http://rb/api/review-requests/7/" },
                        { "href": "http://rb/api/review-requests/8/" }
                    ],
                },
            })))
            .mount(&server)
            .await;

        let update = DraftUpdate {
            commit_id: "feature-x".into(),
            summary: "Squashed commits for feature-x".into(),
            description: String::new(),
            branch: "feature-x".into(),
            depends_on: vec![7, 8],
            bugs_closed: None,
            public: true,
        };
        let draft = client(&server).update_draft(9, &update).await.unwrap();
        assert_eq!(draft.depends_on, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_check_session_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/session/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(&server).check_session().await;
        assert!(matches!(
            result,
            Err(ReviewBoardError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/review-requests/5/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = client(&server).get_review_request(5).await;
        match result {
            Err(ReviewBoardError::ApiError { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected ApiError, got {:?}", other.map(|r| r.id)),
        }
    }
}
