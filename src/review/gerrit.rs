//! review::gerrit
//!
//! Gerrit review adapter using the Gerrit REST API.
//!
//! # Design
//!
//! Every endpoint lives under `/changes/`. With credentials configured the
//! authenticated `/a/` prefix is used together with HTTP basic auth.
//! Gerrit prefixes JSON bodies with the `)]}'` XSSI guard, which is
//! stripped before parsing.
//!
//! Action endpoints (submit, abandon, rebase, create) answer with a change
//! that lacks revision details, so the change is fetched again afterwards to
//! return the current fetch ref.
//!
//! # Status Mapping
//!
//! - 404 → [`ReviewError::NotFound`]
//! - 409 → [`ReviewError::Conflict`]
//! - anything else, including transport errors → [`ReviewError::Communication`]
//!
//! # Example
//!
//! ```ignore
//! use regstore::review::gerrit::GerritReview;
//! use regstore::review::ReviewAdapter;
//!
//! let review = GerritReview::new("https://review.example.com", Some(("bot", "secret")));
//! let change = review.get_change("1042").await?;
//! println!("{} at {}", change.subject, change.ref_spec);
//! ```

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{
    ChangeInfo, ChangeQuery, ChangeStatus, CreateChangeRequest, FileChangeKind, ReviewAdapter,
    ReviewError,
};

/// Prefix Gerrit puts in front of every JSON response.
const XSSI_PREFIX: &str = ")]}'";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "regstore";

/// Gerrit review adapter.
pub struct GerritReview {
    /// HTTP client for making requests
    client: Client,
    /// Server base URL without trailing slash
    base_url: String,
    /// Basic-auth credentials; `None` means anonymous access
    credentials: Option<(String, String)>,
}

// Custom Debug to avoid exposing the password
impl std::fmt::Debug for GerritReview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GerritReview")
            .field("base_url", &self.base_url)
            .field(
                "username",
                &self.credentials.as_ref().map(|(user, _)| user.as_str()),
            )
            .finish()
    }
}

impl GerritReview {
    /// Create an adapter for the server at `base_url`.
    pub fn new(base_url: impl Into<String>, credentials: Option<(&str, &str)>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            credentials: credentials.map(|(u, p)| (u.to_string(), p.to_string())),
        }
    }

    /// URL of a REST endpoint below `/changes/`.
    fn url(&self, path: &str) -> String {
        let prefix = if self.credentials.is_some() { "/a" } else { "" };
        format!("{}{}/changes/{}", self.base_url, prefix, path)
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.headers(Self::headers());
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ReviewError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| ReviewError::Communication(e.to_string()))
    }

    /// Handle a response, parsing the JSON body on success.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ReviewError> {
        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(response, status).await;
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReviewError::Communication(e.to_string()))?;
        parse_body(&body)
    }

    /// Handle a response whose body is irrelevant.
    async fn handle_empty_response(&self, response: Response) -> Result<(), ReviewError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ReviewError> {
        let message = response
            .text()
            .await
            .ok()
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| status.to_string());

        debug!(%status, %message, "gerrit request failed");

        Err(match status {
            StatusCode::NOT_FOUND => ReviewError::NotFound(message),
            StatusCode::CONFLICT => ReviewError::Conflict(message),
            _ => ReviewError::Communication(format!("{}: {}", status.as_u16(), message)),
        })
    }

    async fn post_action(&self, id: &str, action: &str) -> Result<ChangeInfo, ReviewError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("{}/{}", id, action)))
                    .json(&serde_json::json!({})),
            )
            .await?;
        self.handle_empty_response(response).await?;
        self.get_change(id).await
    }
}

/// Strip the XSSI guard and parse the JSON body.
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ReviewError> {
    let json = body.strip_prefix(XSSI_PREFIX).unwrap_or(body).trim_start();
    serde_json::from_str(json)
        .map_err(|e| ReviewError::Communication(format!("failed to parse response: {}", e)))
}

/// Build the `q` parameter of a change query.
fn query_string(query: &ChangeQuery) -> String {
    let mut terms = vec![format!("project:{}", query.project)];
    if let Some(owner) = &query.owner {
        terms.push(format!("owner:{}", owner));
    }
    if let Some(status) = query.status {
        terms.push(format!("status:{}", status.as_str()));
    }
    terms.join(" ")
}

// =============================================================================
// Gerrit API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GerritChange {
    #[serde(rename = "_number")]
    number: u64,
    change_id: String,
    #[serde(default)]
    subject: String,
    topic: Option<String>,
    status: GerritStatus,
    mergeable: Option<bool>,
    current_revision: Option<String>,
    #[serde(default)]
    revisions: HashMap<String, GerritRevision>,
    owner: Option<GerritAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum GerritStatus {
    New,
    Merged,
    Abandoned,
    Draft,
}

#[derive(Debug, Deserialize)]
struct GerritRevision {
    #[serde(rename = "ref")]
    ref_spec: String,
}

#[derive(Debug, Deserialize)]
struct GerritAccount {
    username: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GerritFile {
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct GerritCreateChange<'a> {
    project: &'a str,
    branch: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

impl TryFrom<GerritChange> for ChangeInfo {
    type Error = ReviewError;

    fn try_from(change: GerritChange) -> Result<Self, Self::Error> {
        let ref_spec = change
            .current_revision
            .as_ref()
            .and_then(|sha| change.revisions.get(sha))
            .map(|revision| revision.ref_spec.clone())
            .ok_or_else(|| {
                ReviewError::Communication(format!(
                    "change {} has no current revision",
                    change.number
                ))
            })?;

        let status = match change.status {
            GerritStatus::New | GerritStatus::Draft => ChangeStatus::New,
            GerritStatus::Merged => ChangeStatus::Merged,
            GerritStatus::Abandoned => ChangeStatus::Abandoned,
        };

        Ok(ChangeInfo {
            number: change.number,
            change_id: change.change_id,
            subject: change.subject,
            topic: change.topic.filter(|t| !t.is_empty()),
            status,
            mergeable: change.mergeable,
            ref_spec,
            owner: change.owner.and_then(|owner| owner.username.or(owner.name)),
        })
    }
}

#[async_trait]
impl ReviewAdapter for GerritReview {
    fn name(&self) -> &'static str {
        "gerrit"
    }

    async fn query_changes(&self, query: &ChangeQuery) -> Result<Vec<ChangeInfo>, ReviewError> {
        let request = self
            .client
            .get(self.url(""))
            .query(&[("q", query_string(query).as_str()), ("o", "CURRENT_REVISION")]);
        let response = self.send(request).await?;
        let changes: Vec<GerritChange> = self.handle_response(response).await?;

        // One unusable change must not hide the rest of the result
        let changes = changes
            .into_iter()
            .filter_map(|change| {
                let number = change.number;
                ChangeInfo::try_from(change)
                    .map_err(|err| warn!(change = number, error = %err, "skipping change"))
                    .ok()
            })
            .collect();
        Ok(changes)
    }

    async fn get_change(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        let request = self
            .client
            .get(self.url(id))
            .query(&[("o", "CURRENT_REVISION")]);
        let response = self.send(request).await?;
        let change: GerritChange = self.handle_response(response).await?;
        change.try_into()
    }

    async fn change_files(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, FileChangeKind>, ReviewError> {
        let request = self
            .client
            .get(self.url(&format!("{}/revisions/current/files", id)));
        let response = self.send(request).await?;
        let files: BTreeMap<String, GerritFile> = self.handle_response(response).await?;

        // Magic entries like /COMMIT_MSG are not repository files
        Ok(files
            .into_iter()
            .filter(|(path, _)| !path.starts_with('/'))
            .map(|(path, file)| (path, FileChangeKind::from_code(file.status.as_deref())))
            .collect())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<String>, ReviewError> {
        let request = self.client.get(self.url(&format!("{}/topic", id)));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let topic: String = self.handle_response(response).await?;
        Ok(Some(topic).filter(|t| !t.is_empty()))
    }

    async fn set_topic(&self, id: &str, topic: Option<&str>) -> Result<(), ReviewError> {
        let url = self.url(&format!("{}/topic", id));
        let request = match topic.filter(|t| !t.is_empty()) {
            Some(topic) => self
                .client
                .put(url)
                .json(&serde_json::json!({ "topic": topic })),
            None => self.client.delete(url),
        };
        let response = self.send(request).await?;
        self.handle_empty_response(response).await
    }

    async fn submit(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.post_action(id, "submit").await
    }

    async fn abandon(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.post_action(id, "abandon").await
    }

    async fn rebase(&self, id: &str) -> Result<ChangeInfo, ReviewError> {
        self.post_action(id, "rebase").await
    }

    async fn create_change(&self, request: CreateChangeRequest) -> Result<ChangeInfo, ReviewError> {
        let body = GerritCreateChange {
            project: &request.project,
            branch: &request.branch,
            subject: &request.subject,
            topic: request.topic.as_deref(),
        };
        let response = self.send(self.client.post(self.url("")).json(&body)).await?;

        #[derive(Deserialize)]
        struct Created {
            #[serde(rename = "_number")]
            number: u64,
        }
        let created: Created = self.handle_response(response).await?;
        self.get_change(&created.number.to_string()).await
    }

    async fn review(&self, id: &str, message: &str) -> Result<(), ReviewError> {
        let request = self
            .client
            .post(self.url(&format!("{}/revisions/current/review", id)))
            .json(&serde_json::json!({ "message": message }));
        let response = self.send(request).await?;
        self.handle_empty_response(response).await
    }
}
