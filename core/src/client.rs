//! Stateless HTTP request builder and response parser for the issues API.
//!
//! # Design
//! `IssueClient` holds only its `ClientConfig` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The round trip itself belongs to a `Transport`, see
//! `IssueService`.
//!
//! Every request authenticates with the `X-Redmine-API-Key` header; the key
//! never appears in a URL.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, ACCEPT_HEADER, API_KEY_HEADER, CONTENT_TYPE_HEADER, JSON_MEDIA_TYPE,
};
use crate::query::{filter_clause, pagination_clause, pair, to_query};
use crate::types::{ErrorsEnvelope, Issue, IssueEnvelope, IssueFilter, IssueRequest, IssuesEnvelope};

/// Synchronous, stateless client for the issues API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network.
#[derive(Debug, Clone)]
pub struct IssueClient {
    config: ClientConfig,
}

impl IssueClient {
    /// Wraps `config` as given, stripping any trailing slash from the
    /// endpoint. The config is not validated; use [`IssueClient::try_new`]
    /// to reject a malformed endpoint or a missing key up front.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: ClientConfig {
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                ..config
            },
        }
    }

    /// Like [`IssueClient::new`], but fails with `ApiError::Config` when
    /// `config` does not pass [`ClientConfig::validate`].
    pub fn try_new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build_list_issues(&self) -> HttpRequest {
        self.list_request("")
    }

    pub fn build_list_project_issues(&self, project_id: u64) -> HttpRequest {
        self.list_request(&pair("project_id", &project_id.to_string()))
    }

    pub fn build_list_query_issues(&self, query_id: u64) -> HttpRequest {
        self.list_request(&pair("query_id", &query_id.to_string()))
    }

    pub fn build_list_filtered_issues(&self, filter: Option<&IssueFilter>) -> HttpRequest {
        let clause = pagination_clause(self.config.limit, self.config.offset) + &filter_clause(filter);
        self.request(HttpMethod::Get, format!("/issues.json{}", to_query(&clause)), None)
    }

    pub fn build_get_issue(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/issues/{id}.json"), None)
    }

    pub fn build_create_issue(&self, issue: &Issue) -> Result<HttpRequest> {
        let body = encode_issue(issue)?;
        Ok(self.request(HttpMethod::Post, "/issues.json".to_string(), Some(body)))
    }

    /// The target is taken from `issue.id`.
    pub fn build_update_issue(&self, issue: &Issue) -> Result<HttpRequest> {
        let body = encode_issue(issue)?;
        Ok(self.request(HttpMethod::Put, format!("/issues/{}.json", issue.id), Some(body)))
    }

    pub fn build_delete_issue(&self, id: u64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/issues/{id}.json"), None)
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    /// Parse the response of any of the list requests.
    pub fn parse_list_issues(&self, response: HttpResponse) -> Result<Vec<Issue>> {
        debug!(status = response.status, "parsing issue list response");
        check_status(&response, &[200])?;
        decode::<IssuesEnvelope>(&response.body).map(|envelope| envelope.issues)
    }

    pub fn parse_get_issue(&self, response: HttpResponse) -> Result<Issue> {
        debug!(status = response.status, "parsing issue response");
        check_found(&response)?;
        check_status(&response, &[200])?;
        decode::<IssueEnvelope>(&response.body).map(|envelope| envelope.issue)
    }

    pub fn parse_create_issue(&self, response: HttpResponse) -> Result<Issue> {
        debug!(status = response.status, "parsing create response");
        check_status(&response, &[201])?;
        decode::<IssueEnvelope>(&response.body).map(|envelope| envelope.issue)
    }

    pub fn parse_update_issue(&self, response: HttpResponse) -> Result<()> {
        debug!(status = response.status, "parsing update response");
        check_found(&response)?;
        check_status(&response, &[200, 204])
    }

    pub fn parse_delete_issue(&self, response: HttpResponse) -> Result<()> {
        debug!(status = response.status, "parsing delete response");
        check_found(&response)?;
        check_status(&response, &[200, 204])
    }

    fn list_request(&self, selector: &str) -> HttpRequest {
        let clause = selector.to_string() + &pagination_clause(self.config.limit, self.config.offset);
        self.request(HttpMethod::Get, format!("/issues.json{}", to_query(&clause)), None)
    }

    fn request(&self, method: HttpMethod, path_and_query: String, body: Option<String>) -> HttpRequest {
        let mut headers = vec![
            (API_KEY_HEADER.to_string(), self.config.api_key.clone()),
            (ACCEPT_HEADER.to_string(), JSON_MEDIA_TYPE.to_string()),
        ];
        if body.is_some() {
            headers.push((CONTENT_TYPE_HEADER.to_string(), JSON_MEDIA_TYPE.to_string()));
        }
        let url = format!("{}{}", self.config.endpoint, path_and_query);
        debug!(method = method.as_str(), %url, "built request");
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn encode_issue(issue: &Issue) -> Result<String> {
    serde_json::to_string(&IssueRequest { issue }).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// A 404 on a single-issue operation is `NotFound` whatever the body says.
fn check_found(response: &HttpResponse) -> Result<()> {
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

/// Map any status outside `expected` to the server's errors envelope, or to
/// the failure to decode it.
fn check_status(response: &HttpResponse, expected: &[u16]) -> Result<()> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    let envelope = decode::<ErrorsEnvelope>(&response.body)?;
    warn!(status = response.status, errors = ?envelope.errors, "server rejected request");
    Err(ApiError::Service {
        status: response.status,
        messages: envelope.errors,
    })
}
