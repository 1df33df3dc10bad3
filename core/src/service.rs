//! One-call-per-operation facade over `IssueClient` and a `Transport`.
//!
//! # Design
//! Each method is `build_*`, one `Transport::execute`, then `parse_*`. A
//! transport failure is returned as-is without attempting to decode anything.

use tracing::debug;

use crate::client::IssueClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{Issue, IssueFilter};

/// Issue operations executed over a caller-supplied transport.
#[derive(Debug, Clone)]
pub struct IssueService<T> {
    client: IssueClient,
    transport: T,
}

impl<T: Transport> IssueService<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            client: IssueClient::new(config),
            transport,
        }
    }

    /// Validates `config` before wiring up the client.
    pub fn try_new(config: ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            client: IssueClient::try_new(config)?,
            transport,
        })
    }

    pub fn client(&self) -> &IssueClient {
        &self.client
    }

    /// All issues visible to the configured key, one page at a time.
    pub fn issues(&self) -> Result<Vec<Issue>> {
        let response = self.send(self.client.build_list_issues())?;
        self.client.parse_list_issues(response)
    }

    pub fn issues_of(&self, project_id: u64) -> Result<Vec<Issue>> {
        let response = self.send(self.client.build_list_project_issues(project_id))?;
        self.client.parse_list_issues(response)
    }

    /// Issues matched by a saved query.
    pub fn issues_by_query(&self, query_id: u64) -> Result<Vec<Issue>> {
        let response = self.send(self.client.build_list_query_issues(query_id))?;
        self.client.parse_list_issues(response)
    }

    pub fn issues_by_filter(&self, filter: Option<&IssueFilter>) -> Result<Vec<Issue>> {
        let response = self.send(self.client.build_list_filtered_issues(filter))?;
        self.client.parse_list_issues(response)
    }

    pub fn issue(&self, id: u64) -> Result<Issue> {
        let response = self.send(self.client.build_get_issue(id))?;
        self.client.parse_get_issue(response)
    }

    /// Create `issue` and return the server's copy, with its assigned id.
    pub fn create_issue(&self, issue: &Issue) -> Result<Issue> {
        let response = self.send(self.client.build_create_issue(issue)?)?;
        self.client.parse_create_issue(response)
    }

    pub fn update_issue(&self, issue: &Issue) -> Result<()> {
        let response = self.send(self.client.build_update_issue(issue)?)?;
        self.client.parse_update_issue(response)
    }

    pub fn delete_issue(&self, id: u64) -> Result<()> {
        let response = self.send(self.client.build_delete_issue(id))?;
        self.client.parse_delete_issue(response)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let response = self.transport.execute(request)?;
        debug!(method = method.as_str(), status = response.status, "round trip complete");
        Ok(response)
    }
}
