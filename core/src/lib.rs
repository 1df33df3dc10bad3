//! Synchronous client core for the Redmine issues REST API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The host supplies a
//! `Transport` that performs the round trip; `IssueService` ties the two
//! together with one method per operation.
//!
//! # Design
//! - `IssueClient` is stateless: it holds only its `ClientConfig`.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - Status mapping: the expected success status decodes the payload
//!   envelope, 404 on single-issue operations is `NotFound`, and anything
//!   else decodes the server's errors envelope.
//! - List queries are form-urlencoded and the API key travels in the
//!   `X-Redmine-API-Key` header only.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod service;
pub mod types;

pub use client::IssueClient;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use service::IssueService;
pub use types::{CustomField, CustomFieldValue, Id, IdName, Issue, IssueFilter, Upload};
