//! Connection settings for the Redmine client.
//!
//! # Design
//! `ClientConfig` is plain data with a `Deserialize` impl so hosts can embed
//! it in their own configuration files. `from_env` covers the common case of
//! a CLI or service reading settings from the process environment.

use serde::Deserialize;

use crate::error::{ApiError, Result};

pub const ENV_ENDPOINT: &str = "REDMINE_ENDPOINT";
pub const ENV_API_KEY: &str = "REDMINE_API_KEY";
pub const ENV_LIMIT: &str = "REDMINE_LIMIT";
pub const ENV_OFFSET: &str = "REDMINE_OFFSET";

/// Endpoint, credentials and pagination applied to every list request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl ClientConfig {
    /// Endpoint is stored as given; `IssueClient` strips a trailing slash.
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Read settings from `REDMINE_ENDPOINT`, `REDMINE_API_KEY` and the
    /// optional `REDMINE_LIMIT` / `REDMINE_OFFSET`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ApiError::Config(format!("{name} is not set")))
        };
        let optional = |name: &str| -> Result<Option<u32>> {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|e| ApiError::Config(format!("{name}={raw:?}: {e}"))),
            }
        };

        let config = Self {
            limit: optional(ENV_LIMIT)?,
            offset: optional(ENV_OFFSET)?,
            ..Self::new(&required(ENV_ENDPOINT)?, &required(ENV_API_KEY)?)
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot produce a usable request.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ApiError::Config("endpoint is empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ApiError::Config(format!(
                "endpoint {:?} must start with http:// or https://",
                self.endpoint
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(ApiError::Config("api key is empty".to_string()));
        }
        Ok(())
    }
}
