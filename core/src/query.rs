//! Query-string construction for issue list requests.
//!
//! Every helper returns a clause in which each `key=value` pair is prefixed
//! by `&`, so clauses concatenate without separators. `to_query` turns the
//! concatenation into a `?`-prefixed query string. Keys and values are
//! form-urlencoded.

use url::form_urlencoded::byte_serialize;

use crate::types::IssueFilter;

/// One `&key=value` pair with both sides percent-encoded.
pub fn pair(key: &str, value: &str) -> String {
    format!("&{}={}", encode(key), encode(value))
}

/// Clause for the configured page window: limit first, then offset.
pub fn pagination_clause(limit: Option<u32>, offset: Option<u32>) -> String {
    let mut clause = String::new();
    if let Some(limit) = limit {
        clause.push_str(&pair("limit", &limit.to_string()));
    }
    if let Some(offset) = offset {
        clause.push_str(&pair("offset", &offset.to_string()));
    }
    clause
}

/// Clause for an optional filter.
///
/// Scalar criteria come first in fixed order, followed by the extra criteria
/// in key order. Unset and empty criteria contribute nothing.
pub fn filter_clause(filter: Option<&IssueFilter>) -> String {
    let Some(filter) = filter else {
        return String::new();
    };

    let mut clause = String::new();
    for (key, value) in filter.scalar_criteria() {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            clause.push_str(&pair(key, value));
        }
    }
    for (key, value) in &filter.extra_filters {
        clause.push_str(&pair(key, value));
    }
    clause
}

/// Turn a concatenation of clauses into a query string: `""` when empty,
/// otherwise the clause with its leading `&` replaced by `?`.
pub fn to_query(clause: &str) -> String {
    match clause.strip_prefix('&') {
        Some(rest) => format!("?{rest}"),
        None if clause.is_empty() => String::new(),
        None => format!("?{clause}"),
    }
}

fn encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}
