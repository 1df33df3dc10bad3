//! In-memory Redmine issues API used by the client's integration tests.
//!
//! Serves `/issues.json` and `/issues/<id>.json` with Redmine's envelopes,
//! status codes and `X-Redmine-API-Key` authentication. State lives for the
//! lifetime of the router.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

/// Key every request must present in `X-Redmine-API-Key`.
pub const API_KEY: &str = "mock-api-key";

const DEFAULT_LIMIT: usize = 25;
const MAX_LIMIT: usize = 100;
const TIMESTAMP: &str = "2024-01-01T00:00:00Z";

const TRACKERS: [(u64, &str); 3] = [(1, "Bug"), (2, "Feature"), (3, "Support")];
const STATUSES: [(u64, &str, bool); 4] = [
    (1, "New", false),
    (2, "In Progress", false),
    (3, "Resolved", false),
    (5, "Closed", true),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdName {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub project: IdName,
    pub tracker: IdName,
    pub status: IdName,
    pub priority: IdName,
    pub author: IdName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<IdName>,
    pub subject: String,
    pub description: String,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub done_ratio: u32,
    #[serde(default)]
    pub custom_fields: Vec<Value>,
    pub created_on: String,
    pub updated_on: String,
    pub closed_on: Option<String>,
}

/// Fields accepted on create and update. Anything else is ignored, as
/// Redmine does.
#[derive(Debug, Default, Deserialize)]
pub struct IssueInput {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<u64>,
    pub tracker_id: Option<u64>,
    pub status_id: Option<u64>,
    pub assigned_to_id: Option<u64>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub done_ratio: Option<f64>,
    pub custom_fields: Option<Vec<Value>>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct IssueRequest {
    pub issue: IssueInput,
}

pub struct Store {
    issues: BTreeMap<u64, Issue>,
    next_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store {
        issues: BTreeMap::new(),
        next_id: 1,
    }));
    Router::new()
        .route("/issues.json", get(list_issues).post(create_issue))
        .route("/issues/{file}", get(get_issue).put(update_issue).delete(delete_issue))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn errors(status: StatusCode, messages: &[&str]) -> Response {
    (status, Json(json!({ "errors": messages }))).into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("x-redmine-api-key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == API_KEY => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED.into_response()),
    }
}

/// Parse the `<id>.json` path segment.
fn issue_id(file: &str) -> Result<u64, Response> {
    file.strip_suffix(".json")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())
}

fn tracker(id: u64) -> Option<IdName> {
    TRACKERS
        .iter()
        .find(|(tid, _)| *tid == id)
        .map(|(id, name)| IdName { id: *id, name: name.to_string() })
}

fn status(id: u64) -> Option<IdName> {
    STATUSES
        .iter()
        .find(|(sid, _, _)| *sid == id)
        .map(|(id, name, _)| IdName { id: *id, name: name.to_string() })
}

fn is_closed(issue: &Issue) -> bool {
    STATUSES
        .iter()
        .any(|(id, _, closed)| *id == issue.status.id && *closed)
}

fn user(id: u64) -> IdName {
    IdName {
        id,
        name: format!("User {id}"),
    }
}

/// Whether `issue` passes the list filters in `params`.
fn matches(issue: &Issue, params: &HashMap<String, String>) -> Result<bool, Response> {
    // A saved query carries its own status scope; the open default only
    // applies to ad-hoc listings.
    let has_saved_query = params.contains_key("query_id");
    let status_ok = match params.get("status_id").map(String::as_str) {
        None if has_saved_query => true,
        None | Some("open") => !is_closed(issue),
        Some("closed") => is_closed(issue),
        Some("*") => true,
        Some(id) => id.parse::<u64>().map(|id| id == issue.status.id).unwrap_or(false),
    };
    let saved_query_ok = match params.get("query_id").map(String::as_str) {
        None => true,
        Some("1") => !is_closed(issue),
        Some("2") => is_closed(issue),
        Some(_) => return Err(StatusCode::NOT_FOUND.into_response()),
    };
    let id_param = |name: &str, actual: Option<u64>| match params.get(name) {
        None => true,
        Some(expected) => actual.map(|a| a.to_string()) == Some(expected.clone()),
    };
    Ok(status_ok
        && saved_query_ok
        && id_param("project_id", Some(issue.project.id))
        && id_param("tracker_id", Some(issue.tracker.id))
        && id_param("assigned_to_id", issue.assigned_to.as_ref().map(|u| u.id)))
}

async fn list_issues(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);
    let offset = params.get("offset").and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);

    let store = db.read().await;
    let mut matched = Vec::new();
    for issue in store.issues.values() {
        match matches(issue, &params) {
            Ok(true) => matched.push(issue.clone()),
            Ok(false) => {}
            Err(resp) => return resp,
        }
    }
    let total_count = matched.len();
    let page: Vec<Issue> = matched.into_iter().skip(offset).take(limit).collect();
    info!(total_count, returned = page.len(), "listed issues");

    Json(json!({
        "issues": page,
        "total_count": total_count,
        "offset": offset,
        "limit": limit,
    }))
    .into_response()
}

async fn create_issue(State(db): State<Db>, headers: HeaderMap, Json(req): Json<IssueRequest>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let input = req.issue;

    let mut messages = Vec::new();
    let Some(project_id) = input.project_id else {
        return errors(StatusCode::UNPROCESSABLE_ENTITY, &["Project cannot be blank"]);
    };
    let subject = input.subject.unwrap_or_default();
    if subject.trim().is_empty() {
        messages.push("Subject cannot be blank");
    }
    let tracker = match tracker(input.tracker_id.unwrap_or(1)) {
        Some(t) => Some(t),
        None => {
            messages.push("Tracker is not included in the list");
            None
        }
    };
    let status = match status(input.status_id.unwrap_or(1)) {
        Some(s) => Some(s),
        None => {
            messages.push("Status is not included in the list");
            None
        }
    };
    let (Some(tracker), Some(status), true) = (tracker, status, messages.is_empty()) else {
        return errors(StatusCode::UNPROCESSABLE_ENTITY, &messages);
    };

    let mut store = db.write().await;
    let id = store.next_id;
    store.next_id += 1;
    let issue = Issue {
        id,
        project: IdName {
            id: project_id,
            name: format!("Project {project_id}"),
        },
        tracker,
        status,
        priority: IdName {
            id: 2,
            name: "Normal".to_string(),
        },
        author: user(1),
        assigned_to: input.assigned_to_id.map(user),
        subject,
        description: input.description.unwrap_or_default(),
        start_date: input.start_date,
        due_date: input.due_date,
        done_ratio: input.done_ratio.map(|r| r as u32).unwrap_or(0),
        custom_fields: input.custom_fields.unwrap_or_default(),
        created_on: TIMESTAMP.to_string(),
        updated_on: TIMESTAMP.to_string(),
        closed_on: None,
    };
    store.issues.insert(id, issue.clone());
    info!(id, "created issue");
    (StatusCode::CREATED, Json(json!({ "issue": issue }))).into_response()
}

async fn get_issue(State(db): State<Db>, headers: HeaderMap, Path(file): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let id = match issue_id(&file) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let store = db.read().await;
    match store.issues.get(&id) {
        Some(issue) => Json(json!({ "issue": issue })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_issue(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(file): Path<String>,
    Json(req): Json<IssueRequest>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let id = match issue_id(&file) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let input = req.issue;
    let mut store = db.write().await;
    let Some(stored) = store.issues.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Changes go to a copy that replaces the stored issue only once every
    // field has been accepted.
    let mut issue = stored.clone();
    let mut messages = Vec::new();
    if let Some(subject) = input.subject {
        if subject.trim().is_empty() {
            messages.push("Subject cannot be blank");
        }
        issue.subject = subject;
    }
    if let Some(tracker_id) = input.tracker_id {
        match tracker(tracker_id) {
            Some(t) => issue.tracker = t,
            None => messages.push("Tracker is not included in the list"),
        }
    }
    if let Some(status_id) = input.status_id {
        match status(status_id) {
            Some(s) => issue.status = s,
            None => messages.push("Status is not included in the list"),
        }
        issue.closed_on = is_closed(&issue).then(|| TIMESTAMP.to_string());
    }
    if !messages.is_empty() {
        return errors(StatusCode::UNPROCESSABLE_ENTITY, &messages);
    }
    if let Some(description) = input.description {
        issue.description = description;
    }
    if let Some(assigned_to_id) = input.assigned_to_id {
        issue.assigned_to = Some(user(assigned_to_id));
    }
    if let Some(due_date) = input.due_date {
        issue.due_date = Some(due_date);
    }
    if let Some(done_ratio) = input.done_ratio {
        issue.done_ratio = done_ratio as u32;
    }
    if let Some(custom_fields) = input.custom_fields {
        issue.custom_fields = custom_fields;
    }
    store.issues.insert(id, issue);
    info!(id, notes = input.notes.is_some(), "updated issue");
    StatusCode::OK.into_response()
}

async fn delete_issue(State(db): State<Db>, headers: HeaderMap, Path(file): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let id = match issue_id(&file) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mut store = db.write().await;
    match store.issues.remove(&id) {
        Some(_) => {
            info!(id, "deleted issue");
            StatusCode::OK.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status_id: u64) -> Issue {
        Issue {
            id: 1,
            project: IdName {
                id: 3,
                name: "Project 3".to_string(),
            },
            tracker: tracker(1).unwrap(),
            status: status(status_id).unwrap(),
            priority: IdName {
                id: 2,
                name: "Normal".to_string(),
            },
            author: user(1),
            assigned_to: None,
            subject: "Crash".to_string(),
            description: String::new(),
            start_date: None,
            due_date: None,
            done_ratio: 0,
            custom_fields: Vec::new(),
            created_on: TIMESTAMP.to_string(),
            updated_on: TIMESTAMP.to_string(),
            closed_on: None,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn issue_serializes_to_redmine_shape() {
        let json = serde_json::to_value(sample(1)).unwrap();
        assert_eq!(json["tracker"]["name"], "Bug");
        assert_eq!(json["status"]["name"], "New");
        assert!(json.get("assigned_to").is_none());
        assert!(json["closed_on"].is_null());
    }

    #[test]
    fn issue_id_requires_json_suffix() {
        assert_eq!(issue_id("12.json").unwrap(), 12);
        assert!(issue_id("12").is_err());
        assert!(issue_id("abc.json").is_err());
    }

    #[test]
    fn default_status_filter_is_open() {
        assert!(matches(&sample(1), &params(&[])).unwrap());
        assert!(!matches(&sample(5), &params(&[])).unwrap());
        assert!(matches(&sample(5), &params(&[("status_id", "*")])).unwrap());
        assert!(matches(&sample(5), &params(&[("status_id", "closed")])).unwrap());
        assert!(matches(&sample(2), &params(&[("status_id", "2")])).unwrap());
    }

    #[test]
    fn id_filters_compare_numerically_rendered_ids() {
        assert!(matches(&sample(1), &params(&[("project_id", "3")])).unwrap());
        assert!(!matches(&sample(1), &params(&[("project_id", "4")])).unwrap());
        assert!(!matches(&sample(1), &params(&[("assigned_to_id", "1")])).unwrap());
    }

    #[test]
    fn unknown_saved_query_is_rejected() {
        assert!(matches(&sample(1), &params(&[("query_id", "99")])).is_err());
        assert!(matches(&sample(5), &params(&[("query_id", "2"), ("status_id", "*")])).unwrap());
    }

    #[test]
    fn saved_query_decides_status_scope() {
        assert!(matches(&sample(5), &params(&[("query_id", "2")])).unwrap());
        assert!(!matches(&sample(1), &params(&[("query_id", "2")])).unwrap());
        assert!(matches(&sample(1), &params(&[("query_id", "1")])).unwrap());
        assert!(!matches(&sample(5), &params(&[("query_id", "1")])).unwrap());
    }

    #[test]
    fn issue_input_all_fields_optional() {
        let input: IssueInput = serde_json::from_str("{}").unwrap();
        assert!(input.subject.is_none());
        assert!(input.project_id.is_none());
    }
}
