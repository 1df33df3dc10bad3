//! Domain types for the Redmine issues API.
//!
//! # Design
//! Redmine omits or nulls any field it has no value for, so every `Issue`
//! field decodes to its default when missing. On the way out, zero ids,
//! absent references and empty collections are skipped so create and update
//! payloads only carry what the caller set.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A reference to another resource by id and display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl IdName {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// A reference to another resource by id only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Id {
    pub id: u64,
}

/// A single tracked work item.
///
/// `id` is zero until the server assigns one on creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub project_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<IdName>,
    #[serde(skip_serializing_if = "is_zero")]
    pub tracker_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<IdName>,
    #[serde(rename = "parent_issue_id", skip_serializing_if = "is_zero")]
    pub parent_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Id>,
    #[serde(skip_serializing_if = "is_zero")]
    pub status_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IdName>,
    #[serde(skip_serializing_if = "is_zero")]
    pub priority_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<IdName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<IdName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<IdName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<IdName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<IdName>,
    #[serde(skip_serializing_if = "is_zero")]
    pub category_id: u64,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub notes: String,

    // Dates are service-formatted strings and are passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_on: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub done_ratio: f32,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub uploads: Vec<Upload>,
}

impl Issue {
    /// Human-readable label `"<tracker> #<id>: <subject>"`.
    ///
    /// Returns `None` when the issue was built without a tracker reference.
    /// Issues fetched from the server always carry one.
    pub fn title(&self) -> Option<String> {
        self.tracker
            .as_ref()
            .map(|tracker| format!("{} #{}: {}", tracker.name, self.id, self.subject))
    }
}

/// A custom field value attached to an issue.
///
/// The shape of `value` follows `multiple`: single-valued fields carry one
/// scalar, multi-valued fields carry a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCustomField", into = "RawCustomField")]
pub struct CustomField {
    pub id: u64,
    pub name: String,
    pub value: CustomFieldValue,
}

impl CustomField {
    pub fn single(id: u64, value: &str) -> Self {
        Self {
            id,
            name: String::new(),
            value: CustomFieldValue::Single(value.to_string()),
        }
    }

    pub fn multiple(id: u64, values: &[&str]) -> Self {
        Self {
            id,
            name: String::new(),
            value: CustomFieldValue::Multiple(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.value, CustomFieldValue::Multiple(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomFieldValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Wire form of `CustomField`: the `multiple` flag travels next to an
/// untyped value.
#[derive(Serialize, Deserialize)]
struct RawCustomField {
    id: u64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    multiple: bool,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawCustomField> for CustomField {
    type Error = String;

    fn try_from(raw: RawCustomField) -> Result<Self, Self::Error> {
        let value = match (raw.multiple, raw.value) {
            (true, Value::Array(items)) => CustomFieldValue::Multiple(
                items
                    .into_iter()
                    .map(|item| scalar_text(raw.id, item))
                    .collect::<Result<_, _>>()?,
            ),
            (true, Value::Null) => CustomFieldValue::Multiple(Vec::new()),
            (true, scalar) => CustomFieldValue::Multiple(vec![scalar_text(raw.id, scalar)?]),
            (false, Value::Array(_)) => {
                return Err(format!(
                    "custom field {} is single-valued but received a list",
                    raw.id
                ))
            }
            (false, scalar) => CustomFieldValue::Single(scalar_text(raw.id, scalar)?),
        };
        Ok(Self {
            id: raw.id,
            name: raw.name,
            value,
        })
    }
}

impl From<CustomField> for RawCustomField {
    fn from(field: CustomField) -> Self {
        let (multiple, value) = match field.value {
            CustomFieldValue::Single(v) => (false, Value::String(v)),
            CustomFieldValue::Multiple(vs) => (true, Value::Array(vs.into_iter().map(Value::String).collect())),
        };
        Self {
            id: field.id,
            name: field.name,
            multiple,
            value,
        }
    }
}

fn scalar_text(field_id: u64, value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("custom field {field_id} has a non-scalar value: {other}")),
    }
}

/// A file previously uploaded to the server, attached by token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Criteria for listing issues.
///
/// Unset or empty criteria are left out of the query entirely. Extra criteria
/// are kept ordered by key so the rendered query is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub project_id: Option<String>,
    pub subproject_id: Option<String>,
    pub tracker_id: Option<String>,
    pub status_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub updated_on: Option<String>,
    pub extra_filters: BTreeMap<String, String>,
}

impl IssueFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, id: impl fmt::Display) -> Self {
        self.project_id = Some(id.to_string());
        self
    }

    pub fn subproject(mut self, id: impl fmt::Display) -> Self {
        self.subproject_id = Some(id.to_string());
        self
    }

    pub fn tracker(mut self, id: impl fmt::Display) -> Self {
        self.tracker_id = Some(id.to_string());
        self
    }

    pub fn status(mut self, id: impl fmt::Display) -> Self {
        self.status_id = Some(id.to_string());
        self
    }

    pub fn assigned_to(mut self, id: impl fmt::Display) -> Self {
        self.assigned_to_id = Some(id.to_string());
        self
    }

    pub fn updated_on(mut self, expr: &str) -> Self {
        self.updated_on = Some(expr.to_string());
        self
    }

    pub fn extra(mut self, key: &str, value: &str) -> Self {
        self.extra_filters.insert(key.to_string(), value.to_string());
        self
    }

    /// Scalar criteria in query order, paired with their parameter names.
    pub(crate) fn scalar_criteria(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("project_id", self.project_id.as_deref()),
            ("subproject_id", self.subproject_id.as_deref()),
            ("tracker_id", self.tracker_id.as_deref()),
            ("status_id", self.status_id.as_deref()),
            ("assigned_to_id", self.assigned_to_id.as_deref()),
            ("updated_on", self.updated_on.as_deref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct IssueRequest<'a> {
    pub issue: &'a Issue,
}

#[derive(Deserialize)]
pub(crate) struct IssueEnvelope {
    pub issue: Issue,
}

#[derive(Deserialize)]
pub(crate) struct IssuesEnvelope {
    pub issues: Vec<Issue>,
}

#[derive(Deserialize)]
pub(crate) struct ErrorsEnvelope {
    pub errors: Vec<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn issue_decodes_service_representation() {
        let issue: Issue = serde_json::from_value(json!({
            "id": 7,
            "project": {"id": 1, "name": "Platform"},
            "tracker": {"id": 1, "name": "Bug"},
            "status": {"id": 2, "name": "In Progress"},
            "priority": {"id": 4, "name": "Urgent"},
            "author": {"id": 3, "name": "Robin Doe"},
            "parent": {"id": 5},
            "subject": "Crash",
            "description": null,
            "start_date": "2024-01-02",
            "due_date": null,
            "done_ratio": 30,
            "estimated_hours": 2.5,
            "created_on": "2024-01-02T10:00:00Z",
            "updated_on": "2024-01-03T10:00:00Z",
            "closed_on": null,
            "custom_fields": [{"id": 9, "name": "Severity", "value": "High"}]
        }))
        .unwrap();

        assert_eq!(issue.id, 7);
        assert_eq!(issue.subject, "Crash");
        assert_eq!(issue.description, "");
        assert_eq!(issue.project, Some(IdName::new(1, "Platform")));
        assert_eq!(issue.parent, Some(Id { id: 5 }));
        assert_eq!(issue.due_date, None);
        assert_eq!(issue.start_date.as_deref(), Some("2024-01-02"));
        assert_eq!(issue.done_ratio, 30.0);
        assert_eq!(issue.estimated_hours, Some(2.5));
        assert_eq!(issue.custom_fields[0].value, CustomFieldValue::Single("High".to_string()));
        assert!(issue.uploads.is_empty());
    }

    #[test]
    fn new_issue_serializes_only_set_fields() {
        let issue = Issue {
            subject: "Broken login".to_string(),
            project_id: 1,
            tracker_id: 2,
            ..Default::default()
        };
        let body = serde_json::to_value(&issue).unwrap();
        assert_eq!(
            body,
            json!({
                "subject": "Broken login",
                "description": "",
                "project_id": 1,
                "tracker_id": 2,
                "done_ratio": 0.0
            })
        );
    }

    #[test]
    fn parent_id_uses_service_name() {
        let issue = Issue {
            parent_id: 12,
            ..Default::default()
        };
        let body = serde_json::to_value(&issue).unwrap();
        assert_eq!(body["parent_issue_id"], 12);
        assert!(body.get("parent_id").is_none());
    }

    #[test]
    fn title_uses_tracker_id_and_subject() {
        let issue = Issue {
            id: 7,
            subject: "Crash".to_string(),
            tracker: Some(IdName::new(1, "Bug")),
            ..Default::default()
        };
        assert_eq!(issue.title().as_deref(), Some("Bug #7: Crash"));
    }

    #[test]
    fn title_requires_tracker() {
        let issue = Issue {
            id: 7,
            subject: "Crash".to_string(),
            ..Default::default()
        };
        assert_eq!(issue.title(), None);
    }

    #[test]
    fn multiple_custom_field_decodes_list() {
        let field: CustomField =
            serde_json::from_value(json!({"id": 3, "name": "OS", "multiple": true, "value": ["linux", "mac"]}))
                .unwrap();
        assert_eq!(
            field.value,
            CustomFieldValue::Multiple(vec!["linux".to_string(), "mac".to_string()])
        );
        assert!(field.is_multiple());
    }

    #[test]
    fn multiple_custom_field_wraps_scalar_and_null() {
        let field: CustomField =
            serde_json::from_value(json!({"id": 3, "multiple": true, "value": "linux"})).unwrap();
        assert_eq!(field.value, CustomFieldValue::Multiple(vec!["linux".to_string()]));

        let field: CustomField =
            serde_json::from_value(json!({"id": 3, "multiple": true, "value": null})).unwrap();
        assert_eq!(field.value, CustomFieldValue::Multiple(Vec::new()));
    }

    #[test]
    fn single_custom_field_accepts_numbers_and_null() {
        let field: CustomField = serde_json::from_value(json!({"id": 4, "value": 12})).unwrap();
        assert_eq!(field.value, CustomFieldValue::Single("12".to_string()));

        let field: CustomField = serde_json::from_value(json!({"id": 4, "value": null})).unwrap();
        assert_eq!(field.value, CustomFieldValue::Single(String::new()));
    }

    #[test]
    fn single_custom_field_rejects_list() {
        let result: Result<CustomField, _> =
            serde_json::from_value(json!({"id": 4, "multiple": false, "value": ["a"]}));
        assert!(result.is_err());
    }

    #[test]
    fn custom_field_serializes_flag_only_when_multiple() {
        let single = serde_json::to_value(CustomField::single(4, "High")).unwrap();
        assert_eq!(single, json!({"id": 4, "value": "High"}));

        let multiple = serde_json::to_value(CustomField::multiple(3, &["linux", "mac"])).unwrap();
        assert_eq!(multiple, json!({"id": 3, "multiple": true, "value": ["linux", "mac"]}));
    }

    #[test]
    fn upload_skips_empty_fields() {
        let upload = Upload {
            token: "7167.ed1ccdb093229ca1bd0b043618d88743".to_string(),
            filename: "image.png".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(&upload).unwrap();
        assert_eq!(
            body,
            json!({"token": "7167.ed1ccdb093229ca1bd0b043618d88743", "filename": "image.png"})
        );
    }

    #[test]
    fn filter_builder_sets_criteria() {
        let filter = IssueFilter::new().project(3).status("open").extra("priority_id", "4");
        assert_eq!(filter.project_id.as_deref(), Some("3"));
        assert_eq!(filter.status_id.as_deref(), Some("open"));
        assert_eq!(filter.extra_filters.get("priority_id").map(String::as_str), Some("4"));
    }
}
