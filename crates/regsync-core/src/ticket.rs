//! Ticket records as returned by the tracker's REST API.
//!
//! Every field other than `id` is optional on the wire. A value of the wrong
//! shape reads as absent instead of failing the whole record, and accessors
//! return an empty string for anything absent so row derivation never has to
//! branch on missing data.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RECORD_TYPE: &str = "Record Type";
pub const QA_OWNER: &str = "QA Owner";
pub const FAUCET: &str = "Faucet";
pub const EFFORTS_DEV: &str = "Efforts Dev";

// ---------------------------------------------------------------------------
// Tolerant decoding
// ---------------------------------------------------------------------------

/// Decode `T`, or its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Decode a list element by element. A non-list reads as empty and elements
/// that cannot be decoded at all are dropped.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Ticket ids arrive as numbers, occasionally as numeric strings.
fn ticket_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ticket id {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid ticket id '{s}'"))),
        other => Err(serde::de::Error::custom(format!("invalid ticket id {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// An enumerated tracker value such as a status, resolution or category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
}

/// A value carried by a custom field or a history entry. The tracker sends
/// enumerated values as objects and free-form ones as scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Labelled(Reference),
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn label(&self) -> Option<&str> {
        match self {
            FieldValue::Labelled(r) => r.label.as_deref(),
            _ => None,
        }
    }

    /// Cell text for this value.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Labelled(r) => r
                .label
                .as_deref()
                .or(r.name.as_deref())
                .unwrap_or_default()
                .to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Other(serde_json::Value::Bool(b)) => b.to_string(),
            FieldValue::Other(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default, deserialize_with = "lenient")]
    pub field: FieldDescriptor,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user: Option<Person>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldDescriptor>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<FieldValue>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub new_value: Option<FieldValue>,
}

impl HistoryEntry {
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_ref()?.name.as_deref()
    }

    pub fn field_label(&self) -> Option<&str> {
        self.field.as_ref()?.label.as_deref()
    }

    pub fn user_name(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|u| u.real_name.as_deref())
            .unwrap_or_default()
    }

    pub fn created_at(&self) -> &str {
        self.created_at.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(deserialize_with = "ticket_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub project: Option<Reference>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category: Option<Reference>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub handler: Option<Person>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Reference>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<Reference>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Reference>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq", skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    #[serde(default, deserialize_with = "lenient_seq", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "lenient_seq", skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

fn name_of(r: &Option<Reference>) -> &str {
    r.as_ref().and_then(|r| r.name.as_deref()).unwrap_or_default()
}

fn label_of(r: &Option<Reference>) -> &str {
    r.as_ref().and_then(|r| r.label.as_deref()).unwrap_or_default()
}

impl Ticket {
    /// Value of the first custom field named `name`, or `""`.
    pub fn custom_field(&self, name: &str) -> String {
        self.custom_fields
            .iter()
            .find(|cf| cf.field.name.as_deref() == Some(name))
            .and_then(|cf| cf.value.as_ref())
            .map(FieldValue::to_text)
            .unwrap_or_default()
    }

    pub fn record_type(&self) -> String {
        self.custom_field(RECORD_TYPE)
    }

    pub fn qa_owner(&self) -> String {
        self.custom_field(QA_OWNER)
    }

    pub fn faucet(&self) -> String {
        self.custom_field(FAUCET)
    }

    pub fn efforts_dev(&self) -> String {
        self.custom_field(EFFORTS_DEV)
    }

    pub fn category_name(&self) -> &str {
        name_of(&self.category)
    }

    pub fn project_name(&self) -> &str {
        name_of(&self.project)
    }

    pub fn summary(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }

    pub fn handler_name(&self) -> &str {
        self.handler
            .as_ref()
            .and_then(|h| h.real_name.as_deref())
            .unwrap_or_default()
    }

    pub fn resolution_label(&self) -> &str {
        label_of(&self.resolution)
    }

    pub fn status_label(&self) -> &str {
        label_of(&self.status)
    }

    pub fn priority_label(&self) -> &str {
        label_of(&self.priority)
    }

    pub fn created_at(&self) -> &str {
        self.created_at.as_deref().unwrap_or_default()
    }
}
