//! Knowledge record model.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::error::KnowledgeError;
use super::fields::{self, FieldKind};

/// Value of a single record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Empty strings and empty lists carry no information.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// A stored knowledge entry: an identifier plus sparse attributes.
///
/// Serializes as a flat JSON object with the attribute names from
/// [`fields::FIELDS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl KnowledgeRecord {
    /// Creates an empty record with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets an attribute, dropping it when the value is empty.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        if value.is_empty() {
            self.fields.remove(name);
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Returns a list attribute, or an empty slice when absent.
    pub fn list(&self, name: &str) -> &[String] {
        self.get(name).and_then(FieldValue::as_list).unwrap_or(&[])
    }
}

/// Generates a 24-hex-character identifier: seconds since the epoch followed
/// by random bytes, so identifiers sort roughly by creation time.
pub fn generate_record_id() -> String {
    let seconds = Utc::now().timestamp() as u32;
    let random = Uuid::new_v4().simple().to_string();
    format!("{:08x}{}", seconds, &random[..16])
}

/// Decoded body of a create or update request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordInput {
    pub id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RecordInput {
    /// Decodes a loose JSON object against the attribute table.
    ///
    /// Unknown names are dropped. A list given for a text attribute, or a
    /// non-string value, is rejected. A single string for a list attribute
    /// becomes a one-element list.
    pub fn from_json(body: &serde_json::Map<String, Value>) -> Result<Self, KnowledgeError> {
        let mut input = RecordInput::default();

        for (name, value) in body {
            if value.is_null() {
                continue;
            }
            if name == fields::ID {
                match value {
                    Value::String(id) if !id.is_empty() => input.id = Some(id.clone()),
                    Value::String(_) => {}
                    _ => {
                        return Err(KnowledgeError::InvalidInput(
                            "id must be a string".to_string(),
                        ))
                    }
                }
                continue;
            }

            let Some(spec) = fields::lookup_attribute(name) else {
                debug!(field = %name, "Ignoring unknown knowledge attribute");
                continue;
            };

            let decoded = match (spec.kind, value) {
                (FieldKind::Text, Value::String(s)) => FieldValue::Text(s.clone()),
                (FieldKind::List, Value::String(s)) => FieldValue::List(vec![s.clone()]),
                (FieldKind::List, Value::Array(items)) => {
                    FieldValue::List(string_items(name, items)?)
                }
                _ => {
                    return Err(KnowledgeError::InvalidInput(format!(
                        "field '{}' expects {}",
                        name,
                        describe(spec.kind)
                    )))
                }
            };

            if !decoded.is_empty() {
                input.fields.insert(name.clone(), decoded);
            }
        }

        Ok(input)
    }

    /// Turns the input into a record, generating an id when absent.
    pub fn into_record(self) -> KnowledgeRecord {
        KnowledgeRecord {
            id: self.id.unwrap_or_else(generate_record_id),
            fields: self.fields,
        }
    }
}

fn string_items(name: &str, items: &[Value]) -> Result<Vec<String>, KnowledgeError> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(KnowledgeError::InvalidInput(format!(
                "field '{}' expects a list of strings",
                name
            ))),
        })
        .collect()
}

fn describe(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "a string",
        FieldKind::List => "a list of strings",
        FieldKind::Identifier => "an identifier string",
    }
}

/// Attribute changes applied atomically to one stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub set: BTreeMap<String, FieldValue>,
    pub unset: Vec<String>,
}

impl RecordPatch {
    /// A patch that leaves exactly `fields` on the document.
    pub fn replace_all(fields: BTreeMap<String, FieldValue>) -> Self {
        let unset = fields::FIELDS
            .iter()
            .map(|spec| spec.name)
            .filter(|name| !fields.contains_key(*name))
            .map(str::to_string)
            .collect();
        Self { set: fields, unset }
    }

    /// A patch touching a single attribute; empty values unset it.
    pub fn field(name: &str, value: FieldValue) -> Self {
        let mut patch = Self::default();
        if value.is_empty() {
            patch.unset.push(name.to_string());
        } else {
            patch.set.insert(name.to_string(), value);
        }
        patch
    }

    /// Applies the patch to an in-memory record.
    pub fn apply(&self, record: &mut KnowledgeRecord) {
        for name in &self.unset {
            record.fields.remove(name);
        }
        for (name, value) in &self.set {
            record.set(name, value.clone());
        }
    }
}
