//! Backend-neutral query expressions over knowledge records.
//!
//! A [`Query`] is built by the filter builder and the search operations, then
//! compiled to SQL by the repository backends or evaluated directly against
//! in-memory records by the mock store. Field names inside a query always come
//! from the static attribute table.

use regex::{Regex, RegexBuilder};

use super::error::FilterError;
use super::fields;
use super::record::{FieldValue, KnowledgeRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// All sub-queries match. An empty conjunction matches everything.
    And(Vec<Query>),
    /// At least one sub-query matches. An empty disjunction matches nothing.
    Or(Vec<Query>),
    /// Case-insensitive regular expression on a text attribute.
    Pattern {
        field: &'static str,
        pattern: String,
    },
    /// The stored list shares at least one element with `values`.
    AnyOf {
        field: &'static str,
        values: Vec<String>,
    },
    /// The stored list contains every element of `values`.
    AllOf {
        field: &'static str,
        values: Vec<String>,
    },
    /// Exact identifier match.
    Id(String),
}

impl Query {
    /// Builds a pattern query, rejecting patterns that do not compile.
    pub fn pattern(field: &'static str, pattern: impl Into<String>) -> Result<Self, FilterError> {
        let pattern = pattern.into();
        let invalid = |reason: String| FilterError::InvalidPattern {
            field: field.to_string(),
            reason,
        };
        compile(&pattern).map_err(|e| invalid(e.to_string()))?;
        if let Some(construct) = non_portable_construct(&pattern) {
            return Err(invalid(format!("unsupported regex construct `{}`", construct)));
        }
        Ok(Query::Pattern { field, pattern })
    }

    pub fn any_of(field: &'static str, values: Vec<String>) -> Self {
        Query::AnyOf { field, values }
    }

    pub fn all_of(field: &'static str, values: Vec<String>) -> Self {
        Query::AllOf { field, values }
    }

    /// Conjunction with nested conjunctions flattened and a single part
    /// unwrapped.
    pub fn and(parts: Vec<Query>) -> Self {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Query::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Query::And(flat)
        }
    }

    pub fn or(parts: Vec<Query>) -> Self {
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or(Query::Or(Vec::new()))
        } else {
            Query::Or(parts)
        }
    }

    /// Evaluates the query against a record held in memory.
    pub fn matches(&self, record: &KnowledgeRecord) -> Result<bool, regex::Error> {
        Ok(match self {
            Query::And(parts) => {
                for part in parts {
                    if !part.matches(record)? {
                        return Ok(false);
                    }
                }
                true
            }
            Query::Or(parts) => {
                for part in parts {
                    if part.matches(record)? {
                        return Ok(true);
                    }
                }
                false
            }
            Query::Pattern { field, pattern } => {
                let regex = compile(pattern)?;
                if *field == fields::ID {
                    regex.is_match(&record.id)
                } else {
                    match record.get(field) {
                        Some(FieldValue::Text(s)) => regex.is_match(s),
                        Some(FieldValue::List(items)) => items.iter().any(|s| regex.is_match(s)),
                        None => false,
                    }
                }
            }
            Query::AnyOf { field, values } => stored_items(record, field)
                .iter()
                .any(|item| values.iter().any(|v| v == item)),
            Query::AllOf { field, values } => {
                let stored = stored_items(record, field);
                !values.is_empty() && values.iter().all(|v| stored.contains(&v.as_str()))
            }
            Query::Id(id) => record.id == *id,
        })
    }
}

fn stored_items<'a>(record: &'a KnowledgeRecord, field: &str) -> Vec<&'a str> {
    match record.get(field) {
        Some(FieldValue::List(items)) => items.iter().map(String::as_str).collect(),
        Some(FieldValue::Text(s)) => vec![s.as_str()],
        None => Vec::new(),
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Finds syntax the `regex` crate accepts but PostgreSQL's `~*` rejects, such
/// as inline flag groups or `\p{..}` classes. `(?:` groups work in both.
fn non_portable_construct(pattern: &str) -> Option<&'static str> {
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('p') => return Some("\\p"),
                Some('P') => return Some("\\P"),
                Some('z') => return Some("\\z"),
                _ => {}
            },
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class && chars.peek() == Some(&'?') => {
                chars.next();
                if chars.peek() != Some(&':') {
                    return Some("(?");
                }
            }
            _ => {}
        }
    }
    None
}
