//! Sparse structured filters and the builder that turns them into a
//! [`Query`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::FilterError;
use super::fields::{self, FieldKind, MatchKind};
use super::query::Query;

/// A filter value as supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn is_empty(&self) -> bool {
        match self {
            FilterValue::One(s) => s.is_empty(),
            FilterValue::Many(items) => items.iter().all(String::is_empty),
        }
    }
}

/// Sparse mapping from attribute name to value, plus nested filters that are
/// combined conjunctively with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFilter {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FilterValue>,
    #[serde(rename = "AND", default, skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<KnowledgeFilter>,
}

impl KnowledgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(name.into(), FilterValue::One(value.into()));
        self
    }

    pub fn with_list<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.insert(
            name.into(),
            FilterValue::Many(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn with_and(mut self, sub: KnowledgeFilter) -> Self {
        self.and.push(sub);
        self
    }

    /// Values given for `tags` at the top level.
    pub fn tags(&self) -> Vec<String> {
        match self.fields.get(fields::TAGS) {
            Some(FilterValue::One(s)) if !s.is_empty() => vec![s.clone()],
            Some(FilterValue::Many(items)) => {
                items.iter().filter(|s| !s.is_empty()).cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Builds one flat conjunction from every populated field here and in the
    /// nested `AND` filters.
    ///
    /// Returns [`FilterError::Empty`] when nothing is populated; an empty
    /// filter is never turned into a match-everything query.
    pub fn to_query(&self) -> Result<Query, FilterError> {
        let mut parts = Vec::new();
        self.collect(&mut parts)?;
        if parts.is_empty() {
            return Err(FilterError::Empty);
        }
        Ok(Query::and(parts))
    }

    fn collect(&self, parts: &mut Vec<Query>) -> Result<(), FilterError> {
        for (name, value) in &self.fields {
            if value.is_empty() {
                continue;
            }
            let spec =
                fields::lookup(name).ok_or_else(|| FilterError::UnknownField(name.clone()))?;
            parts.push(constraint(spec.name, spec.kind, value)?);
        }
        for sub in &self.and {
            sub.collect(parts)?;
        }
        Ok(())
    }
}

fn constraint(
    field: &'static str,
    kind: FieldKind,
    value: &FilterValue,
) -> Result<Query, FilterError> {
    let mismatch = |expected: &'static str| FilterError::KindMismatch {
        field: field.to_string(),
        expected,
    };

    match (kind.match_kind(), value) {
        (MatchKind::Exact, FilterValue::One(id)) => Ok(Query::Id(id.clone())),
        (MatchKind::Exact, FilterValue::Many(_)) => Err(mismatch("a single identifier")),
        (MatchKind::Pattern, FilterValue::One(pattern)) => Query::pattern(field, pattern.clone()),
        (MatchKind::Pattern, FilterValue::Many(_)) => Err(mismatch("a single string")),
        (MatchKind::AnyOf, FilterValue::One(v)) => Ok(Query::any_of(field, vec![v.clone()])),
        (MatchKind::AnyOf, FilterValue::Many(values)) => Ok(Query::any_of(
            field,
            values.iter().filter(|v| !v.is_empty()).cloned().collect(),
        )),
    }
}
