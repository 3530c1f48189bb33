//! Query-string access with repeated keys.
//!
//! Search endpoints take list parameters as repeated keys
//! (`?type=a&type=b`), which a plain struct deserializer does not collect.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

use crate::error::ApiError;

/// Raw query pairs in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Every non-empty value given for `key`.
    pub fn all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Every non-empty value given under any of `keys`.
    pub fn all_of_keys(&self, keys: &[&str]) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, v)| keys.contains(&k.as_str()) && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Every value given for `key`, including empty ones.
    pub fn raw(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// First non-empty value for `key`.
    pub fn first(&self, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    }

    /// The result cap from `nums`: absent means 0, negative clamps to 0.
    pub fn nums(&self) -> Result<usize, ApiError> {
        match self.first("nums") {
            None => Ok(0),
            Some(raw) => parse_nums(&raw),
        }
    }
}

/// Parses a result cap where zero or negative means unbounded.
pub fn parse_nums(raw: &str) -> Result<usize, ApiError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid nums parameter".to_string()))?;
    Ok(usize::try_from(value).unwrap_or(0))
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(QueryParams(pairs))
    }
}
