//! Knowledge record repository.
//!
//! Records are stored one JSON document per row in the `knowledge` table and
//! queried by compiling a [`Query`] into a SQL predicate over that document.
//! Both SQLite and PostgreSQL are supported.

use super::DbError;
use crate::knowledge::{KnowledgeRecord, Query, RecordPatch};
use async_trait::async_trait;

#[cfg(feature = "database")]
use super::DbPool;
#[cfg(feature = "database")]
use crate::knowledge::FieldValue;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
#[cfg(feature = "database")]
use std::collections::BTreeMap;

/// Repository trait for knowledge record persistence.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Returns records matching `query` in insertion order. A `limit` of 0
    /// means unbounded.
    async fn find(&self, query: &Query, limit: usize) -> Result<Vec<KnowledgeRecord>, DbError>;

    /// Gets a record by identifier.
    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, DbError>;

    /// Inserts a new record. A duplicate identifier is a constraint violation.
    async fn insert(&self, record: &KnowledgeRecord) -> Result<KnowledgeRecord, DbError>;

    /// Applies a patch to one stored record.
    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<(), DbError>;

    /// Deletes a record, returning the number of rows removed.
    async fn delete(&self, id: &str) -> Result<u64, DbError>;
}

// ============================================================================
// Query compilation
// ============================================================================

#[cfg(feature = "database")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
}

#[cfg(feature = "database")]
#[derive(Debug, Clone, PartialEq)]
enum SqlArg {
    Text(String),
    TextArray(Vec<String>),
    Int(i64),
}

/// A compiled WHERE predicate with its bind arguments in order.
#[cfg(feature = "database")]
#[derive(Debug)]
struct Predicate {
    dialect: Dialect,
    sql: String,
    args: Vec<SqlArg>,
}

#[cfg(feature = "database")]
impl Predicate {
    fn compile(query: &Query, dialect: Dialect) -> Self {
        let mut predicate = Predicate {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        };
        predicate.push(query);
        predicate
    }

    fn placeholder(&mut self, arg: SqlArg) -> String {
        self.args.push(arg);
        match self.dialect {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", self.args.len()),
        }
    }

    fn push(&mut self, query: &Query) {
        match query {
            Query::And(parts) => self.push_group(parts, " AND ", "1 = 1"),
            Query::Or(parts) => self.push_group(parts, " OR ", "1 = 0"),
            Query::Id(id) => {
                let p = self.placeholder(SqlArg::Text(id.clone()));
                self.sql.push_str(&format!("id = {}", p));
            }
            Query::Pattern { field, pattern } => match self.dialect {
                Dialect::Sqlite => {
                    let p = self.placeholder(SqlArg::Text(format!("(?i){}", pattern)));
                    // An absent attribute never satisfies a pattern, even one matching "".
                    self.sql.push_str(&format!(
                        "(CASE WHEN json_type(document, '$.{f}') = 'text' \
                         THEN json_extract(document, '$.{f}') REGEXP {p} ELSE 0 END)",
                        f = field,
                        p = p
                    ));
                }
                Dialect::Postgres => {
                    let p = self.placeholder(SqlArg::Text(pattern.clone()));
                    self.sql.push_str(&format!(
                        "(document ? '{f}' AND document->>'{f}' ~* {p})",
                        f = field,
                        p = p
                    ));
                }
            },
            Query::AnyOf { values, .. } | Query::AllOf { values, .. } if values.is_empty() => {
                self.sql.push_str("1 = 0");
            }
            Query::AnyOf { field, values } => match self.dialect {
                Dialect::Sqlite => {
                    let list = self.placeholders(values);
                    self.sql.push_str(&format!(
                        "EXISTS (SELECT 1 FROM json_each(knowledge.document, '$.{}') AS item \
                         WHERE item.value IN ({}))",
                        field, list
                    ));
                }
                Dialect::Postgres => {
                    let p = self.placeholder(SqlArg::TextArray(values.clone()));
                    self.sql
                        .push_str(&format!("(document->'{}') ?| {}::text[]", field, p));
                }
            },
            Query::AllOf { field, values } => match self.dialect {
                Dialect::Sqlite => {
                    let mut distinct = values.clone();
                    distinct.sort();
                    distinct.dedup();
                    let list = self.placeholders(&distinct);
                    let count = self.placeholder(SqlArg::Int(distinct.len() as i64));
                    self.sql.push_str(&format!(
                        "(SELECT COUNT(DISTINCT item.value) FROM json_each(knowledge.document, '$.{}') AS item \
                         WHERE item.value IN ({})) = {}",
                        field, list, count
                    ));
                }
                Dialect::Postgres => {
                    let p = self.placeholder(SqlArg::TextArray(values.clone()));
                    self.sql
                        .push_str(&format!("(document->'{}') ?& {}::text[]", field, p));
                }
            },
        }
    }

    fn push_group(&mut self, parts: &[Query], joiner: &str, empty: &str) {
        if parts.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(joiner);
            }
            self.push(part);
        }
        self.sql.push(')');
    }

    fn placeholders(&mut self, values: &[String]) -> String {
        values
            .iter()
            .map(|v| self.placeholder(SqlArg::Text(v.clone())))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(feature = "database")]
macro_rules! bind_sqlite_args {
    ($builder:expr, $args:expr) => {{
        let mut builder = $builder;
        for arg in $args {
            builder = match arg {
                SqlArg::Text(s) => builder.bind(s.clone()),
                SqlArg::TextArray(items) => {
                    for item in items {
                        builder = builder.bind(item.clone());
                    }
                    builder
                }
                SqlArg::Int(n) => builder.bind(*n),
            };
        }
        builder
    }};
}

#[cfg(feature = "database")]
macro_rules! bind_pg_args {
    ($builder:expr, $args:expr) => {{
        let mut builder = $builder;
        for arg in $args {
            builder = match arg {
                SqlArg::Text(s) => builder.bind(s.clone()),
                SqlArg::TextArray(items) => builder.bind(items.clone()),
                SqlArg::Int(n) => builder.bind(*n),
            };
        }
        builder
    }};
}

// ============================================================================
// SQLite
// ============================================================================

/// SQLite implementation of KnowledgeRepository.
///
/// Requires connections with the `REGEXP` function registered, see
/// [`crate::db::create_pool`].
#[cfg(feature = "database")]
pub struct SqliteKnowledgeRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteKnowledgeRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl KnowledgeRepository for SqliteKnowledgeRepository {
    async fn find(&self, query: &Query, limit: usize) -> Result<Vec<KnowledgeRecord>, DbError> {
        let predicate = Predicate::compile(query, Dialect::Sqlite);
        let mut sql = format!(
            "SELECT id, document FROM knowledge WHERE {} ORDER BY rowid",
            predicate.sql
        );
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let rows: Vec<KnowledgeRow> =
            bind_sqlite_args!(sqlx::query_as::<_, KnowledgeRow>(&sql), &predicate.args)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, DbError> {
        let row: Option<KnowledgeRow> =
            sqlx::query_as("SELECT id, document FROM knowledge WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<KnowledgeRecord, DbError> {
        let document = serde_json::to_string(&record.fields)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO knowledge (id, document, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&document)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(record.clone())
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<(), DbError> {
        let mut document = String::from("document");
        let mut binds = Vec::with_capacity(patch.set.len());

        if !patch.set.is_empty() {
            let mut expr = String::from("json_set(document");
            for (name, value) in &patch.set {
                expr.push_str(&format!(", '$.{}', json(?)", checked_name(name)?));
                binds.push(serde_json::to_string(value)?);
            }
            expr.push(')');
            document = expr;
        }

        if !patch.unset.is_empty() {
            let paths = patch
                .unset
                .iter()
                .map(|name| checked_name(name).map(|n| format!("'$.{}'", n)))
                .collect::<Result<Vec<_>, _>>()?;
            document = format!("json_remove({}, {})", document, paths.join(", "));
        }

        let sql = format!(
            "UPDATE knowledge SET document = {}, updated_at = ? WHERE id = ?",
            document
        );

        let mut builder = sqlx::query(&sql);
        for bind in &binds {
            builder = builder.bind(bind);
        }
        let result = builder
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::record_not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM knowledge WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL implementation of KnowledgeRepository.
#[cfg(feature = "database")]
pub struct PgKnowledgeRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgKnowledgeRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl KnowledgeRepository for PgKnowledgeRepository {
    async fn find(&self, query: &Query, limit: usize) -> Result<Vec<KnowledgeRecord>, DbError> {
        let predicate = Predicate::compile(query, Dialect::Postgres);
        let mut sql = format!(
            "SELECT id, document FROM knowledge WHERE {} ORDER BY seq",
            predicate.sql
        );
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let rows: Vec<PgKnowledgeRow> =
            bind_pg_args!(sqlx::query_as::<_, PgKnowledgeRow>(&sql), &predicate.args)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, DbError> {
        let row: Option<PgKnowledgeRow> =
            sqlx::query_as("SELECT id, document FROM knowledge WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<KnowledgeRecord, DbError> {
        let now: DateTime<Utc> = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO knowledge (id, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.id)
        .bind(sqlx::types::Json(&record.fields))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(record.clone())
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<(), DbError> {
        for name in patch.set.keys().chain(patch.unset.iter()) {
            checked_name(name)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE knowledge
            SET document = (document || $1) - $2::text[], updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(sqlx::types::Json(&patch.set))
        .bind(&patch.unset)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::record_not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM knowledge WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Patch keys end up inside SQL path literals, so only table names pass.
#[cfg(feature = "database")]
fn checked_name(name: &str) -> Result<&'static str, DbError> {
    crate::knowledge::fields::lookup_attribute(name)
        .map(|spec| spec.name)
        .ok_or_else(|| DbError::Query(format!("unknown knowledge attribute '{}'", name)))
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_knowledge_repository(pool: &DbPool) -> Box<dyn KnowledgeRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteKnowledgeRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgKnowledgeRepository::new(pool.clone())),
    }
}

// ============================================================================
// Row Mapping Types
// ============================================================================

#[cfg(feature = "database")]
fn decode_document(id: String, document: BTreeMap<String, FieldValue>) -> KnowledgeRecord {
    KnowledgeRecord {
        id,
        fields: document
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect(),
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct KnowledgeRow {
    id: String,
    document: String,
}

#[cfg(feature = "database")]
impl TryFrom<KnowledgeRow> for KnowledgeRecord {
    type Error = DbError;

    fn try_from(row: KnowledgeRow) -> Result<Self, Self::Error> {
        let document = serde_json::from_str(&row.document)?;
        Ok(decode_document(row.id, document))
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgKnowledgeRow {
    id: String,
    document: serde_json::Value,
}

#[cfg(feature = "database")]
impl TryFrom<PgKnowledgeRow> for KnowledgeRecord {
    type Error = DbError;

    fn try_from(row: PgKnowledgeRow) -> Result<Self, Self::Error> {
        let document = serde_json::from_value(row.document)?;
        Ok(decode_document(row.id, document))
    }
}
