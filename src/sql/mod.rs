//! Read-only SQL evidence tool
//!
//! Structured facts come from a SQLite research database. Every query goes
//! through `guard_sql` and every result carries a `sql:` evidence id derived
//! from the exact guarded query text.

use crate::config::{expand_path, SqlConfig};
use crate::error::{CitelineError, Result};
use crate::ids::{short_hash, EvidenceRef, SQL_HASH_LEN};
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const TOOL_NAME: &str = "citeline.read_query";

/// Where a result came from and under which guardrails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlMeta {
    pub tool: String,
    pub db_path: PathBuf,
    pub max_limit: usize,
    pub allowlisted_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    /// Guarded query actually executed
    pub query: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub meta: SqlMeta,
    pub sql_evidence_id: EvidenceRef,
}

/// Compiled guardrail patterns
#[derive(Debug, Clone)]
pub struct SqlGuard {
    forbidden: Regex,
    limit_keyword: Regex,
    trailing_limit: Regex,
    tables: Vec<(String, Regex)>,
    max_limit: usize,
}

impl SqlGuard {
    pub fn new(allowed_tables: &[String], max_limit: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| CitelineError::Config(format!("Invalid SQL guard pattern: {}", e)))
        };

        let mut tables = Vec::with_capacity(allowed_tables.len());
        for table in allowed_tables {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(table));
            tables.push((table.clone(), compile(&pattern)?));
        }

        Ok(Self {
            forbidden: compile(
                r"(?i)\b(insert|update|delete|drop|alter|create|attach|pragma|exec)\b",
            )?,
            limit_keyword: compile(r"(?i)\blimit\b")?,
            trailing_limit: compile(r"(?i)^limit\s+(\d+)(\s+offset\s+\d+)?$")?,
            tables,
            max_limit,
        })
    }

    /// Validate `sql` and return the query to execute, with its LIMIT
    /// appended or lowered to `max_limit`
    pub fn guard(&self, sql: &str) -> Result<String> {
        let query = sql.trim().trim_end_matches(';').trim_end();

        if !query.to_lowercase().starts_with("select") {
            return Err(CitelineError::SqlRejected(
                "Only SELECT queries are allowed".to_string(),
            ));
        }
        if query.contains(';') {
            return Err(CitelineError::SqlRejected(
                "Multiple statements are not allowed".to_string(),
            ));
        }
        if let Some(m) = self.forbidden.find(query) {
            return Err(CitelineError::SqlRejected(format!(
                "Forbidden keyword: {}",
                m.as_str().to_lowercase()
            )));
        }
        if !self.tables.iter().any(|(_, re)| re.is_match(query)) {
            let names: Vec<&str> = self.tables.iter().map(|(t, _)| t.as_str()).collect();
            return Err(CitelineError::SqlRejected(format!(
                "Query must reference an allowed table: {}",
                names.join(", ")
            )));
        }

        // Only a LIMIT at nesting depth zero bounds the outer result
        let outer_limit = self
            .limit_keyword
            .find_iter(query)
            .last()
            .filter(|m| paren_depth(&query[..m.start()]) == 0);

        let Some(limit) = outer_limit else {
            return Ok(format!("{} LIMIT {}", query, self.max_limit));
        };

        let clause = &query[limit.start()..];
        let caps = self.trailing_limit.captures(clause).ok_or_else(|| {
            CitelineError::SqlRejected(
                "LIMIT must be a trailing literal `LIMIT n [OFFSET m]`".to_string(),
            )
        })?;
        let requested = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(|| {
                CitelineError::SqlRejected("LIMIT must be a literal integer".to_string())
            })?;

        if requested > self.max_limit as u64 {
            let offset = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            return Ok(format!(
                "{}LIMIT {}{}",
                &query[..limit.start()],
                self.max_limit,
                offset
            ));
        }

        Ok(query.to_string())
    }
}

fn paren_depth(sql: &str) -> i64 {
    sql.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// One-shot guard with an ad-hoc allow-list
pub fn guard_sql(sql: &str, allowed_tables: &[String], max_limit: usize) -> Result<String> {
    SqlGuard::new(allowed_tables, max_limit)?.guard(sql)
}

/// Evidence id for a guarded query
pub fn sql_evidence_ref(guarded_query: &str) -> EvidenceRef {
    EvidenceRef::Sql(short_hash(guarded_query, SQL_HASH_LEN))
}

/// Read-only query tool over the research database
pub struct ReadOnlySqlTool {
    db_path: PathBuf,
    guard: SqlGuard,
    allowed_tables: Vec<String>,
    max_limit: usize,
}

impl ReadOnlySqlTool {
    pub fn new(config: &SqlConfig) -> Result<Self> {
        let mut allowed_tables = config.allowed_tables.clone();
        allowed_tables.sort();
        allowed_tables.dedup();

        Ok(Self {
            db_path: expand_path(&config.db_path)?,
            guard: SqlGuard::new(&allowed_tables, config.max_limit)?,
            allowed_tables,
            max_limit: config.max_limit,
        })
    }

    /// Each call opens its own read-only connection
    fn connect(&self) -> Result<Connection> {
        if !self.db_path.exists() {
            return Err(CitelineError::Config(format!(
                "Research database not found: {:?}",
                self.db_path
            )));
        }
        Ok(Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    pub fn read_query(&self, sql: &str) -> Result<SqlResult> {
        let query = self.guard.guard(sql)?;
        let conn = self.connect()?;

        let mut stmt = conn.prepare(&query)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(json_value(row.get_ref(i)?));
            }
            rows.push(values);
        }

        tracing::debug!("SQL returned {} rows: {}", rows.len(), query);

        Ok(SqlResult {
            sql_evidence_id: sql_evidence_ref(&query),
            query,
            columns,
            rows,
            meta: SqlMeta {
                tool: TOOL_NAME.to_string(),
                db_path: self.db_path.clone(),
                max_limit: self.max_limit,
                allowlisted_tables: self.allowed_tables.clone(),
            },
        })
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(b.iter().map(|byte| format!("{:02x}", byte)).collect()),
    }
}
