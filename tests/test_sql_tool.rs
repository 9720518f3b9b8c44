//! Read-only SQL tool against a real research database

use citeline::config::SqlConfig;
use citeline::error::CitelineError;
use citeline::ids::EvidenceRef;
use citeline::sql::{ReadOnlySqlTool, TOOL_NAME};
use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::TempDir;

fn research_db(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE prices_daily (
             ticker TEXT NOT NULL,
             date TEXT NOT NULL,
             close REAL,
             volume INTEGER
         );
         CREATE TABLE secrets (value TEXT);",
    )
    .unwrap();

    for day in 0..300 {
        conn.execute(
            "INSERT INTO prices_daily (ticker, date, close, volume) VALUES (?1, ?2, ?3, ?4)",
            params![
                "AAPL",
                format!("2024-{:02}-{:02}", day / 28 + 1, day % 28 + 1),
                150.0 + day as f64 * 0.5,
                1_000_000 + day
            ],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO prices_daily (ticker, date, close, volume) VALUES ('MSFT', '2024-01-01', NULL, 5)",
        [],
    )
    .unwrap();
}

fn tool(temp: &TempDir, max_limit: usize) -> ReadOnlySqlTool {
    let db_path = temp.path().join("research.db");
    if !db_path.exists() {
        research_db(&db_path);
    }
    ReadOnlySqlTool::new(&SqlConfig {
        db_path,
        allowed_tables: vec!["prices_daily".to_string(), "fundamentals".to_string()],
        max_limit,
    })
    .unwrap()
}

#[test]
fn test_read_query_returns_rows_and_metadata() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 200);

    let result = tool
        .read_query("SELECT date, close FROM prices_daily WHERE ticker = 'AAPL' ORDER BY date LIMIT 3")
        .unwrap();

    assert_eq!(result.columns, vec!["date", "close"]);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0][0], serde_json::json!("2024-01-01"));
    assert_eq!(result.rows[0][1], serde_json::json!(150.0));

    assert_eq!(result.meta.tool, TOOL_NAME);
    assert_eq!(result.meta.max_limit, 200);
    assert_eq!(
        result.meta.allowlisted_tables,
        vec!["fundamentals".to_string(), "prices_daily".to_string()]
    );
    assert!(matches!(result.sql_evidence_id, EvidenceRef::Sql(_)));
}

#[test]
fn test_rows_capped_at_max_limit() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 200);

    let unbounded = tool
        .read_query("SELECT date FROM prices_daily WHERE ticker = 'AAPL'")
        .unwrap();
    assert_eq!(unbounded.rows.len(), 200);
    assert!(unbounded.query.ends_with("LIMIT 200"));

    let oversized = tool
        .read_query("SELECT date FROM prices_daily LIMIT 1000")
        .unwrap();
    assert_eq!(oversized.rows.len(), 200);
    assert!(oversized.query.contains("LIMIT 200"));
}

#[test]
fn test_small_max_limit_holds_against_offsets_and_subqueries() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 5);

    let offset = tool
        .read_query("SELECT close FROM prices_daily LIMIT 1000 OFFSET 10")
        .unwrap();
    assert_eq!(offset.rows.len(), 5);
    assert!(offset.query.ends_with("LIMIT 5 OFFSET 10"));

    let nested = tool
        .read_query(
            "SELECT date FROM prices_daily \
             WHERE close >= (SELECT close FROM prices_daily ORDER BY close LIMIT 1)",
        )
        .unwrap();
    assert_eq!(nested.rows.len(), 5);
    assert!(nested.query.ends_with(") LIMIT 5"));
}

#[test]
fn test_evidence_id_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 200);
    let sql = "SELECT close FROM prices_daily WHERE ticker = 'AAPL' ORDER BY date DESC LIMIT 1";

    let first = tool.read_query(sql).unwrap();
    let second = tool.read_query(sql).unwrap();
    assert_eq!(first.sql_evidence_id, second.sql_evidence_id);

    let id = first.sql_evidence_id.to_string();
    assert!(id.starts_with("sql:"));
    assert_eq!(id.len(), "sql:".len() + 12);

    let other = tool
        .read_query("SELECT close FROM prices_daily WHERE ticker = 'AAPL' ORDER BY date LIMIT 1")
        .unwrap();
    assert_ne!(first.sql_evidence_id, other.sql_evidence_id);
}

#[test]
fn test_null_and_integer_values() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 200);

    let result = tool
        .read_query("SELECT close, volume FROM prices_daily WHERE ticker = 'MSFT'")
        .unwrap();
    assert_eq!(result.rows, vec![vec![serde_json::Value::Null, serde_json::json!(5)]]);
}

#[test]
fn test_rejected_queries() {
    let temp = TempDir::new().unwrap();
    let tool = tool(&temp, 200);

    for sql in [
        "DELETE FROM prices_daily",
        "SELECT * FROM secrets",
        "SELECT * FROM prices_daily; DROP TABLE prices_daily",
        "SELECT * FROM prices_daily LIMIT (SELECT 5)",
        "WITH x AS (SELECT 1) SELECT * FROM prices_daily",
        "SELECT close FROM prices_daily LIMIT 0, 1000",
    ] {
        let err = tool.read_query(sql).unwrap_err();
        assert!(
            matches!(err, CitelineError::SqlRejected(_)),
            "expected rejection for {:?}, got {}",
            sql,
            err
        );
    }

    // Table is untouched
    let count = tool.read_query("SELECT COUNT(*) FROM prices_daily").unwrap();
    assert_eq!(count.rows[0][0], serde_json::json!(301));
}

#[test]
fn test_missing_database() {
    let temp = TempDir::new().unwrap();
    let tool = ReadOnlySqlTool::new(&SqlConfig {
        db_path: temp.path().join("absent.db"),
        allowed_tables: vec!["prices_daily".to_string()],
        max_limit: 10,
    })
    .unwrap();

    let err = tool.read_query("SELECT * FROM prices_daily").unwrap_err();
    assert!(matches!(err, CitelineError::Config(_)));
}
