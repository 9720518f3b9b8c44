//! Pooled SQLite access with ordered migrations
//!
//! Both index stores sit on this: each owns its own database file and its own
//! migration list.

use crate::error::{CitelineError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::{Path, PathBuf};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handle
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Default upper bound on pooled connections per database
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and apply
    /// `migrations` in order
    pub fn open(db_path: &Path, migrations: &[&str]) -> Result<Self> {
        Self::open_with_pool_size(db_path, migrations, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool_size(
        db_path: &Path,
        migrations: &[&str],
        max_size: u32,
    ) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CitelineError::io(e, format!("Failed to create database directory: {:?}", parent))
                })?;
            }
        }

        // Per-connection settings; WAL is persisted in the file itself.
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                PRAGMA synchronous = NORMAL;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| CitelineError::Pool(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool.get()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
        }

        let db = Self {
            pool,
            path: db_path.to_path_buf(),
        };

        db.migrate(migrations)?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run database migrations
    fn migrate(&self, migrations: &[&str]) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in migrations.iter().enumerate() {
            let version = version as i64 + 1;

            if version > current_version {
                tracing::info!("Applying migration {} to {:?}", version, self.path);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Highest applied migration version
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?)
    }
}
