//! Entity graph: chunk nodes, entity nodes, MENTIONS and CO_OCCURS edges
//!
//! The graph is global across documents and build runs. Every write is an
//! idempotent upsert, so re-indexing the same chunk changes nothing.
//! Builds assume a single writer; concurrent builds against one graph file
//! are not serialized here.

use crate::entities::{Entity, EntityType};
use crate::error::{CitelineError, Result};
use crate::storage::database::{Database, DbConn};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One traversal result: seed entity -> co-occurring neighbor -> chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPath {
    pub seed_entity_type: EntityType,
    pub seed_entity: String,
    pub neighbor_type: EntityType,
    pub neighbor: String,
    pub related_chunk_id: String,
}

/// Node and edge counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub chunks: usize,
    pub entities: usize,
    pub mentions: usize,
    /// Directed CO_OCCURS edges (two per entity pair)
    pub co_occurrence_edges: usize,
}

/// Graph store contract
pub trait GraphStore: Send + Sync {
    fn upsert_chunk(&self, chunk_id: &str, doc_id: &str) -> Result<()>;

    /// Upsert the entity node and a MENTIONS edge from the chunk
    fn upsert_mention(&self, chunk_id: &str, entity: &Entity) -> Result<()>;

    /// Upsert CO_OCCURS in both directions; a self-pair is ignored
    fn upsert_co_occurrence(&self, a: &Entity, b: &Entity) -> Result<()>;

    /// Write one chunk with its extracted entities
    fn record_chunk(&self, chunk_id: &str, doc_id: &str, entities: &[Entity]) -> Result<()> {
        self.upsert_chunk(chunk_id, doc_id)?;
        for entity in entities {
            self.upsert_mention(chunk_id, entity)?;
        }
        for (i, a) in entities.iter().enumerate() {
            for b in &entities[i + 1..] {
                self.upsert_co_occurrence(a, b)?;
            }
        }
        Ok(())
    }

    /// Depth-2 expansion from a chunk, capped at `limit` paths
    ///
    /// Walks the chunk's entities in mention order, the first `hop_k`
    /// distinct neighbors of each in edge-creation order, then every chunk
    /// mentioning that neighbor in mention order.
    fn expand(&self, chunk_id: &str, hop_k: usize, limit: usize) -> Result<Vec<GraphPath>>;

    /// Entities mentioned by a chunk, in mention order
    fn chunk_entities(&self, chunk_id: &str) -> Result<Vec<Entity>>;

    fn stats(&self) -> Result<GraphStats>;

    /// Human-readable location recorded in provenance
    fn location(&self) -> String;
}

const GRAPH_MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE graph_chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_id TEXT NOT NULL UNIQUE,
        doc_id TEXT NOT NULL
    );

    CREATE TABLE graph_entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL,
        name TEXT NOT NULL,
        norm_name TEXT NOT NULL,
        UNIQUE (entity_type, norm_name)
    );

    CREATE TABLE graph_mentions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_id TEXT NOT NULL REFERENCES graph_chunks(chunk_id),
        entity_id INTEGER NOT NULL REFERENCES graph_entities(id),
        UNIQUE (chunk_id, entity_id)
    );

    CREATE TABLE graph_co_occurs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        src INTEGER NOT NULL REFERENCES graph_entities(id),
        dst INTEGER NOT NULL REFERENCES graph_entities(id),
        UNIQUE (src, dst)
    );

    CREATE INDEX idx_mentions_entity ON graph_mentions(entity_id, id);
    CREATE INDEX idx_co_occurs_src ON graph_co_occurs(src, id);
    "#];

/// SQLite-backed graph store
pub struct SqliteGraphStore {
    db: Database,
}

/// Entity row as stored: (id, type, name)
type EntityRow = (i64, EntityType, String);

impl SqliteGraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::open(path, GRAPH_MIGRATIONS)?,
        })
    }

    fn entity_id(conn: &DbConn, entity: &Entity) -> Result<i64> {
        let norm = entity.normalized_name();
        conn.execute(
            "INSERT OR IGNORE INTO graph_entities (entity_type, name, norm_name)
             VALUES (?1, ?2, ?3)",
            params![entity.entity_type.as_str(), entity.name, norm],
        )?;
        Ok(conn.query_row(
            "SELECT id FROM graph_entities WHERE entity_type = ?1 AND norm_name = ?2",
            params![entity.entity_type.as_str(), norm],
            |row| row.get(0),
        )?)
    }

    fn entities_of_chunk(conn: &DbConn, chunk_id: &str) -> Result<Vec<EntityRow>> {
        let mut stmt = conn.prepare_cached(
            "SELECT e.id, e.entity_type, e.name
             FROM graph_mentions m
             JOIN graph_entities e ON e.id = m.entity_id
             WHERE m.chunk_id = ?1
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map(params![chunk_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        collect_entity_rows(rows)
    }

    fn neighbors(conn: &DbConn, entity_id: i64, hop_k: usize) -> Result<Vec<EntityRow>> {
        let mut stmt = conn.prepare_cached(
            "SELECT n.id, n.entity_type, n.name
             FROM graph_co_occurs c
             JOIN graph_entities n ON n.id = c.dst
             WHERE c.src = ?1
             ORDER BY c.id
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![entity_id, hop_k as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        collect_entity_rows(rows)
    }

    fn mentioning_chunks(conn: &DbConn, entity_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT chunk_id FROM graph_mentions WHERE entity_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![entity_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count(conn: &DbConn, table: &str) -> Result<usize> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n as usize)
    }
}

fn collect_entity_rows<I>(rows: I) -> Result<Vec<EntityRow>>
where
    I: Iterator<Item = rusqlite::Result<(i64, String, String)>>,
{
    rows.map(|row| -> Result<EntityRow> {
        let (id, entity_type, name) = row?;
        Ok((id, entity_type.parse::<EntityType>()?, name))
    })
    .collect()
}

impl GraphStore for SqliteGraphStore {
    fn upsert_chunk(&self, chunk_id: &str, doc_id: &str) -> Result<()> {
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO graph_chunks (chunk_id, doc_id) VALUES (?1, ?2)",
            params![chunk_id, doc_id],
        )?;
        Ok(())
    }

    fn upsert_mention(&self, chunk_id: &str, entity: &Entity) -> Result<()> {
        let conn = self.db.get_conn()?;
        let entity_id = Self::entity_id(&conn, entity)?;
        let known: i64 = conn.query_row(
            "SELECT COUNT(*) FROM graph_chunks WHERE chunk_id = ?1",
            params![chunk_id],
            |row| row.get(0),
        )?;
        if known == 0 {
            return Err(CitelineError::GraphStore(format!(
                "Mention from unknown chunk {}",
                chunk_id
            )));
        }
        conn.execute(
            "INSERT OR IGNORE INTO graph_mentions (chunk_id, entity_id) VALUES (?1, ?2)",
            params![chunk_id, entity_id],
        )?;
        Ok(())
    }

    fn upsert_co_occurrence(&self, a: &Entity, b: &Entity) -> Result<()> {
        if a.key() == b.key() {
            return Ok(());
        }
        let conn = self.db.get_conn()?;
        let a_id = Self::entity_id(&conn, a)?;
        let b_id = Self::entity_id(&conn, b)?;

        let mut stmt = conn
            .prepare_cached("INSERT OR IGNORE INTO graph_co_occurs (src, dst) VALUES (?1, ?2)")?;
        stmt.execute(params![a_id, b_id])?;
        stmt.execute(params![b_id, a_id])?;
        Ok(())
    }

    fn expand(&self, chunk_id: &str, hop_k: usize, limit: usize) -> Result<Vec<GraphPath>> {
        let mut paths = Vec::new();
        if hop_k == 0 || limit == 0 {
            return Ok(paths);
        }

        let conn = self.db.get_conn()?;

        'outer: for (seed_id, seed_type, seed_name) in Self::entities_of_chunk(&conn, chunk_id)? {
            for (neighbor_id, neighbor_type, neighbor_name) in
                Self::neighbors(&conn, seed_id, hop_k)?
            {
                for related in Self::mentioning_chunks(&conn, neighbor_id)? {
                    paths.push(GraphPath {
                        seed_entity_type: seed_type,
                        seed_entity: seed_name.clone(),
                        neighbor_type,
                        neighbor: neighbor_name.clone(),
                        related_chunk_id: related,
                    });
                    if paths.len() >= limit {
                        break 'outer;
                    }
                }
            }
        }

        tracing::debug!("Expanded {} into {} paths", chunk_id, paths.len());

        Ok(paths)
    }

    fn chunk_entities(&self, chunk_id: &str) -> Result<Vec<Entity>> {
        let conn = self.db.get_conn()?;
        Ok(Self::entities_of_chunk(&conn, chunk_id)?
            .into_iter()
            .map(|(_, entity_type, name)| Entity::new(entity_type, name))
            .collect())
    }

    fn stats(&self) -> Result<GraphStats> {
        let conn = self.db.get_conn()?;
        Ok(GraphStats {
            chunks: Self::count(&conn, "graph_chunks")?,
            entities: Self::count(&conn, "graph_entities")?,
            mentions: Self::count(&conn, "graph_mentions")?,
            co_occurrence_edges: Self::count(&conn, "graph_co_occurs")?,
        })
    }

    fn location(&self) -> String {
        format!("sqlite-graph({})", self.db.path().display())
    }
}
