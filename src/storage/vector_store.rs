//! Vector index: collections of (point id, embedding, chunk payload)
//!
//! `SqliteVectorStore` keeps vectors as little-endian f32 blobs and answers
//! top-k queries with an exact cosine scan, so rank order is reproducible.

use crate::embedding::cosine_similarity;
use crate::error::{CitelineError, Result};
use crate::ids::PointId;
use crate::storage::database::Database;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// Payload stored next to each vector, mirroring the chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub chunk_id: String,
    pub point_id: PointId,
    pub text: String,
}

/// Embedding-index record for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Query hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: PointId,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Collection metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub distance: String,
}

/// Vector store contract
pub trait VectorStore: Send + Sync {
    /// Create `name` sized to `dimension` if absent; an existing collection
    /// with another dimension is an error
    fn ensure_collection(&self, name: &str, dimension: usize) -> Result<CollectionInfo>;

    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Insert or replace points by id; returns the number written
    fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Result<usize>;

    /// Top-`limit` points by cosine similarity, best first
    fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>>;

    /// Points for `ids` in request order; unknown ids are skipped
    fn retrieve(&self, collection: &str, ids: &[PointId]) -> Result<Vec<VectorPoint>>;

    fn count(&self, collection: &str) -> Result<usize>;

    /// Human-readable location recorded in provenance
    fn location(&self) -> String;
}

const VECTOR_MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE collections (
        name TEXT PRIMARY KEY,
        dimension INTEGER NOT NULL,
        distance TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE points (
        collection TEXT NOT NULL,
        point_id TEXT NOT NULL,
        vector BLOB NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (collection, point_id),
        FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
    );
    "#];

pub const COSINE: &str = "cosine";

/// SQLite-backed vector store
pub struct SqliteVectorStore {
    db: Database,
}

impl SqliteVectorStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::open(path, VECTOR_MIGRATIONS)?,
        })
    }

    fn require_collection(&self, name: &str) -> Result<CollectionInfo> {
        self.collection(name)?
            .ok_or_else(|| CitelineError::CollectionNotFound {
                name: name.to_string(),
            })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(CitelineError::VectorStore(format!(
            "Corrupt vector blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn decode_payload(raw: &str) -> Result<ChunkPayload> {
    serde_json::from_str(raw).map_err(|e| CitelineError::json(e, "Failed to decode point payload"))
}

fn parse_point_id(raw: &str) -> Result<PointId> {
    raw.parse()
        .map_err(|e| CitelineError::VectorStore(format!("Invalid point id {}: {}", raw, e)))
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(&self, name: &str, dimension: usize) -> Result<CollectionInfo> {
        if let Some(existing) = self.collection(name)? {
            if existing.dimension != dimension {
                return Err(CitelineError::VectorStore(format!(
                    "Collection {} has dimension {}, embedding model produces {}",
                    name, existing.dimension, dimension
                )));
            }
            return Ok(existing);
        }

        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimension, distance, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, dimension as i64, COSINE, chrono::Utc::now().timestamp()],
        )?;

        tracing::info!("Created vector collection {} ({}D, cosine)", name, dimension);

        self.require_collection(name)
    }

    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let conn = self.db.get_conn()?;
        let info = conn
            .query_row(
                "SELECT name, dimension, distance FROM collections WHERE name = ?1",
                params![name],
                |row| {
                    Ok(CollectionInfo {
                        name: row.get(0)?,
                        dimension: row.get::<_, i64>(1)? as usize,
                        distance: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Result<usize> {
        let info = self.require_collection(collection)?;

        for point in points {
            if point.vector.len() != info.dimension {
                return Err(CitelineError::VectorStore(format!(
                    "Point {} has dimension {}, collection {} expects {}",
                    point.id,
                    point.vector.len(),
                    collection,
                    info.dimension
                )));
            }
        }

        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO points (collection, point_id, vector, payload)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, point_id)
                 DO UPDATE SET vector = excluded.vector, payload = excluded.payload",
            )?;

            for point in points {
                let payload = serde_json::to_string(&point.payload)
                    .map_err(|e| CitelineError::json(e, "Failed to encode point payload"))?;
                stmt.execute(params![
                    collection,
                    point.id.to_string(),
                    encode_vector(&point.vector),
                    payload
                ])?;
            }
        }
        tx.commit()?;

        Ok(points.len())
    }

    fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let info = self.require_collection(collection)?;
        if vector.len() != info.dimension {
            return Err(CitelineError::VectorStore(format!(
                "Query has dimension {}, collection {} expects {}",
                vector.len(),
                collection,
                info.dimension
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.db.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT point_id, vector, payload FROM points WHERE collection = ?1")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, blob, payload) = row?;
            let score = cosine_similarity(vector, &decode_vector(&blob)?);
            scored.push((score, id, payload));
        }

        // Best first; ties broken by point id for a stable order
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, id, payload)| {
                Ok(ScoredPoint {
                    id: parse_point_id(&id)?,
                    score,
                    payload: decode_payload(&payload)?,
                })
            })
            .collect()
    }

    fn retrieve(&self, collection: &str, ids: &[PointId]) -> Result<Vec<VectorPoint>> {
        self.require_collection(collection)?;

        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT vector, payload FROM points WHERE collection = ?1 AND point_id = ?2",
        )?;

        let mut points = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_row(params![collection, id.to_string()], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
                })
                .optional()?;

            if let Some((blob, payload)) = row {
                points.push(VectorPoint {
                    id: *id,
                    vector: decode_vector(&blob)?,
                    payload: decode_payload(&payload)?,
                });
            }
        }

        Ok(points)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        self.require_collection(collection)?;
        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM points WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn location(&self) -> String {
        format!("sqlite-vector({})", self.db.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{chunk_id, point_id};
    use tempfile::TempDir;

    fn point(doc: &str, pos: usize, text: &str, vector: Vec<f32>) -> VectorPoint {
        let cid = chunk_id(doc, pos, text);
        let pid = point_id(&cid);
        VectorPoint {
            id: pid,
            vector,
            payload: ChunkPayload {
                doc_id: doc.to_string(),
                chunk_id: cid,
                point_id: pid,
                text: text.to_string(),
            },
        }
    }

    fn open_store(temp: &TempDir) -> SqliteVectorStore {
        SqliteVectorStore::open(&temp.path().join("vectors.sqlite")).unwrap()
    }

    #[test]
    fn test_ensure_collection_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = store.ensure_collection("chunks", 3).unwrap();
        let b = store.ensure_collection("chunks", 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.distance, COSINE);

        assert!(store.ensure_collection("chunks", 4).is_err());
    }

    #[test]
    fn test_missing_collection() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(matches!(
            store.query("nope", &[1.0], 3),
            Err(CitelineError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn test_upsert_and_query_order() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.ensure_collection("chunks", 2).unwrap();

        let points = vec![
            point("a", 0, "x axis", vec![1.0, 0.0]),
            point("a", 1, "y axis", vec![0.0, 1.0]),
            point("b", 0, "diagonal", vec![0.7071, 0.7071]),
        ];
        assert_eq!(store.upsert("chunks", &points).unwrap(), 3);
        assert_eq!(store.count("chunks").unwrap(), 3);

        let hits = store.query("chunks", &[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload.text, "x axis");
        assert_eq!(hits[1].payload.text, "diagonal");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_upsert_replaces() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.ensure_collection("chunks", 2).unwrap();

        let p = point("a", 0, "text", vec![1.0, 0.0]);
        store.upsert("chunks", &[p.clone()]).unwrap();
        store.upsert("chunks", &[p.clone()]).unwrap();
        assert_eq!(store.count("chunks").unwrap(), 1);
    }

    #[test]
    fn test_dimension_validation() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.ensure_collection("chunks", 2).unwrap();

        let bad = point("a", 0, "text", vec![1.0, 0.0, 0.0]);
        assert!(store.upsert("chunks", &[bad]).is_err());
        assert!(store.query("chunks", &[1.0], 1).is_err());
    }

    #[test]
    fn test_retrieve_in_request_order() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.ensure_collection("chunks", 2).unwrap();

        let p1 = point("a", 0, "first", vec![1.0, 0.0]);
        let p2 = point("a", 1, "second", vec![0.0, 1.0]);
        store.upsert("chunks", &[p1.clone(), p2.clone()]).unwrap();

        let unknown = point_id("missing:0:0000000000");
        let got = store
            .retrieve("chunks", &[p2.id, unknown, p1.id])
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].payload.text, "second");
        assert_eq!(got[1].payload.text, "first");
    }

    #[test]
    fn test_empty_collection_query() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.ensure_collection("chunks", 2).unwrap();
        assert!(store.query("chunks", &[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_vector_blob_roundtrip() {
        let v = vec![0.25, -1.5, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
        assert!(decode_vector(&[0, 1, 2]).is_err());
    }
}
