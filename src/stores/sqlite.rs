//! SQLite vector store backed by the `sqlite-vec` extension.
//!
//! One database file per persist directory; each collection owns a chunk
//! table, an embedding table keyed by chunk id, and a small meta table
//! pinning the embedding dimension. Similarity is cosine distance computed
//! by `vec_distance_cosine`, lower meaning more relevant.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::debug;

use super::{Backend, ChunkRecord};
use crate::config::IndexConfig;
use crate::types::RagError;

const DB_FILE: &str = "index.sqlite3";

/// File-backed vector index for one named collection.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
    table: String,
    dimension: usize,
}

impl SqliteVectorIndex {
    /// Opens (creating if necessary) the collection at the configured path.
    ///
    /// Creates the persist directory and schema, and pins the embedding
    /// dimension; reopening with a different dimension is a configuration
    /// error.
    pub async fn open(config: &IndexConfig, dimension: usize) -> Result<Self, RagError> {
        let index = Self::connect(config, dimension).await?;
        index.create_schema().await?;
        index.check_dimension().await?;
        debug!(collection = %index.table, dimension, "vector index ready");
        Ok(index)
    }

    /// Connects without creating the schema.
    ///
    /// Queries against a collection that was never created through
    /// [`SqliteVectorIndex::open`] report [`RagError::NotInitialized`],
    /// which is distinct from an initialized-but-empty collection.
    pub async fn attach(config: &IndexConfig, dimension: usize) -> Result<Self, RagError> {
        Self::connect(config, dimension).await
    }

    async fn connect(config: &IndexConfig, dimension: usize) -> Result<Self, RagError> {
        register_sqlite_vec()?;
        let table = sanitize_collection(&config.collection)?;

        std::fs::create_dir_all(&config.persist_dir)?;
        let path: PathBuf = config.persist_dir.join(DB_FILE);
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::IndexRead(err.to_string()))?;

        // Fails fast if the extension did not load into this connection.
        conn.call(|conn| {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| RagError::IndexRead(format!("sqlite-vec unavailable: {err}")))?;

        Ok(Self {
            conn,
            table,
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn collection(&self) -> &str {
        &self.table
    }

    async fn create_schema(&self) -> Result<(), RagError> {
        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                         id TEXT PRIMARY KEY,
                         source TEXT NOT NULL,
                         chunk_index INTEGER NOT NULL,
                         content TEXT NOT NULL,
                         metadata TEXT NOT NULL
                     );
                     CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
                     CREATE TABLE IF NOT EXISTS {table}_embeddings (
                         id TEXT PRIMARY KEY REFERENCES {table}(id),
                         embedding BLOB NOT NULL
                     );
                     CREATE TABLE IF NOT EXISTS {table}_meta (
                         key TEXT PRIMARY KEY,
                         value TEXT NOT NULL
                     );"
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::IndexWrite(err.to_string()))
    }

    async fn check_dimension(&self) -> Result<(), RagError> {
        let table = self.table.clone();
        let dimension = self.dimension;
        let stored = self
            .conn
            .call(move |conn| {
                let existing = conn
                    .query_row(
                        &format!("SELECT value FROM {table}_meta WHERE key = 'dimension'"),
                        [],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                if existing.is_none() {
                    conn.execute(
                        &format!("INSERT INTO {table}_meta (key, value) VALUES ('dimension', ?1)"),
                        [dimension.to_string()],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                Ok(existing)
            })
            .await
            .map_err(|err| RagError::IndexWrite(err.to_string()))?;

        match stored {
            Some(value) if value != dimension.to_string() => Err(RagError::Config(format!(
                "collection '{}' was created with dimension {value}, not {dimension}",
                self.table
            ))),
            _ => Ok(()),
        }
    }

    async fn collection_exists(&self) -> Result<bool, RagError> {
        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [&table],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map(|found| found > 0)
            .map_err(|err| RagError::IndexRead(err.to_string()))
    }
}

#[async_trait]
impl Backend for SqliteVectorIndex {
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RagError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(embedding) = record.embedding else {
                return Err(RagError::IndexWrite(format!(
                    "record '{}' has no embedding",
                    record.id
                )));
            };
            if embedding.len() != self.dimension {
                return Err(RagError::IndexWrite(format!(
                    "record '{}' has embedding dimension {}, collection expects {}",
                    record.id,
                    embedding.len(),
                    self.dimension
                )));
            }
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::IndexWrite(err.to_string()))?;
            rows.push((
                record.id,
                record.source,
                record.chunk_index as i64,
                record.content,
                record.metadata.to_string(),
                embedding_json,
            ));
        }

        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                {
                    let mut chunk_stmt = tx
                        .prepare(&format!(
                            "INSERT OR REPLACE INTO {table} \
                             (id, source, chunk_index, content, metadata) \
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    let mut embedding_stmt = tx
                        .prepare(&format!(
                            "INSERT OR REPLACE INTO {table}_embeddings (id, embedding) \
                             VALUES (?1, vec_f32(?2))"
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for (id, source, chunk_index, content, metadata, embedding) in rows {
                        chunk_stmt
                            .execute((&id, &source, chunk_index, &content, &metadata))
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                        embedding_stmt
                            .execute((&id, &embedding))
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| RagError::IndexWrite(err.to_string()))
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        if !self.collection_exists().await? {
            return Err(RagError::NotInitialized(self.table.clone()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding_json = serde_json::to_string(embedding)
            .map_err(|err| RagError::IndexRead(err.to_string()))?;
        let table = self.table.clone();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.id, c.source, c.chunk_index, c.content, c.metadata, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                         FROM {table} c \
                         JOIN {table}_embeddings e ON c.id = e.id \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let record = ChunkRecord {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            chunk_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            metadata: row
                                .get::<_, String>(4)
                                .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                                .unwrap_or_default(),
                            embedding: None,
                        };
                        let distance: f32 = row.get(5)?;
                        Ok((record, distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::IndexRead(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        let table = self.table.clone();
        self.conn
            .call(move |conn| {
                conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map(|count| count as usize)
            .map_err(|err| RagError::IndexRead(err.to_string()))
    }

    async fn count_for_source(&self, source: &str) -> Result<usize, RagError> {
        let table = self.table.clone();
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT count(*) FROM {table} WHERE source = ?1"),
                    [&source],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map(|count| count as usize)
            .map_err(|err| RagError::IndexRead(err.to_string()))
    }
}

/// Collection names end up in SQL identifiers, so restrict them up front.
fn sanitize_collection(name: &str) -> Result<String, RagError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(RagError::Config(format!(
            "collection name '{name}' must be a valid identifier"
        )))
    }
}

fn register_sqlite_vec() -> Result<(), RagError> {
    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(RagError::IndexWrite)
}
