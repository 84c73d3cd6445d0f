//! src/store/sqlite.rs
//!
//! SQLite-backed [`DocumentStore`]. Each "collection" is a table:
//! `{namespace}_{prefix}manifests` holds one row per object and
//! `{namespace}_{prefix}chunks` one row per chunk, with a unique index over
//! `(object_id, seq)`.

use super::DocumentStore;
use crate::{
    errors::{StoreError, StoreResult},
    models::manifest::{Manifest, ManifestRow},
};
use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Table names derived from a namespace and a collection prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub manifests: String,
    pub chunks: String,
}

impl CollectionNames {
    /// Both parts are spliced into SQL, so only `[A-Za-z0-9_]` is accepted.
    pub fn new(namespace: &str, prefix: &str) -> StoreResult<Self> {
        if namespace.is_empty() || !is_identifier(namespace) {
            return Err(StoreError::InvalidInput(format!(
                "namespace `{}` must be non-empty and contain only letters, digits or `_`",
                namespace
            )));
        }
        if !is_identifier(prefix) {
            return Err(StoreError::InvalidInput(format!(
                "collection prefix `{}` may contain only letters, digits or `_`",
                prefix
            )));
        }
        Ok(Self {
            manifests: format!("{}_{}manifests", namespace, prefix),
            chunks: format!("{}_{}chunks", namespace, prefix),
        })
    }
}

fn is_identifier(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Statements rendered once per store for its table names.
#[derive(Debug)]
struct Statements {
    create_manifests: String,
    create_chunks: String,
    create_chunk_index: String,
    insert_manifest: String,
    insert_chunk: String,
    find_manifest: String,
    find_chunk: String,
    delete_manifest: String,
    delete_chunks: String,
}

impl Statements {
    fn render(names: &CollectionNames) -> Self {
        let m = &names.manifests;
        let c = &names.chunks;
        Self {
            create_manifests: format!(
                "CREATE TABLE IF NOT EXISTS {m} (
                    id          BLOB PRIMARY KEY,
                    length      INTEGER NOT NULL,
                    chunk_size  INTEGER NOT NULL,
                    created_at  TEXT NOT NULL,
                    checksum    TEXT NOT NULL,
                    metadata    TEXT NOT NULL DEFAULT '{{}}'
                )"
            ),
            create_chunks: format!(
                "CREATE TABLE IF NOT EXISTS {c} (
                    object_id   BLOB NOT NULL,
                    seq         INTEGER NOT NULL,
                    data        BLOB NOT NULL
                )"
            ),
            create_chunk_index: format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {c}_object_seq ON {c} (object_id, seq)"
            ),
            insert_manifest: format!(
                "INSERT INTO {m} (id, length, chunk_size, created_at, checksum, metadata)
                 VALUES (?, ?, ?, ?, ?, ?)"
            ),
            insert_chunk: format!("INSERT INTO {c} (object_id, seq, data) VALUES (?, ?, ?)"),
            find_manifest: format!(
                "SELECT id, length, chunk_size, created_at, checksum, metadata
                 FROM {m} WHERE id = ?"
            ),
            find_chunk: format!("SELECT data FROM {c} WHERE object_id = ? AND seq = ?"),
            delete_manifest: format!("DELETE FROM {m} WHERE id = ?"),
            delete_chunks: format!("DELETE FROM {c} WHERE object_id = ?"),
        }
    }
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    names: CollectionNames,
    sql: Statements,
}

impl SqliteDocumentStore {
    /// Open `database_url`, verify the connection and make sure both tables
    /// and the chunk index exist.
    pub async fn connect(database_url: &str, names: CollectionNames) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|err| StoreError::ConnectionError(err.into()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|err| StoreError::ConnectionError(err.into()))?;

        let store = Self::from_pool(pool, names);
        store
            .ping()
            .await
            .map_err(|err| StoreError::ConnectionError(err.into()))?;
        store.create_collections().await?;
        store.ensure_chunk_index().await?;
        debug!(
            "connected to {} (manifests: {}, chunks: {})",
            database_url, store.names.manifests, store.names.chunks
        );
        Ok(store)
    }

    /// Wrap an existing pool without touching the schema.
    pub fn from_pool(pool: SqlitePool, names: CollectionNames) -> Self {
        let sql = Statements::render(&names);
        Self { pool, names, sql }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn names(&self) -> &CollectionNames {
        &self.names
    }

    async fn create_collections(&self) -> StoreResult<()> {
        for stmt in [&self.sql.create_manifests, &self.sql.create_chunks] {
            debug!("executing schema SQL: {}", stmt);
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|err| StoreError::unavailable("create collection", "-", err))?;
        }
        Ok(())
    }
}

fn seq_param(object_id: &Uuid, seq: u64) -> StoreResult<i64> {
    i64::try_from(seq).map_err(|_| {
        StoreError::InvalidInput(format!(
            "chunk index {} of object `{}` exceeds the storable range",
            seq, object_id
        ))
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ensure_chunk_index(&self) -> StoreResult<()> {
        sqlx::query(&self.sql.create_chunk_index)
            .execute(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("create chunk index", "-", err))?;
        Ok(())
    }

    async fn insert_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        let row = ManifestRow::try_from(manifest)?;
        sqlx::query(&self.sql.insert_manifest)
            .bind(row.id)
            .bind(row.length)
            .bind(row.chunk_size)
            .bind(row.created_at)
            .bind(&row.checksum)
            .bind(&row.metadata)
            .execute(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("insert manifest", manifest.id, err))?;
        Ok(())
    }

    async fn insert_chunk(&self, object_id: &Uuid, seq: u64, data: &[u8]) -> StoreResult<()> {
        let seq_value = seq_param(object_id, seq)?;
        sqlx::query(&self.sql.insert_chunk)
            .bind(object_id)
            .bind(seq_value)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    warn!("chunk {} of object {} already stored", seq, object_id);
                }
                StoreError::unavailable("insert chunk", object_id, err)
            })?;
        Ok(())
    }

    async fn find_manifest(&self, id: &Uuid) -> StoreResult<Option<Manifest>> {
        let row = sqlx::query_as::<_, ManifestRow>(&self.sql.find_manifest)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("find manifest", id, err))?;
        row.map(Manifest::try_from).transpose()
    }

    async fn find_chunk(&self, object_id: &Uuid, seq: u64) -> StoreResult<Option<Vec<u8>>> {
        let seq_value = seq_param(object_id, seq)?;
        sqlx::query_scalar::<_, Vec<u8>>(&self.sql.find_chunk)
            .bind(object_id)
            .bind(seq_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("find chunk", object_id, err))
    }

    async fn delete_manifest(&self, id: &Uuid) -> StoreResult<u64> {
        let result = sqlx::query(&self.sql.delete_manifest)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("delete manifest", id, err))?;
        Ok(result.rows_affected())
    }

    async fn delete_chunks(&self, object_id: &Uuid) -> StoreResult<u64> {
        let result = sqlx::query(&self.sql.delete_chunks)
            .bind(object_id)
            .execute(&self.pool)
            .await
            .map_err(|err| StoreError::unavailable("delete chunks", object_id, err))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(1) => Ok(()),
            Ok(v) => Err(StoreError::unavailable(
                "ping",
                "-",
                format!("unexpected result: {}", v),
            )),
            Err(err) => Err(StoreError::unavailable("ping", "-", err)),
        }
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        debug!("closed connection pool");
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
