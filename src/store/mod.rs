//! Collaborator document store.
//!
//! The object store only needs per-document atomic insert, find and delete
//! over two collections (manifests and chunks) plus a uniqueness constraint on
//! `(object_id, seq)`. [`DocumentStore`] is that seam; [`sqlite`] provides the
//! SQLite-backed implementation.

pub mod sqlite;

#[cfg(test)]
pub mod memory;

use crate::{errors::StoreResult, models::manifest::Manifest};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Declare the uniqueness constraint over `(object_id, seq)` on the chunk
    /// collection. Idempotent.
    async fn ensure_chunk_index(&self) -> StoreResult<()>;

    async fn insert_manifest(&self, manifest: &Manifest) -> StoreResult<()>;

    /// Insert one chunk document. Fails if `(object_id, seq)` already exists.
    async fn insert_chunk(&self, object_id: &Uuid, seq: u64, data: &[u8]) -> StoreResult<()>;

    async fn find_manifest(&self, id: &Uuid) -> StoreResult<Option<Manifest>>;

    /// Payload of chunk `seq` of `object_id`, if stored.
    async fn find_chunk(&self, object_id: &Uuid, seq: u64) -> StoreResult<Option<Vec<u8>>>;

    /// Delete the manifest with `id`; returns the number of documents removed.
    async fn delete_manifest(&self, id: &Uuid) -> StoreResult<u64>;

    /// Delete every chunk of `object_id`; returns the number removed.
    async fn delete_chunks(&self, object_id: &Uuid) -> StoreResult<u64>;

    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;

    /// Release the underlying connection. Later calls fail with
    /// `StoreUnavailable`.
    async fn close(&self) -> StoreResult<()>;
}
