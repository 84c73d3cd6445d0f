//! src/services/object_service.rs
//!
//! ObjectStore: the chunked object façade. A payload is split into
//! fixed-size chunks, each stored as its own document, followed by a single
//! manifest document describing the whole object. Reads fetch the manifest
//! and rebuild the payload either one chunk at a time or with one task per
//! chunk.
//!
//! Nothing here is transactional across documents. A `put` that fails midway
//! leaves the chunks it already wrote without a manifest, and a `delete` whose
//! chunk removal fails leaves chunks without a manifest. Such orphans are not
//! collected.

use crate::{
    codec::{self, ChunkLayout, CodecError, Reassembler},
    errors::{StoreError, StoreResult},
    models::{manifest::Manifest, metadata::Metadata},
    store::DocumentStore,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Chunk size used when none is configured: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// How chunk documents are fetched on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// One request at a time, in index order.
    #[default]
    Sequential,
    /// One spawned task per chunk, results gathered as they complete.
    Concurrent,
}

/// A fully materialized object: its manifest and payload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub manifest: Manifest,
    pub data: Vec<u8>,
}

pub struct ObjectStore<S: DocumentStore> {
    store: Arc<S>,
    chunk_size: usize,
    verify_checksums: bool,
}

impl<S: DocumentStore> Clone for ObjectStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            chunk_size: self.chunk_size,
            verify_checksums: self.verify_checksums,
        }
    }
}

/// Lowercase hex MD5 digest, the form kept in the manifest.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

fn parse_id(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| StoreError::InvalidId(raw.to_string()))
}

fn reassembly_error(id: &Uuid, source: CodecError) -> StoreError {
    StoreError::Reassembly {
        id: id.to_string(),
        source,
    }
}

fn incomplete(id: &Uuid, index: u64, expected: u64) -> StoreError {
    StoreError::IncompleteObject {
        id: id.to_string(),
        index,
        expected,
    }
}

impl<S: DocumentStore> ObjectStore<S> {
    /// Build a façade writing new objects with `chunk_size`-byte chunks.
    /// Existing objects keep the chunk size recorded in their manifest.
    pub fn new(store: Arc<S>, chunk_size: usize) -> StoreResult<Self> {
        if chunk_size == 0 {
            return Err(StoreError::InvalidInput(
                "chunk size must be greater than zero".into(),
            ));
        }
        Ok(Self {
            store,
            chunk_size,
            verify_checksums: false,
        })
    }

    /// Recompute the MD5 of every payload read and compare it with the manifest.
    pub fn with_checksum_verification(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    pub fn document_store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store `payload` with `metadata` and return the new object id.
    ///
    /// Chunks are inserted one by one in index order, then the manifest. The
    /// first failed insert aborts the call; chunks already written stay.
    pub async fn put(&self, payload: &[u8], metadata: Metadata) -> StoreResult<String> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let checksum = md5_hex(payload);

        let chunks = codec::split(payload, self.chunk_size)
            .map_err(|err| StoreError::InvalidInput(err.to_string()))?;
        for (seq, data) in chunks {
            if let Err(err) = self.store.insert_chunk(&id, seq, data).await {
                if seq > 0 {
                    warn!(
                        "put {} aborted at chunk {}; chunks 0..{} left without a manifest",
                        id, seq, seq
                    );
                }
                return Err(err);
            }
        }

        let manifest = Manifest {
            id,
            length: payload.len() as u64,
            chunk_size: self.chunk_size as u64,
            created_at,
            checksum,
            metadata,
        };
        if let Err(err) = self.store.insert_manifest(&manifest).await {
            warn!("manifest insert for {} failed; its chunks are orphaned", id);
            return Err(err);
        }

        debug!(
            "stored object {} ({} bytes, {} chunks)",
            id,
            manifest.length,
            payload.len().div_ceil(self.chunk_size)
        );
        Ok(id.to_string())
    }

    /// Fetch and rebuild an object, chunk by chunk in index order.
    pub async fn get(&self, object_id: &str) -> StoreResult<(Vec<u8>, Metadata)> {
        let object = self.read(object_id, ReadMode::Sequential).await?;
        Ok((object.data, object.manifest.metadata))
    }

    /// Same contract as [`get`](Self::get) but every chunk is fetched by its
    /// own task. Output is byte-identical to the sequential path.
    pub async fn fast_get(&self, object_id: &str) -> StoreResult<(Vec<u8>, Metadata)> {
        let object = self.read(object_id, ReadMode::Concurrent).await?;
        Ok((object.data, object.manifest.metadata))
    }

    /// Manifest lookup without touching any chunk.
    pub async fn stat(&self, object_id: &str) -> StoreResult<Manifest> {
        let id = parse_id(object_id)?;
        self.load_manifest(&id).await
    }

    /// Fetch manifest and payload with the chosen read mode.
    pub async fn read(&self, object_id: &str, mode: ReadMode) -> StoreResult<StoredObject> {
        let id = parse_id(object_id)?;
        let manifest = self.load_manifest(&id).await?;
        let layout = manifest.layout()?;

        let data = match mode {
            ReadMode::Sequential => self.fetch_sequential(&id, layout).await?,
            ReadMode::Concurrent => self.fetch_concurrent(&id, layout).await?,
        };

        if self.verify_checksums {
            let actual = md5_hex(&data);
            if actual != manifest.checksum {
                return Err(StoreError::ChecksumMismatch {
                    id: object_id.to_string(),
                    expected: manifest.checksum,
                    actual,
                });
            }
        }

        debug!(
            "read object {} ({} bytes, {:?})",
            id,
            data.len(),
            mode
        );
        Ok(StoredObject { manifest, data })
    }

    /// Remove the manifest, then every chunk of the object.
    ///
    /// Returns `NotFound` only when neither existed. If chunk removal fails
    /// after the manifest is gone the chunks are left orphaned.
    pub async fn delete(&self, object_id: &str) -> StoreResult<()> {
        let id = parse_id(object_id)?;

        let manifests = self.store.delete_manifest(&id).await?;
        let chunks = match self.store.delete_chunks(&id).await {
            Ok(n) => n,
            Err(err) => {
                if manifests > 0 {
                    warn!("manifest {} deleted but its chunks were not", id);
                }
                return Err(err);
            }
        };

        match (manifests, chunks) {
            (0, 0) => Err(StoreError::NotFound(object_id.to_string())),
            (0, n) => {
                debug!("removed {} orphaned chunks of {}", n, id);
                Ok(())
            }
            (_, n) => {
                debug!("deleted object {} ({} chunks)", id, n);
                Ok(())
            }
        }
    }

    /// Release the underlying store connection.
    pub async fn close(&self) -> StoreResult<()> {
        self.store.close().await
    }

    async fn load_manifest(&self, id: &Uuid) -> StoreResult<Manifest> {
        self.store
            .find_manifest(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn fetch_sequential(&self, id: &Uuid, layout: ChunkLayout) -> StoreResult<Vec<u8>> {
        let count = layout.count();
        let mut reassembler = Reassembler::new(layout);
        for seq in 0..count {
            let data = self
                .store
                .find_chunk(id, seq)
                .await?
                .ok_or_else(|| incomplete(id, seq, count))?;
            reassembler
                .place(seq, &data)
                .map_err(|err| reassembly_error(id, err))?;
        }
        reassembler.finish().map_err(|err| reassembly_error(id, err))
    }

    /// Fan out one task per chunk and fan in through a channel sized to the
    /// chunk count, so no task ever waits to report.
    ///
    /// Each result carries its index and lands in its own region of the
    /// buffer, so completion order is irrelevant. On the first failure the
    /// collector returns; tasks still running are not cancelled and their
    /// results are dropped with the receiver.
    async fn fetch_concurrent(&self, id: &Uuid, layout: ChunkLayout) -> StoreResult<Vec<u8>> {
        let count = layout.count();
        let mut reassembler = Reassembler::new(layout);
        if count == 0 {
            return reassembler.finish().map_err(|err| reassembly_error(id, err));
        }

        let (tx, mut rx) = mpsc::channel(count as usize);
        for seq in 0..count {
            let tx = tx.clone();
            let store = Arc::clone(&self.store);
            let id = *id;
            tokio::spawn(async move {
                let result = store.find_chunk(&id, seq).await;
                // Err only when the collector already gave up.
                let _ = tx.send((seq, result)).await;
            });
        }
        drop(tx);

        while let Some((seq, result)) = rx.recv().await {
            let data = result?.ok_or_else(|| incomplete(id, seq, count))?;
            reassembler
                .place(seq, &data)
                .map_err(|err| reassembly_error(id, err))?;
            if reassembler.is_complete() {
                break;
            }
        }
        // A task that died without reporting shows up as a missing chunk here.
        reassembler.finish().map_err(|err| reassembly_error(id, err))
    }
}
