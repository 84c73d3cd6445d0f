//! In-memory [`DocumentStore`] with fault injection, used by the service tests.

use super::DocumentStore;
use crate::{
    errors::{StoreError, StoreResult},
    models::manifest::Manifest,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Faults {
    insert_chunk: Option<u64>,
    find_chunk: Option<u64>,
    delete_chunks: bool,
    insert_manifest: bool,
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    manifests: Mutex<HashMap<Uuid, Manifest>>,
    chunks: Mutex<HashMap<(Uuid, u64), Vec<u8>>>,
    faults: Mutex<Faults>,
    closed: AtomicBool,
    chunk_reads: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserting chunk `seq` (of any object) fail.
    pub fn fail_chunk_insert(&self, seq: u64) {
        self.faults.lock().unwrap().insert_chunk = Some(seq);
    }

    /// Make reading chunk `seq` (of any object) fail.
    pub fn fail_chunk_find(&self, seq: u64) {
        self.faults.lock().unwrap().find_chunk = Some(seq);
    }

    pub fn fail_chunk_delete(&self) {
        self.faults.lock().unwrap().delete_chunks = true;
    }

    pub fn fail_manifest_insert(&self) {
        self.faults.lock().unwrap().insert_manifest = true;
    }

    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn chunk_count(&self, object_id: &Uuid) -> usize {
        self.chunks
            .lock()
            .unwrap()
            .keys()
            .filter(|(id, _)| id == object_id)
            .count()
    }

    pub fn manifest_count(&self) -> usize {
        self.manifests.lock().unwrap().len()
    }

    pub fn remove_chunk(&self, object_id: &Uuid, seq: u64) {
        self.chunks.lock().unwrap().remove(&(*object_id, seq));
    }

    pub fn replace_chunk(&self, object_id: &Uuid, seq: u64, data: Vec<u8>) {
        self.chunks.lock().unwrap().insert((*object_id, seq), data);
    }

    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    /// Highest number of chunk reads observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn check_open(&self, op: &'static str, id: impl ToString) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(op, id, "store closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_chunk_index(&self) -> StoreResult<()> {
        self.check_open("create chunk index", "-")
    }

    async fn insert_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        self.check_open("insert manifest", manifest.id)?;
        if self.faults.lock().unwrap().insert_manifest {
            return Err(StoreError::unavailable(
                "insert manifest",
                manifest.id,
                "injected fault",
            ));
        }
        self.manifests
            .lock()
            .unwrap()
            .insert(manifest.id, manifest.clone());
        Ok(())
    }

    async fn insert_chunk(&self, object_id: &Uuid, seq: u64, data: &[u8]) -> StoreResult<()> {
        self.check_open("insert chunk", object_id)?;
        if self.faults.lock().unwrap().insert_chunk == Some(seq) {
            return Err(StoreError::unavailable(
                "insert chunk",
                object_id,
                "injected fault",
            ));
        }
        let mut chunks = self.chunks.lock().unwrap();
        if chunks.contains_key(&(*object_id, seq)) {
            return Err(StoreError::unavailable(
                "insert chunk",
                object_id,
                "duplicate (object_id, seq)",
            ));
        }
        chunks.insert((*object_id, seq), data.to_vec());
        Ok(())
    }

    async fn find_manifest(&self, id: &Uuid) -> StoreResult<Option<Manifest>> {
        self.check_open("find manifest", id)?;
        Ok(self.manifests.lock().unwrap().get(id).cloned())
    }

    async fn find_chunk(&self, object_id: &Uuid, seq: u64) -> StoreResult<Option<Vec<u8>>> {
        self.check_open("find chunk", object_id)?;
        self.chunk_reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        // Later chunks answer sooner so completions arrive out of order.
        tokio::time::sleep(Duration::from_micros(200 * (7 - seq % 7))).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.faults.lock().unwrap().find_chunk == Some(seq) {
            return Err(StoreError::unavailable(
                "find chunk",
                object_id,
                "injected fault",
            ));
        }
        Ok(self.chunks.lock().unwrap().get(&(*object_id, seq)).cloned())
    }

    async fn delete_manifest(&self, id: &Uuid) -> StoreResult<u64> {
        self.check_open("delete manifest", id)?;
        Ok(self.manifests.lock().unwrap().remove(id).map_or(0, |_| 1))
    }

    async fn delete_chunks(&self, object_id: &Uuid) -> StoreResult<u64> {
        self.check_open("delete chunks", object_id)?;
        if self.faults.lock().unwrap().delete_chunks {
            return Err(StoreError::unavailable(
                "delete chunks",
                object_id,
                "injected fault",
            ));
        }
        let mut chunks = self.chunks.lock().unwrap();
        let before = chunks.len();
        chunks.retain(|(id, _), _| id != object_id);
        Ok((before - chunks.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_open("ping", "-")
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
