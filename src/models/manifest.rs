//! The manifest: one record per stored object.

use crate::{
    codec::ChunkLayout,
    errors::{StoreError, StoreResult},
    models::metadata::{self, Metadata},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Describes a stored object. The payload bytes live in the chunk table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Manifest {
    /// Object id, also the `object_id` of every chunk.
    pub id: Uuid,

    /// Total payload length in bytes.
    pub length: u64,

    /// Chunk size used when this object was written.
    pub chunk_size: u64,

    /// Ingestion time.
    pub created_at: DateTime<Utc>,

    /// Lowercase hex MD5 of the full payload.
    pub checksum: String,

    /// Caller metadata, returned unmodified.
    pub metadata: Metadata,
}

impl Manifest {
    /// Chunk geometry for this object.
    pub fn layout(&self) -> StoreResult<ChunkLayout> {
        let chunk_size = usize::try_from(self.chunk_size).map_err(|_| {
            StoreError::CorruptRecord(format!(
                "manifest `{}` chunk_size {} does not fit in memory",
                self.id, self.chunk_size
            ))
        })?;
        let length = usize::try_from(self.length).map_err(|_| {
            StoreError::CorruptRecord(format!(
                "manifest `{}` length {} does not fit in memory",
                self.id, self.length
            ))
        })?;
        ChunkLayout::new(chunk_size, length).map_err(|err| {
            StoreError::CorruptRecord(format!("manifest `{}`: {}", self.id, err))
        })
    }
}

/// Manifest as it sits in SQLite. Every INTEGER column comes back as `i64`
/// and metadata as JSON text; conversion into [`Manifest`] is checked.
#[derive(Clone, Debug, FromRow)]
pub struct ManifestRow {
    pub id: Uuid,
    pub length: i64,
    pub chunk_size: i64,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
    pub metadata: String,
}

impl TryFrom<ManifestRow> for Manifest {
    type Error = StoreError;

    fn try_from(row: ManifestRow) -> StoreResult<Self> {
        let length = u64::try_from(row.length).map_err(|_| {
            StoreError::CorruptRecord(format!(
                "manifest `{}` has negative length {}",
                row.id, row.length
            ))
        })?;
        let chunk_size = u64::try_from(row.chunk_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                StoreError::CorruptRecord(format!(
                    "manifest `{}` has invalid chunk_size {}",
                    row.id, row.chunk_size
                ))
            })?;
        let metadata = metadata::decode(&row.metadata).map_err(|err| {
            StoreError::CorruptRecord(format!("manifest `{}` metadata: {}", row.id, err))
        })?;

        Ok(Self {
            id: row.id,
            length,
            chunk_size,
            created_at: row.created_at,
            checksum: row.checksum,
            metadata,
        })
    }
}

impl TryFrom<&Manifest> for ManifestRow {
    type Error = StoreError;

    fn try_from(manifest: &Manifest) -> StoreResult<Self> {
        let out_of_range = |field: &str, value: u64| {
            StoreError::InvalidInput(format!(
                "{} {} exceeds the storable range",
                field, value
            ))
        };
        Ok(Self {
            id: manifest.id,
            length: i64::try_from(manifest.length)
                .map_err(|_| out_of_range("length", manifest.length))?,
            chunk_size: i64::try_from(manifest.chunk_size)
                .map_err(|_| out_of_range("chunk_size", manifest.chunk_size))?,
            created_at: manifest.created_at,
            checksum: manifest.checksum.clone(),
            metadata: metadata::encode(&manifest.metadata)
                .map_err(|err| StoreError::InvalidInput(format!("metadata: {}", err)))?,
        })
    }
}
