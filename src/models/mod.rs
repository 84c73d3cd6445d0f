//! Records persisted by the object store.
//!
//! A stored object is one [`manifest::Manifest`] plus `ceil(length / chunk_size)`
//! chunk rows keyed by `(object_id, seq)`. Caller metadata travels inside the
//! manifest as an open JSON mapping.

pub mod manifest;
pub mod metadata;
