//! HTTP adapters over the object store.

use crate::{services::object_service::ObjectStore, store::sqlite::SqliteDocumentStore};

pub mod health_handlers;
pub mod object_handlers;

/// State shared by every handler.
pub type SharedStore = ObjectStore<SqliteDocumentStore>;
