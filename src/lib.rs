//! Chunked binary object store on top of a document database.
//!
//! Payloads are split into fixed-size chunks ([`codec`]), each persisted as
//! its own document next to a manifest ([`models`]) in a collaborator store
//! ([`store`]). [`services::object_service::ObjectStore`] ties them together.

pub mod codec;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
