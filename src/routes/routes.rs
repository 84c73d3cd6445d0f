//! Defines routes for object operations.
//!
//! ## Structure
//! - `POST   /objects`      store a new object, returns its id
//! - `GET    /objects/{id}` download (`?fast=true` for concurrent chunk reads)
//! - `HEAD   /objects/{id}` manifest headers only
//! - `DELETE /objects/{id}` remove manifest and chunks
//! - `GET    /healthz`, `GET /readyz`

use crate::handlers::{
    SharedStore,
    health_handlers::{healthz, readyz},
    object_handlers::{delete_object, get_object, head_object, put_object},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Request bodies above `max_body_bytes` are rejected
/// before reaching the store.
pub fn routes(max_body_bytes: usize) -> Router<SharedStore> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/objects", post(put_object))
        .route(
            "/objects/{id}",
            get(get_object).head(head_object).delete(delete_object),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
