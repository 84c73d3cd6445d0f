//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the document store

use crate::{handlers::SharedStore, store::DocumentStore};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe. Always 200 OK, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Pings the document store. HTTP 200 when it answers, 503 otherwise.
pub async fn readyz(State(service): State<SharedStore>) -> impl IntoResponse {
    let store_check = match service.document_store().ping().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(e.to_string()),
        },
    };

    let overall_ok = store_check.ok;
    let mut checks = HashMap::new();
    checks.insert("store", store_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::object_service::ObjectStore,
        store::sqlite::{CollectionNames, SqliteDocumentStore},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn readyz_follows_store_state() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ready.db").display());
        let backend = SqliteDocumentStore::connect(&url, CollectionNames::new("r", "").unwrap())
            .await
            .unwrap();
        let store = ObjectStore::new(Arc::new(backend), 8).unwrap();

        let ready = readyz(State(store.clone())).await.into_response();
        assert_eq!(ready.status(), StatusCode::OK);

        store.close().await.unwrap();
        let closed = readyz(State(store)).await.into_response();
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
