//! HTTP handlers for object operations.
//! Payloads are buffered whole; storage concerns are delegated to `ObjectStore`.

use crate::{
    errors::AppError,
    handlers::SharedStore,
    models::{manifest::Manifest, metadata::Metadata},
    services::object_service::ReadMode,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Carries caller metadata as base64-encoded JSON, in both directions.
pub const METADATA_HEADER: HeaderName = HeaderName::from_static("x-object-metadata");

/// Query params accepted by `GET /objects/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct GetObjectQuery {
    /// Fetch chunks concurrently.
    pub fast: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutObjectResponse {
    pub id: String,
}

/// `POST /objects`: store the request body as a new object.
pub async fn put_object(
    State(service): State<SharedStore>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let metadata = match headers.get(&METADATA_HEADER) {
        Some(value) => decode_metadata_header(value)?,
        None => Metadata::new(),
    };

    let id = service.put(&body, metadata).await?;
    Ok((StatusCode::CREATED, Json(PutObjectResponse { id })))
}

/// `GET /objects/{id}`: payload plus object headers. `?fast=true` fetches
/// chunks concurrently.
pub async fn get_object(
    State(service): State<SharedStore>,
    Path(id): Path<String>,
    Query(q): Query<GetObjectQuery>,
) -> Result<Response, AppError> {
    let mode = if q.fast.unwrap_or(false) {
        ReadMode::Concurrent
    } else {
        ReadMode::Sequential
    };
    let object = service.read(&id, mode).await?;

    let mut response = Response::new(Body::from(object.data));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &object.manifest)?;
    Ok(response)
}

/// `HEAD /objects/{id}`: same headers as GET but no body.
pub async fn head_object(
    State(service): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let manifest = service.stat(&id).await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &manifest)?;
    Ok(response)
}

/// `DELETE /objects/{id}`: remove manifest and chunks.
pub async fn delete_object(
    State(service): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn set_object_headers(headers: &mut HeaderMap, manifest: &Manifest) -> Result<(), AppError> {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(manifest.length));

    let quoted = format!("\"{}\"", manifest.checksum);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&manifest.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if !manifest.metadata.is_empty() {
        headers.insert(METADATA_HEADER, encode_metadata_header(&manifest.metadata)?);
    }
    Ok(())
}

/// Runs while building a response, so failures are server errors.
pub fn encode_metadata_header(metadata: &Metadata) -> Result<HeaderValue, AppError> {
    let json = serde_json::to_vec(metadata).map_err(metadata_encode_error)?;
    // Base64 output is always a valid header value.
    HeaderValue::from_str(&general_purpose::STANDARD.encode(json)).map_err(metadata_encode_error)
}

fn metadata_encode_error(err: impl fmt::Display) -> AppError {
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("encoding {}: {}", METADATA_HEADER, err),
    )
}

pub fn decode_metadata_header(value: &HeaderValue) -> Result<Metadata, AppError> {
    let raw = general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|err| AppError::bad_request(format!("{} is not base64: {}", METADATA_HEADER, err)))?;
    serde_json::from_slice(&raw).map_err(|err| {
        AppError::bad_request(format!(
            "{} must be a base64-encoded JSON object: {}",
            METADATA_HEADER, err
        ))
    })
}
