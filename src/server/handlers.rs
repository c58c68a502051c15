//! Request handlers for the note API
//!
//! Store outcomes map to transport codes here and nowhere else:
//! absence becomes 404, a version mismatch becomes 409, and any other
//! store failure becomes 500 with the detail kept to the logs. Mutating
//! requests carry the caller's last-known version token in the
//! `If-Match` header.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;

use crate::database::scratches::{ScratchDraft, ScratchPatch};
use crate::error::StoreError;

use super::auth;
use super::AppState;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// JSON error envelope. An empty message sends the status alone.
pub(crate) fn abort(code: StatusCode, message: &str) -> Response {
    if message.is_empty() {
        return code.into_response();
    }

    (
        code,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Positive record identifier from the URL path.
fn parse_id(raw: &str) -> Option<i64> {
    let id = raw.parse::<i64>().ok()?;
    (id > 0).then_some(id)
}

/// Expected version token from the If-Match header. Surrounding ASCII
/// quotes are tolerated so ETag-style clients work unchanged.
fn expected_version(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::IF_MATCH)?.to_str().ok()?;
    let version = raw.trim().trim_matches('"').trim();
    (!version.is_empty()).then(|| version.to_string())
}

pub(crate) async fn list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !auth::is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    match state.db.scratches().find_all() {
        Ok(scratches) => Json(scratches).into_response(),
        Err(e) => {
            tracing::warn!("failed to find all: {}", e);
            abort(StatusCode::INTERNAL_SERVER_ERROR, "failed to list")
        }
    }
}

pub(crate) async fn get_one(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !auth::is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let Some(id) = parse_id(&raw_id) else {
        return abort(StatusCode::BAD_REQUEST, "invalid id");
    };

    match state.db.scratches().find(id) {
        Ok(Some(scratch)) => Json(scratch).into_response(),
        Ok(None) => abort(StatusCode::NOT_FOUND, ""),
        Err(e) => {
            tracing::warn!("failed to get: {}", e);
            abort(StatusCode::INTERNAL_SERVER_ERROR, "failed to get")
        }
    }
}

pub(crate) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !auth::is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let draft: ScratchDraft = match serde_json::from_slice(&body) {
        Ok(draft) => draft,
        Err(e) => {
            tracing::warn!("bad request: {}", e);
            return abort(StatusCode::BAD_REQUEST, "bad request");
        }
    };

    match state.db.scratches().create(&draft) {
        Ok((id, version)) => (
            StatusCode::CREATED,
            Json(json!({ "id": id, "version": version })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("failed to create: {}", e);
            abort(StatusCode::INTERNAL_SERVER_ERROR, "failed to create")
        }
    }
}

pub(crate) async fn update(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !auth::is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let Some(id) = parse_id(&raw_id) else {
        return abort(StatusCode::BAD_REQUEST, "invalid id");
    };

    let Some(expected) = expected_version(&headers) else {
        return abort(StatusCode::BAD_REQUEST, "missing version");
    };

    let patch: ScratchPatch = match serde_json::from_slice(&body) {
        Ok(patch) => patch,
        Err(e) => {
            tracing::warn!("bad request: {}", e);
            return abort(StatusCode::BAD_REQUEST, "bad request");
        }
    };

    match state.db.scratches().update(id, &expected, &patch) {
        Ok(version) => Json(json!({ "version": version })).into_response(),
        Err(StoreError::VersionMismatch) => abort(StatusCode::CONFLICT, "version mismatch"),
        Err(e) => {
            tracing::warn!("failed to update: {}", e);
            abort(StatusCode::INTERNAL_SERVER_ERROR, "failed to update")
        }
    }
}

pub(crate) async fn delete_one(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !auth::is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let Some(id) = parse_id(&raw_id) else {
        return abort(StatusCode::BAD_REQUEST, "invalid id");
    };

    let Some(expected) = expected_version(&headers) else {
        return abort(StatusCode::BAD_REQUEST, "missing version");
    };

    match state.db.scratches().delete(id, &expected) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(StoreError::VersionMismatch) => abort(StatusCode::CONFLICT, "version mismatch"),
        Err(e) => {
            tracing::warn!("failed to delete: {}", e);
            abort(StatusCode::INTERNAL_SERVER_ERROR, "failed to delete")
        }
    }
}
