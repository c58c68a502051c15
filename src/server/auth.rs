//! Bearer-token authentication
//!
//! A single shared secret gates the whole API. Clients send it as
//! `Authorization: Bearer <token>`; `/-/verify` lets them check the
//! token and discover the server version in one round trip.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use super::handlers::abort;
use super::AppState;

/// Extract the bearer token from the Authorization header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Check the request's bearer token against the configured secret.
pub(crate) fn is_authenticated(token: &str, headers: &HeaderMap) -> bool {
    matches!(bearer_token(headers), Some(sent) if sent == token)
}

/// Token handshake: 401 on a bad token, otherwise the server version.
pub(crate) async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !is_authenticated(&state.token, &headers) {
        return abort(StatusCode::UNAUTHORIZED, "");
    }

    Json(json!({ "version": crate::VERSION })).into_response()
}
