//! Route handler functions for the HTTP endpoints.

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::socket;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `google`, `microsoft`, or `none`.
    pub connected_service: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let connected_service = state
        .sessions
        .connected_service()
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "none".to_string());
    Json(StatusResponse { connected_service })
}

/// GET /audio/{id}
///
/// Serves a synthesized clip, honouring a single `Range: bytes=` request so
/// browsers can seek.
pub async fn audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let clip = state
        .audio
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Audio clip {} not found", id)))?;
    let length = clip.bytes.len();

    let range = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::BadRequest("Range header is not ASCII".to_string()))?;
            parse_range(value, length)?
        }
        None => None,
    };

    let response = match range {
        Some((start, end)) => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, clip.content_type.as_str())
            .header(header::ACCEPT_RANGES, "bytes")
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, length),
            )
            .header(header::CONTENT_LENGTH, end - start + 1)
            .body(Body::from(clip.bytes[start..=end].to_vec())),
        None => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, clip.content_type.as_str())
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_LENGTH, length)
            .body(Body::from(clip.bytes.to_vec())),
    };
    response.map_err(|e| ApiError::Internal(e.to_string()))
}

/// GET /ws
pub async fn ws(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |connection| socket::serve(connection, state))
}

/// Parse a single `bytes=` range into inclusive offsets.
///
/// `Ok(None)` means the header should be ignored and the whole clip served.
pub fn parse_range(value: &str, length: usize) -> Result<Option<(usize, usize)>, ApiError> {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    // Multi-range requests fall back to the full body.
    if spec.contains(',') {
        return Ok(None);
    }
    let Some((first, last)) = spec.split_once('-') else {
        return Ok(None);
    };
    if length == 0 {
        return Err(ApiError::RangeNotSatisfiable { length });
    }
    let (first, last) = (first.trim(), last.trim());

    let (start, end) = if first.is_empty() {
        // Suffix range: the final N bytes.
        let suffix: usize = match last.parse() {
            Ok(n) if n > 0 => n,
            _ => return Err(ApiError::RangeNotSatisfiable { length }),
        };
        (length.saturating_sub(suffix), length - 1)
    } else {
        let start: usize = first
            .parse()
            .map_err(|_| ApiError::RangeNotSatisfiable { length })?;
        let end = if last.is_empty() {
            length - 1
        } else {
            let end: usize = last
                .parse()
                .map_err(|_| ApiError::RangeNotSatisfiable { length })?;
            end.min(length - 1)
        };
        (start, end)
    };

    if start >= length || start > end {
        return Err(ApiError::RangeNotSatisfiable { length });
    }
    Ok(Some((start, end)))
}
