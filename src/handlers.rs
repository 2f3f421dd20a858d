use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use std::io::Cursor;
use std::sync::Arc;

use crate::engine::TransferError;
use crate::models::{ErrorResponse, StatusResponse, TransferActionResponse, UploadStartResponse};
use crate::state::AppState;
use crate::utils::sanitize_filename;

type HandlerError = (StatusCode, Json<ErrorResponse>);

// map engine errors onto the HTTP surface
fn transfer_error(err: TransferError) -> HandlerError {
    let status = match err {
        TransferError::NotFound => StatusCode::NOT_FOUND,
        TransferError::Conflict => StatusCode::CONFLICT,
        TransferError::Seek(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

// pull the file field out of a multipart body: (filename, bytes)
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), HandlerError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Failed to read multipart field: {}", e),
            }),
        )
    })? {
        let Some(filename) = field.file_name() else {
            continue;
        };

        // sanitize filename to prevent directory traversal
        let sanitized_filename = sanitize_filename(filename);
        if sanitized_filename.is_empty() {
            tracing::warn!("Upload request with unusable filename: {}", filename);
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "No usable filename provided".to_string(),
                }),
            ));
        }
        tracing::debug!("Receiving file: {}", sanitized_filename);

        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file data for {}: {}", sanitized_filename, e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Failed to read file data: {}", e),
                }),
            )
        })?;

        return Ok((sanitized_filename, data.to_vec()));
    }

    tracing::warn!("Upload request contained no file field");
    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "No file provided".to_string(),
        }),
    ))
}

// start a new resumable upload; the transfer keeps running after this returns
pub async fn start_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadStartResponse>, HandlerError> {
    tracing::debug!("Processing upload start request");

    let (file_name, data) = read_file_field(&mut multipart).await?;
    let total_size = data.len() as u64;
    tracing::debug!("File size: {} bytes", total_size);

    let session_id = state
        .engine
        .start(Cursor::new(data), &file_name, total_size)
        .await;
    let status = state.engine.status(&session_id).map_err(transfer_error)?;

    Ok(Json(UploadStartResponse {
        session_id,
        file_name,
        total_chunks: status.total_chunks,
    }))
}

// pause an in-flight upload; the worker stops at its next chunk boundary
pub async fn pause_upload(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<TransferActionResponse>, HandlerError> {
    tracing::debug!("Pause requested for session {}", session_id);
    state.engine.pause(&session_id).map_err(transfer_error)?;

    Ok(Json(TransferActionResponse {
        success: true,
        session_id,
        action: "paused",
    }))
}

// resume a paused upload with a re-sent copy of the file
pub async fn resume_upload(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TransferActionResponse>, HandlerError> {
    tracing::debug!("Resume requested for session {}", session_id);

    let (_, data) = read_file_field(&mut multipart).await?;

    state
        .engine
        .resume(&session_id, Cursor::new(data))
        .await
        .map_err(transfer_error)?;

    Ok(Json(TransferActionResponse {
        success: true,
        session_id,
        action: "resumed",
    }))
}

// cancel an upload; the session permanently rejects resume afterwards
pub async fn cancel_upload(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<TransferActionResponse>, HandlerError> {
    tracing::debug!("Cancel requested for session {}", session_id);
    state.engine.cancel(&session_id).map_err(transfer_error)?;

    Ok(Json(TransferActionResponse {
        success: true,
        session_id,
        action: "cancelled",
    }))
}

// progress snapshot for one upload
pub async fn upload_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, HandlerError> {
    tracing::trace!("Status requested for session {}", session_id);
    let status = state.engine.status(&session_id).map_err(transfer_error)?;
    Ok(Json(StatusResponse::from(status)))
}

// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chunkdrop",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
