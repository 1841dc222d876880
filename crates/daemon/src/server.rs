//! HTTP surface for the chunkstream daemon.
//!
//! Three handlers feed the core with already-decoded values: chunk upload,
//! registry status, and process requests. Everything else falls through to
//! a static file server rooted at the configured directory, which also
//! serves the encoder outputs under `videostore/`.

use crate::job::{JobCoordinator, StartOutcome};
use crate::registry::SharedRegistry;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Upload bodies carry one chunk plus its form fields
const MAX_UPLOAD_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Errors that can occur when running the HTTP server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(std::io::Error),

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    registry: SharedRegistry,
    coordinator: Arc<JobCoordinator>,
    upload_dir: PathBuf,
}

impl AppState {
    /// Create the handler state
    pub fn new(
        registry: SharedRegistry,
        coordinator: Arc<JobCoordinator>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            coordinator,
            upload_dir,
        }
    }
}

/// Creates the axum Router with the upload, status, and process endpoints
/// plus the static-file fallback.
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/file-info", get(get_file_info))
        .route("/process-video", post(process_video))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Handler for POST /upload
///
/// Consumes multipart fields `fileChunk`, `fileId`, and `fileName`, ensures
/// the registry record exists, and appends the chunk bytes to
/// `{upload_dir}/{fileId}_{fileName}`.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, &'static str) {
    let mut file_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut chunk: Option<Bytes> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or("").to_string();
                match name.as_str() {
                    "fileId" => match field.text().await {
                        Ok(value) => file_id = Some(value),
                        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid fileId field"),
                    },
                    "fileName" => match field.text().await {
                        Ok(value) => file_name = Some(value),
                        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid fileName field"),
                    },
                    "fileChunk" => match field.bytes().await {
                        Ok(bytes) => chunk = Some(bytes),
                        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid file chunk"),
                    },
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid file chunk"),
        }
    }

    let Some(chunk) = chunk else {
        return (StatusCode::BAD_REQUEST, "Invalid file chunk");
    };
    let (Some(file_id), Some(file_name)) = (file_id, file_name) else {
        return (StatusCode::BAD_REQUEST, "Missing fileId or fileName field");
    };
    if file_id.is_empty() || file_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing fileId or fileName field");
    }

    state.registry.ensure(&file_id, &file_name);

    let dest = state.upload_dir.join(format!("{}_{}", file_id, file_name));
    let mut dest_file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&dest)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            error!(path = %dest.display(), error = %e, "failed to open upload destination");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating or opening destination file",
            );
        }
    };

    if let Err(e) = dest_file.write_all(&chunk).await {
        error!(path = %dest.display(), error = %e, "failed to append chunk");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error copying file");
    }
    // tokio::fs::File completes writes on a background task; flush before
    // responding so a 200 means the chunk has reached the file.
    if let Err(e) = dest_file.flush().await {
        error!(path = %dest.display(), error = %e, "failed to append chunk");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error copying file");
    }

    info!(file_id = %file_id, bytes = chunk.len(), "chunk appended");
    (StatusCode::OK, "File chunk uploaded successfully")
}

/// Handler for GET /file-info
///
/// Returns the whole registry as a JSON map of file id to record.
async fn get_file_info(State(state): State<AppState>) -> Response {
    match state.registry.serialize() {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize registry");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Not able to get all the file info at the moment",
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessVideoForm {
    #[serde(rename = "fileId")]
    file_id: String,
}

/// Handler for POST /process-video
///
/// Starts the processing pass and acknowledges immediately. An unknown file
/// id or an already-running pass is logged by the coordinator; the response
/// does not distinguish those cases.
async fn process_video(
    State(state): State<AppState>,
    Form(form): Form<ProcessVideoForm>,
) -> (StatusCode, &'static str) {
    let outcome = state.coordinator.start_job(&form.file_id);
    if matches!(outcome, StartOutcome::Started(_)) {
        info!(file_id = %form.file_id, "processing job started");
    }
    (StatusCode::OK, "Started processing")
}
