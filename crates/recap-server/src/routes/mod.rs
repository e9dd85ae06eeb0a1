pub mod health;
pub mod meetings;
pub mod websocket;

use axum::http::StatusCode;
use axum::response::Json as JsonResponse;
use serde_json::{json, Value};

use crate::ingest::IngestError;

/// Maps ingestion failures onto HTTP statuses: client mistakes are 4xx,
/// storage problems are 500.
pub(crate) fn ingest_error_response(e: IngestError) -> (StatusCode, JsonResponse<Value>) {
    let status = match &e {
        IngestError::NoFileProvided
        | IngestError::EmptyFilename
        | IngestError::InvalidFileType(_) => StatusCode::BAD_REQUEST,
        IngestError::UnknownSession(_) => StatusCode::NOT_FOUND,
        IngestError::MissingArtifact(_) | IngestError::Database(_) | IngestError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, JsonResponse(json!({"error": e.to_string()})))
}
