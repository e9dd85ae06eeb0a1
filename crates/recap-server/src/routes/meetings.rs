use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json as JsonResponse,
};
use recap_db::MeetingSnapshot;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::ingest_error_response;
use crate::server::AppState;

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    success: bool,
    task_id: String,
    message: String,
}

#[derive(Serialize)]
pub(crate) struct DeleteResponse {
    success: bool,
    message: String,
}

pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<JsonResponse<UploadResponse>, (StatusCode, JsonResponse<Value>)> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            JsonResponse(json!({"error": format!("invalid multipart body: {}", e)})),
        )
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    JsonResponse(json!({"error": format!("failed to read upload: {}", e)})),
                )
            })?;
            file = Some((filename, data));
        }
    }

    let (filename, data) = file.ok_or((
        StatusCode::BAD_REQUEST,
        JsonResponse(json!({"error": "No file provided"})),
    ))?;

    let task_id = state
        .ingestor
        .ingest_upload(&filename, &data)
        .await
        .map_err(ingest_error_response)?;

    Ok(JsonResponse(UploadResponse {
        success: true,
        task_id,
        message: "File uploaded successfully. Processing started.".to_string(),
    }))
}

pub(crate) async fn check_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<JsonResponse<MeetingSnapshot>, (StatusCode, JsonResponse<Value>)> {
    let meeting = state
        .db
        .get_by_task_id(&task_id)
        .await
        .map_err(database_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            JsonResponse(json!({"error": "Task not found"})),
        ))?;
    Ok(JsonResponse(meeting.to_snapshot()))
}

pub(crate) async fn list_meetings(
    State(state): State<Arc<AppState>>,
) -> Result<JsonResponse<Vec<MeetingSnapshot>>, (StatusCode, JsonResponse<Value>)> {
    let meetings = state.db.list_meetings().await.map_err(database_error)?;
    Ok(JsonResponse(
        meetings.iter().map(|m| m.to_snapshot()).collect(),
    ))
}

pub(crate) async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<JsonResponse<MeetingSnapshot>, (StatusCode, JsonResponse<Value>)> {
    let meeting = state
        .db
        .get_by_id(id)
        .await
        .map_err(database_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            JsonResponse(json!({"error": "Meeting not found"})),
        ))?;
    Ok(JsonResponse(meeting.to_snapshot()))
}

pub(crate) async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<JsonResponse<DeleteResponse>, (StatusCode, JsonResponse<Value>)> {
    state
        .ingestor
        .delete_meeting(id)
        .await
        .map_err(ingest_error_response)?
        .ok_or((
            StatusCode::NOT_FOUND,
            JsonResponse(json!({"error": "Meeting not found"})),
        ))?;

    Ok(JsonResponse(DeleteResponse {
        success: true,
        message: format!("Meeting {} deleted", id),
    }))
}

fn database_error(e: sqlx::Error) -> (StatusCode, JsonResponse<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        JsonResponse(json!({"error": format!("Database error: {}", e)})),
    )
}
