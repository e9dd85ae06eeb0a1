use chrono::Utc;
use recap_db::{DatabaseManager, JobStatus, NewMeeting, RecordingKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::JobPipeline;

/// Audio container formats accepted for ingestion.
pub const ALLOWED_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "mp4", "m4a", "webm", "ogg"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No file provided")]
    NoFileProvided,
    #[error("No file selected")]
    EmptyFilename,
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("No active recording session: {0}")]
    UnknownSession(String),
    #[error("Recording file not found: {0}")]
    MissingArtifact(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Front door for audio entering the system. Validates uploads, owns live
/// recording sessions, persists artifacts and job rows, and hands finished
/// artifacts to the pipeline.
pub struct AudioIngestor {
    db: Arc<DatabaseManager>,
    uploads_dir: PathBuf,
    pipeline: Arc<JobPipeline>,
}

impl AudioIngestor {
    pub fn new(db: Arc<DatabaseManager>, uploads_dir: PathBuf, pipeline: Arc<JobPipeline>) -> Self {
        Self {
            db,
            uploads_dir,
            pipeline,
        }
    }

    /// Accepts an uploaded file, creates its job row, and schedules
    /// processing. Returns the new task id; processing continues in the
    /// background.
    pub async fn ingest_upload(&self, filename: &str, payload: &[u8]) -> Result<String, IngestError> {
        if payload.is_empty() {
            return Err(IngestError::NoFileProvided);
        }
        if filename.is_empty() {
            return Err(IngestError::EmptyFilename);
        }
        if !allowed_file(filename) {
            return Err(IngestError::InvalidFileType(filename.to_string()));
        }

        let task_id = new_task_id();
        let stored_name = format!("{}_{}", task_id, sanitize_filename(filename));
        let file_path = self.uploads_dir.join(&stored_name);
        tokio::fs::write(&file_path, payload).await?;

        self.db
            .insert_meeting(&NewMeeting {
                task_id: &task_id,
                filename: &stored_name,
                file_path: &file_path.to_string_lossy(),
                status: JobStatus::Uploaded,
                recording_type: RecordingKind::Upload,
            })
            .await?;
        self.pipeline.cache_status(&task_id, JobStatus::Uploaded).await;

        info!(
            "accepted upload {} ({} bytes), task {}",
            stored_name,
            payload.len(),
            task_id
        );
        self.pipeline.schedule(task_id.clone());
        Ok(task_id)
    }

    /// Opens a live recording session and returns its id, which doubles as
    /// the task id once the session is finalized.
    pub async fn begin_live_session(&self) -> Result<String, IngestError> {
        let session_id = new_task_id();
        let filename = format!("{}_recording.webm", session_id);
        let file_path = self.uploads_dir.join(&filename);

        self.db
            .insert_meeting(&NewMeeting {
                task_id: &session_id,
                filename: &filename,
                file_path: &file_path.to_string_lossy(),
                status: JobStatus::Recording,
                recording_type: RecordingKind::Live,
            })
            .await?;
        self.pipeline
            .cache_status(&session_id, JobStatus::Recording)
            .await;

        info!("live recording session {} started", session_id);
        Ok(session_id)
    }

    /// Stores the audio captured so far for a live session. Each payload is
    /// the full recording from the start, so it replaces the artifact.
    /// Returns the number of bytes written.
    pub async fn append_live_audio(
        &self,
        session_id: &str,
        payload: &[u8],
    ) -> Result<usize, IngestError> {
        let meeting = self.live_session(session_id).await?;
        tokio::fs::write(&meeting.file_path, payload).await?;
        Ok(payload.len())
    }

    /// Closes a live session and schedules processing of its artifact.
    pub async fn finalize_live_session(&self, session_id: &str) -> Result<(), IngestError> {
        let meeting = self.live_session(session_id).await?;
        if !Path::new(&meeting.file_path).exists() {
            return Err(IngestError::MissingArtifact(meeting.file_path));
        }

        self.db
            .update_status(session_id, JobStatus::Processing)
            .await?;
        self.pipeline
            .cache_status(session_id, JobStatus::Processing)
            .await;

        info!("live recording session {} stopped, processing", session_id);
        self.pipeline.schedule(session_id.to_string());
        Ok(())
    }

    /// Deletes a meeting and its audio artifact. The record removal is what
    /// counts; an artifact that is already gone (or cannot be removed) only
    /// gets a log line. Returns the deleted row, `None` for unknown ids.
    pub async fn delete_meeting(&self, id: i64) -> Result<Option<recap_db::Meeting>, IngestError> {
        let Some(meeting) = self.db.delete_meeting(id).await? else {
            return Ok(None);
        };

        match tokio::fs::remove_file(&meeting.file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not delete audio file {}: {}", meeting.file_path, e),
        }
        self.pipeline.forget(&meeting.task_id).await;

        info!("deleted meeting {} ({})", id, meeting.filename);
        Ok(Some(meeting))
    }

    /// Looks up a session that is still recording.
    async fn live_session(&self, session_id: &str) -> Result<recap_db::Meeting, IngestError> {
        match self.db.get_by_task_id(session_id).await? {
            Some(meeting) if meeting.status == JobStatus::Recording => Ok(meeting),
            _ => Err(IngestError::UnknownSession(session_id.to_string())),
        }
    }
}

/// Task ids are derived from the ingestion time, down to milliseconds so
/// back-to-back ingestions in the same second get distinct ids.
fn new_task_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Flattens anything outside a conservative character set, so client-supplied
/// names cannot traverse out of the uploads directory.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file_accepts_known_audio_extensions() {
        for name in [
            "meeting.mp3",
            "meeting.wav",
            "meeting.mp4",
            "meeting.m4a",
            "meeting.webm",
            "meeting.ogg",
            "MEETING.MP3",
            "weekly sync.final.Wav",
        ] {
            assert!(allowed_file(name), "{} should be allowed", name);
        }
    }

    #[test]
    fn test_allowed_file_rejects_everything_else() {
        for name in ["notes.txt", "malware.exe", "archive.tar.gz", "mp3", "noext", ""] {
            assert!(!allowed_file(name), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_sanitize_filename_neutralizes_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("team sync (v2).mp3"), "team_sync__v2_.mp3");
        assert_eq!(sanitize_filename("plain-name_1.wav"), "plain-name_1.wav");
    }

    #[test]
    fn test_task_id_shape() {
        let id = new_task_id();
        // YYYYMMDD_HHMMSS_mmm
        assert_eq!(id.len(), 19);
        assert_eq!(&id[8..9], "_");
        assert_eq!(&id[15..16], "_");
        assert!(id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }
}
