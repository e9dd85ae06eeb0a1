use anyhow::Result;
use async_trait::async_trait;
use recap_db::{DatabaseManager, JobStatus, NewMeeting, RecordingKind};
use recap_server::{AudioIngestor, IngestError, JobPipeline, Summarizer, TranscriptionEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct EchoEngine;

#[async_trait]
impl TranscriptionEngine for EchoEngine {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path).await?;
        Ok(format!("{} bytes of audio", bytes.len()))
    }
}

async fn setup() -> (Arc<DatabaseManager>, Arc<AudioIngestor>, TempDir) {
    let data_dir = tempfile::tempdir().unwrap();
    let uploads = data_dir.path().join("uploads");
    let transcripts = data_dir.path().join("transcriptions");
    let summaries = data_dir.path().join("summaries");
    for dir in [&uploads, &transcripts, &summaries] {
        tokio::fs::create_dir_all(dir).await.unwrap();
    }
    let db = Arc::new(DatabaseManager::new("sqlite::memory:").await.unwrap());
    let pipeline = Arc::new(JobPipeline::new(
        db.clone(),
        Arc::new(EchoEngine),
        Summarizer::new("http://127.0.0.1:9", "llama3"),
        transcripts,
        summaries,
        2,
    ));
    let ingestor = Arc::new(AudioIngestor::new(db.clone(), uploads, pipeline));
    (db, ingestor, data_dir)
}

#[tokio::test]
async fn test_upload_validation_rejects_bad_input() {
    let (db, ingestor, _dir) = setup().await;

    let err = ingestor.ingest_upload("notes.txt", b"hello").await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidFileType(_)));

    let err = ingestor.ingest_upload("", b"hello").await.unwrap_err();
    assert!(matches!(err, IngestError::EmptyFilename));

    let err = ingestor.ingest_upload("meeting.mp3", b"").await.unwrap_err();
    assert!(matches!(err, IngestError::NoFileProvided));

    // A rejected upload must not leave a job behind.
    assert_eq!(db.count_meetings().await.unwrap(), 0);
}

#[tokio::test]
async fn test_live_session_roundtrip() {
    let (db, ingestor, _dir) = setup().await;

    let session_id = ingestor.begin_live_session().await.unwrap();
    let meeting = db.get_by_task_id(&session_id).await.unwrap().unwrap();
    assert_eq!(meeting.status, JobStatus::Recording);
    assert_eq!(meeting.recording_type, RecordingKind::Live);
    assert!(meeting.filename.ends_with("_recording.webm"));

    // Each payload carries the whole recording so far and replaces the file.
    let written = ingestor
        .append_live_audio(&session_id, b"first-chunk")
        .await
        .unwrap();
    assert_eq!(written, 11);
    let written = ingestor
        .append_live_audio(&session_id, b"first-chunk-and-more")
        .await
        .unwrap();
    assert_eq!(written, 20);
    let on_disk = tokio::fs::read(&meeting.file_path).await.unwrap();
    assert_eq!(on_disk, b"first-chunk-and-more");

    ingestor.finalize_live_session(&session_id).await.unwrap();

    // Finalize schedules the pipeline; the echo engine sees the final bytes.
    let mut status = JobStatus::Processing;
    for _ in 0..200 {
        status = db
            .get_by_task_id(&session_id)
            .await
            .unwrap()
            .unwrap()
            .status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status, JobStatus::Completed);
    let meeting = db.get_by_task_id(&session_id).await.unwrap().unwrap();
    assert_eq!(meeting.transcript.as_deref(), Some("20 bytes of audio"));
}

#[tokio::test]
async fn test_live_session_operations_require_active_session() {
    let (_db, ingestor, _dir) = setup().await;

    let err = ingestor
        .append_live_audio("20991231_000000_000", b"data")
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnknownSession(_)));

    let err = ingestor
        .finalize_live_session("20991231_000000_000")
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnknownSession(_)));
}

#[tokio::test]
async fn test_finalized_session_cannot_be_appended() {
    let (_db, ingestor, _dir) = setup().await;

    let session_id = ingestor.begin_live_session().await.unwrap();
    ingestor
        .append_live_audio(&session_id, b"some audio")
        .await
        .unwrap();
    ingestor.finalize_live_session(&session_id).await.unwrap();

    let err = ingestor
        .append_live_audio(&session_id, b"late audio")
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnknownSession(_)));
}

#[tokio::test]
async fn test_delete_meeting_whose_artifact_is_already_gone() {
    let (db, ingestor, dir) = setup().await;

    // The row points at an artifact that no longer exists on disk.
    let missing_path = dir.path().join("uploads").join("20240101_120000_200_gone.mp3");
    db.insert_meeting(&NewMeeting {
        task_id: "20240101_120000_200",
        filename: "20240101_120000_200_gone.mp3",
        file_path: &missing_path.to_string_lossy(),
        status: JobStatus::Completed,
        recording_type: RecordingKind::Upload,
    })
    .await
    .unwrap();
    let id = db
        .get_by_task_id("20240101_120000_200")
        .await
        .unwrap()
        .unwrap()
        .id;

    // Deletion still succeeds and the meeting leaves the listing.
    let deleted = ingestor.delete_meeting(id).await.unwrap().expect("row existed");
    assert_eq!(deleted.task_id, "20240101_120000_200");
    assert!(db.list_meetings().await.unwrap().is_empty());
    assert!(ingestor.delete_meeting(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_meeting_removes_artifact() {
    let (db, ingestor, _dir) = setup().await;

    let task_id = ingestor
        .ingest_upload("cleanup.wav", b"RIFF....WAVE")
        .await
        .unwrap();
    let meeting = db.get_by_task_id(&task_id).await.unwrap().unwrap();

    // Let the background job finish with the file before deleting it.
    for _ in 0..200 {
        if db
            .get_by_task_id(&task_id)
            .await
            .unwrap()
            .unwrap()
            .status
            .is_terminal()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    ingestor
        .delete_meeting(meeting.id)
        .await
        .unwrap()
        .expect("row existed");
    assert!(!std::path::Path::new(&meeting.file_path).exists());
    assert!(db.get_by_id(meeting.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_finalize_without_audio_reports_missing_artifact() {
    let (_db, ingestor, _dir) = setup().await;

    let session_id = ingestor.begin_live_session().await.unwrap();
    // No audio_data ever arrived, so there is no artifact to process.
    let err = ingestor.finalize_live_session(&session_id).await.unwrap_err();
    assert!(matches!(err, IngestError::MissingArtifact(_)));
}
