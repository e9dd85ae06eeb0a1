use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Lifecycle of a meeting job. Stored as lowercase text in the `meetings`
/// table and rendered the same way in API responses.
///
/// Transitions only move forward:
/// `uploaded`/`recording` -> `processing` -> `transcribing` -> `summarizing`
/// -> `completed`, with `error` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Recording,
    Processing,
    Transcribing,
    Summarizing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// How the audio artifact entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecordingKind {
    Upload,
    Live,
}

/// Structured summary produced from a transcript. All four fields are
/// required; a model response missing any of them is not accepted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub overview: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub decisions: Vec<String>,
}

/// Fields needed to create a meeting row. Everything else starts empty.
#[derive(Debug)]
pub struct NewMeeting<'a> {
    pub task_id: &'a str,
    pub filename: &'a str,
    pub file_path: &'a str,
    pub status: JobStatus,
    pub recording_type: RecordingKind,
}

/// A full row from the `meetings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Meeting {
    pub id: i64,
    pub task_id: String,
    pub filename: String,
    pub file_path: String,
    pub status: JobStatus,
    pub transcript: Option<String>,
    pub summary_overview: Option<String>,
    pub summary_data: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recording_type: RecordingKind,
}

impl Meeting {
    /// API view of a meeting. The on-disk artifact path stays internal.
    pub fn to_snapshot(&self) -> MeetingSnapshot {
        let summary = match self.summary_data.as_deref() {
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("stored summary for {} is not valid json: {}", self.task_id, e);
                    None
                }
            },
            None => None,
        };
        MeetingSnapshot {
            id: self.id,
            task_id: self.task_id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            transcript: self.transcript.clone(),
            summary,
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            recording_type: self.recording_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingSnapshot {
    pub id: i64,
    pub task_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub transcript: Option<String>,
    pub summary: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recording_type: RecordingKind,
}
