use anyhow::{anyhow, Context, Result};
use recap_db::{DatabaseManager, JobStatus};
use recap_events::send_event;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info, warn};

use crate::summarize::Summarizer;
use crate::transcription::TranscriptionEngine;

/// Drives jobs through transcription and summarization.
///
/// Each scheduled job runs on its own task; a semaphore bounds how many are
/// in flight at once, and the rest wait their turn without blocking
/// ingestion. Any stage failure is caught at the top and recorded as a
/// terminal error on the job, never propagated to the caller.
pub struct JobPipeline {
    db: Arc<DatabaseManager>,
    engine: Arc<dyn TranscriptionEngine>,
    summarizer: Summarizer,
    transcripts_dir: PathBuf,
    summaries_dir: PathBuf,
    status_mirror: RwLock<HashMap<String, JobStatus>>,
    permits: Arc<Semaphore>,
}

impl JobPipeline {
    pub fn new(
        db: Arc<DatabaseManager>,
        engine: Arc<dyn TranscriptionEngine>,
        summarizer: Summarizer,
        transcripts_dir: PathBuf,
        summaries_dir: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            db,
            engine,
            summarizer,
            transcripts_dir,
            summaries_dir,
            status_mirror: RwLock::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Queues a job for background processing and returns immediately.
    pub fn schedule(self: &Arc<Self>, task_id: String) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.process_job(&task_id).await {
                error!("processing failed for task {}: {:#}", task_id, e);
                pipeline.fail_job(&task_id, &format!("{:#}", e)).await;
            }
        });
    }

    /// Runs the full transcribe-then-summarize sequence for one job.
    ///
    /// Public so callers that need completion (tests, future batch tooling)
    /// can await it directly instead of polling after `schedule`.
    pub async fn process_job(&self, task_id: &str) -> Result<()> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("job queue closed")?;

        let meeting = self
            .db
            .get_by_task_id(task_id)
            .await?
            .ok_or_else(|| anyhow!("unknown task: {}", task_id))?;
        let audio_path = PathBuf::from(&meeting.file_path);
        if !audio_path.exists() {
            return Err(anyhow!("Recording file not found: {}", meeting.file_path));
        }

        info!("processing task {} ({})", task_id, meeting.filename);
        self.set_status(task_id, JobStatus::Transcribing).await?;

        let transcript = self
            .engine
            .transcribe(&audio_path)
            .await
            .context("transcription failed")?;

        self.write_snapshot(
            self.transcripts_dir
                .join(format!("{}_transcript.txt", task_id)),
            transcript.as_bytes(),
        )
        .await;
        // One write covers the transcript and the move to summarizing.
        self.db.store_transcript(task_id, &transcript).await?;
        self.cache_status(task_id, JobStatus::Summarizing).await;

        let summary = self.summarizer.summarize(&transcript).await;
        let summary_json = serde_json::to_string(&summary)?;

        match serde_json::to_vec_pretty(&summary) {
            Ok(pretty) => {
                self.write_snapshot(
                    self.summaries_dir.join(format!("{}_summary.json", task_id)),
                    &pretty,
                )
                .await
            }
            Err(e) => warn!("could not render summary snapshot for {}: {}", task_id, e),
        }

        self.db
            .complete(task_id, &summary.overview, &summary_json)
            .await?;
        self.cache_status(task_id, JobStatus::Completed).await;
        info!("task {} completed", task_id);

        if let Err(e) = send_event(
            "processing_complete",
            json!({
                "task_id": task_id,
                "transcript": transcript,
                "summary": summary,
            }),
        ) {
            warn!("could not broadcast completion of {}: {}", task_id, e);
        }
        Ok(())
    }

    async fn fail_job(&self, task_id: &str, cause: &str) {
        if let Err(e) = self.db.mark_error(task_id, cause).await {
            error!("could not record error status for {}: {}", task_id, e);
        }
        self.cache_status(task_id, JobStatus::Error).await;
        let _ = send_event(
            "processing_error",
            json!({"task_id": task_id, "error": cause}),
        );
    }

    /// Persists a status change and mirrors it in memory.
    pub async fn set_status(&self, task_id: &str, status: JobStatus) -> Result<(), sqlx::Error> {
        self.db.update_status(task_id, status).await?;
        self.cache_status(task_id, status).await;
        Ok(())
    }

    /// Updates only the in-memory mirror; used when the database write
    /// already happened as part of a larger statement.
    pub async fn cache_status(&self, task_id: &str, status: JobStatus) {
        self.status_mirror
            .write()
            .await
            .insert(task_id.to_string(), status);
    }

    pub async fn cached_status(&self, task_id: &str) -> Option<JobStatus> {
        self.status_mirror.read().await.get(task_id).copied()
    }

    /// Drops a job from the mirror, e.g. after its row is deleted.
    pub async fn forget(&self, task_id: &str) {
        self.status_mirror.write().await.remove(task_id);
    }

    /// Number of mirrored jobs not yet in a terminal state.
    pub async fn active_jobs(&self) -> usize {
        self.status_mirror
            .read()
            .await
            .values()
            .filter(|status| !status.is_terminal())
            .count()
    }

    async fn write_snapshot(&self, path: PathBuf, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!("could not create snapshot dir {}: {}", parent.display(), e);
                    return;
                }
            }
        }
        if let Err(e) = tokio::fs::write(&path, contents).await {
            warn!("could not write snapshot {}: {}", path.display(), e);
        }
    }
}
