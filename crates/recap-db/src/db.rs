use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::debug;

use crate::types::{JobStatus, Meeting, NewMeeting};

const MEETING_COLUMNS: &str = "id, task_id, filename, file_path, status, transcript, \
     summary_overview, summary_data, error_message, created_at, completed_at, recording_type";

pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    /// Opens (creating if needed) the meetings database and runs migrations.
    ///
    /// Accepts either a filesystem path or a full `sqlite:` connection
    /// string, so tests can pass `sqlite::memory:`.
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        debug!("initializing meetings database at {}", database_path);
        let connection_string = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite:{}", database_path)
        };

        let connect_options: SqliteConnectOptions = connection_string
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            // busy_timeout is per-connection; setting it here covers every
            // pooled connection.
            .busy_timeout(Duration::from_secs(30))
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL");

        // An in-memory database exists per connection, so the pool must be
        // pinned to a single connection or the migrated schema is lost.
        let max_connections = if connection_string.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(DatabaseManager { pool })
    }

    /// Creates a meeting row and returns its numeric id.
    pub async fn insert_meeting(&self, meeting: &NewMeeting<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO meetings (task_id, filename, file_path, status, recording_type, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(meeting.task_id)
        .bind(meeting.filename)
        .bind(meeting.file_path)
        .bind(meeting.status)
        .bind(meeting.recording_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_task_id(&self, task_id: &str) -> Result<Option<Meeting>, sqlx::Error> {
        sqlx::query_as::<_, Meeting>(&format!(
            "SELECT {} FROM meetings WHERE task_id = ?1",
            MEETING_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Meeting>, sqlx::Error> {
        sqlx::query_as::<_, Meeting>(&format!(
            "SELECT {} FROM meetings WHERE id = ?1",
            MEETING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// All meetings, newest first.
    pub async fn list_meetings(&self) -> Result<Vec<Meeting>, sqlx::Error> {
        sqlx::query_as::<_, Meeting>(&format!(
            "SELECT {} FROM meetings ORDER BY created_at DESC, id DESC",
            MEETING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_meetings(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM meetings")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn update_status(
        &self,
        task_id: &str,
        status: JobStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE meetings SET status = ?1 WHERE task_id = ?2")
            .bind(status)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records the transcript and moves the job to `summarizing` in one
    /// write, so a crash between the stages cannot leave a transcript
    /// attached to a job that still claims to be transcribing.
    pub async fn store_transcript(
        &self,
        task_id: &str,
        transcript: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE meetings SET transcript = ?1, status = ?2 WHERE task_id = ?3")
            .bind(transcript)
            .bind(JobStatus::Summarizing)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Marks the job completed with its summary and completion time.
    /// `summary_json` is the serialized summary object; `overview` is
    /// duplicated into its own column for cheap listing queries.
    pub async fn complete(
        &self,
        task_id: &str,
        overview: &str,
        summary_json: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE meetings SET status = ?1, summary_overview = ?2, summary_data = ?3, \
             completed_at = ?4 WHERE task_id = ?5",
        )
        .bind(JobStatus::Completed)
        .bind(overview)
        .bind(summary_json)
        .bind(Utc::now())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Moves the job to terminal error, recording why it failed so polling
    /// clients can see the cause, not just the state.
    pub async fn mark_error(&self, task_id: &str, cause: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE meetings SET status = ?1, error_message = ?2 WHERE task_id = ?3")
            .bind(JobStatus::Error)
            .bind(cause)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes a meeting row, returning it so the caller can clean up the
    /// audio artifact. `None` if no row had that id.
    pub async fn delete_meeting(&self, id: i64) -> Result<Option<Meeting>, sqlx::Error> {
        let meeting = self.get_by_id(id).await?;
        if meeting.is_some() {
            sqlx::query("DELETE FROM meetings WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(meeting)
    }
}
