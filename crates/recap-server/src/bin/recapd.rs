use clap::Parser;
use recap_db::DatabaseManager;
use recap_server::{
    AudioIngestor, Cli, JobPipeline, Server, Summarizer, TranscriptionEngine, WhisperApiEngine,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let data_dir = cli.resolved_data_dir();
    let uploads_dir = data_dir.join("uploads");
    let transcripts_dir = data_dir.join("transcriptions");
    let summaries_dir = data_dir.join("summaries");
    for dir in [&data_dir, &uploads_dir, &transcripts_dir, &summaries_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let db_path = data_dir.join("meetings.db");
    let db = Arc::new(DatabaseManager::new(&db_path.to_string_lossy()).await?);
    info!("database ready at {}", db_path.display());

    let engine: Arc<dyn TranscriptionEngine> = Arc::new(WhisperApiEngine::new(&cli.whisper_url));
    let summarizer = Summarizer::new(&cli.ollama_url, &cli.ollama_model);
    let pipeline = Arc::new(JobPipeline::new(
        db.clone(),
        engine,
        summarizer,
        transcripts_dir,
        summaries_dir,
        cli.max_concurrent_jobs,
    ));
    let ingestor = Arc::new(AudioIngestor::new(db.clone(), uploads_dir, pipeline.clone()));

    info!(
        "transcribing with whisper at {}, summarizing with {} via ollama at {}",
        cli.whisper_url, cli.ollama_model, cli.ollama_url
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let server = Server::new(
        db,
        ingestor,
        pipeline,
        addr,
        cli.max_upload_mb * 1024 * 1024,
    );
    server.start().await
}
