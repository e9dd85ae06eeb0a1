pub mod cli;
pub mod ingest;
pub mod pipeline;
mod routes;
pub mod server;
pub mod summarize;
pub mod transcription;

pub use cli::Cli;
pub use ingest::{AudioIngestor, IngestError, ALLOWED_AUDIO_EXTENSIONS};
pub use pipeline::JobPipeline;
pub use server::{AppState, Server};
pub use summarize::Summarizer;
pub use transcription::{TranscriptionEngine, WhisperApiEngine};
