use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "recapd",
    about = "Record or upload meeting audio, get transcripts and structured summaries. \
             Everything runs locally: whisper for speech-to-text, ollama for summaries.",
    version
)]
pub struct Cli {
    /// Port to listen on
    #[arg(short = 'p', long, env = "RECAP_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Directory for the database and audio artifacts (default: ~/.recap)
    #[arg(long, env = "RECAP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Whisper-server inference endpoint
    #[arg(
        long,
        env = "RECAP_WHISPER_URL",
        default_value = "http://localhost:8178/inference"
    )]
    pub whisper_url: String,

    /// Ollama base URL
    #[arg(long, env = "RECAP_OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Ollama model used for summarization
    #[arg(long, env = "RECAP_OLLAMA_MODEL", default_value = "llama3")]
    pub ollama_model: String,

    /// Maximum accepted upload size, in megabytes
    #[arg(long, env = "RECAP_MAX_UPLOAD_MB", default_value_t = 500)]
    pub max_upload_mb: usize,

    /// How many jobs may transcribe/summarize at the same time
    #[arg(long, env = "RECAP_MAX_CONCURRENT_JOBS", default_value_t = 4)]
    pub max_concurrent_jobs: usize,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(".recap"))
                .unwrap_or_else(|| PathBuf::from(".recap")),
        }
    }
}
