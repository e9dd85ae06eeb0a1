use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Speech-to-text collaborator. The pipeline only depends on this trait,
/// so tests can substitute a canned engine.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribes the audio file at `audio_path` into plain text.
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// Engine backed by a local whisper-server inference endpoint.
pub struct WhisperApiEngine {
    client: Client,
    endpoint: String,
}

impl WhisperApiEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperApiEngine {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let audio_data = tokio::fs::read(audio_path).await?;
        debug!(
            "sending {} bytes from {} to whisper at {}",
            audio_data.len(),
            audio_path.display(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", content_type_for(audio_path))
            .body(audio_data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_message = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "whisper server returned {}: {}",
                status,
                error_message
            ));
        }

        let result: Value = response.json().await?;
        let transcript = result["text"]
            .as_str()
            .ok_or_else(|| anyhow!("whisper response missing 'text' field"))?
            .trim()
            .to_string();

        info!("transcription done, length: {} chars", transcript.len());
        Ok(transcript)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("mp4") | Some("m4a") => "audio/mp4",
        Some("webm") => "audio/webm",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for(&PathBuf::from("a.wav")), "audio/wav");
        assert_eq!(content_type_for(&PathBuf::from("a.MP3")), "audio/mpeg");
        assert_eq!(content_type_for(&PathBuf::from("a.m4a")), "audio/mp4");
        assert_eq!(content_type_for(&PathBuf::from("a.webm")), "audio/webm");
        assert_eq!(
            content_type_for(&PathBuf::from("no_extension")),
            "application/octet-stream"
        );
    }
}
