use recap_db::MeetingSummary;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Upper bound on a single Ollama generation call.
pub const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(120);

/// Summarizes transcripts with a local Ollama model.
///
/// Summarization never fails outward: a transport or model failure yields a
/// degraded summary naming the cause, and unparseable model output yields a
/// generic fallback. Both still carry all four summary fields.
pub struct Summarizer {
    client: Client,
    base_url: String,
    model: String,
}

impl Summarizer {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(SUMMARIZE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub async fn summarize(&self, transcript: &str) -> MeetingSummary {
        match self.generate(transcript).await {
            Ok(raw) => parse_summary(&raw),
            Err(e) => {
                error!("summarization request failed: {:#}", e);
                degraded_summary(&e.to_string())
            }
        }
    }

    async fn generate(&self, transcript: &str) -> anyhow::Result<String> {
        let prompt = build_prompt(transcript);
        debug!(
            "requesting summary from {} (model {}, transcript {} chars)",
            self.base_url,
            self.model,
            transcript.len()
        );

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("ollama returned {}", status);
        }

        let body: serde_json::Value = response.json().await?;
        let text = body["response"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("ollama response missing 'response' field"))?;
        Ok(text.to_string())
    }
}

fn build_prompt(transcript: &str) -> String {
    format!(
        "Analyze this meeting transcript and provide a structured summary in JSON format.\n\
         \n\
         Transcript:\n\
         {transcript}\n\
         \n\
         Please provide a JSON response with exactly these fields:\n\
         1. \"overview\": A brief 2-3 sentence summary of the meeting\n\
         2. \"key_points\": An array of the main discussion points (3-6 items)\n\
         3. \"action_items\": An array of tasks or actions mentioned (if any)\n\
         4. \"decisions\": An array of decisions made during the meeting (if any)\n\
         \n\
         IMPORTANT: Return ONLY the raw JSON object. Do not include any markdown \
         formatting, code blocks, or explanatory text before or after the JSON."
    )
}

/// Turns raw model output into a summary, tolerating the usual model quirks:
/// markdown code fences around the JSON, and prose before or after it.
pub(crate) fn parse_summary(raw: &str) -> MeetingSummary {
    let cleaned = strip_code_fences(raw);
    if let Ok(summary) = serde_json::from_str::<MeetingSummary>(cleaned) {
        return summary;
    }

    warn!("model output was not clean json, attempting recovery");
    if let Some(region) = first_json_object(raw) {
        if let Ok(summary) = serde_json::from_str::<MeetingSummary>(region) {
            return summary;
        }
    }

    warn!("could not recover a summary from model output");
    fallback_summary()
}

/// Removes one leading ```` ```json ````/```` ``` ```` marker and one
/// trailing ```` ``` ```` marker, if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let opened = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let closed = opened
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(opened);
    closed.trim()
}

/// Finds the first balanced `{...}` region, skipping braces inside string
/// literals.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Summary used when the model responded but its output could not be parsed.
pub(crate) fn fallback_summary() -> MeetingSummary {
    MeetingSummary {
        overview: "See full transcript for details".to_string(),
        key_points: vec!["See full transcript".to_string()],
        action_items: vec![],
        decisions: vec![],
    }
}

/// Summary used when the model could not be reached at all.
pub(crate) fn degraded_summary(cause: &str) -> MeetingSummary {
    MeetingSummary {
        overview: format!("Error generating summary: {}", cause),
        key_points: vec!["See full transcript".to_string()],
        action_items: vec![],
        decisions: vec![],
    }
}
