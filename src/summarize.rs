use async_trait::async_trait;
use eyre::{Result, bail};
use log::debug;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts the key points a student \
should have noted from a video transcript. Focus on important facts, dates, names, figures, key concepts, \
and main conclusions. Keep each point short and concise. \
Respond with a JSON array of strings and nothing else.";

/// The summarization capability: transcript text in, key points out.
/// Consumed as an opaque collaborator by the review pipeline.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, transcript_text: &str, target_count: u32, language: Option<&str>) -> Result<Vec<String>>;
}

/// Summarizer backed by a hosted LLM, selected by model name
pub struct LlmSummarizer {
    client: reqwest::Client,
    model: String,
}

impl LlmSummarizer {
    pub fn new(client: reqwest::Client, model: impl Into<String>) -> Self {
        LlmSummarizer {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarize for LlmSummarizer {
    async fn summarize(&self, transcript_text: &str, target_count: u32, language: Option<&str>) -> Result<Vec<String>> {
        let user_message = build_prompt(transcript_text, target_count, language);

        let text = if is_anthropic_model(&self.model) {
            summarize_anthropic(&self.client, &user_message, &self.model).await?
        } else {
            summarize_openai(&self.client, &user_message, &self.model).await?
        };

        parse_points(&text)
    }
}

fn build_prompt(transcript_text: &str, target_count: u32, language: Option<&str>) -> String {
    let language_line = match language {
        Some(lang) => format!("Respond in the language with code \"{lang}\"."),
        None => "Respond in the same language as the transcript.".to_string(),
    };
    format!(
        "Extract the {target_count} most important key points from this video transcript. \
{language_line}\n\nTranscript:\n{transcript_text}"
    )
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

/// The model replies with a JSON array of strings, possibly fenced
fn parse_points(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    let points: Vec<String> = match serde_json::from_str(body.trim()) {
        Ok(points) => points,
        Err(e) => bail!("model did not return a JSON array of points: {e}"),
    };
    if points.is_empty() {
        bail!("model returned an empty list of points");
    }
    Ok(points)
}

async fn summarize_anthropic(client: &reqwest::Client, user_message: &str, model: &str) -> Result<String> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        eyre::eyre!("ANTHROPIC_API_KEY environment variable not set (required for Claude summarization)")
    })?;

    debug!("Generating key points via Anthropic API with model {model}");

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 4096,
        "system": DEFAULT_SYSTEM_PROMPT,
        "messages": [
            {
                "role": "user",
                "content": user_message
            }
        ]
    });

    let resp = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Anthropic API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_anthropic_text(&json)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

async fn summarize_openai(client: &reqwest::Client, user_message: &str, model: &str) -> Result<String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| eyre::eyre!("OPENAI_API_KEY environment variable not set (required for OpenAI summarization)"))?;

    debug!("Generating key points via OpenAI API with model {model}");

    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": DEFAULT_SYSTEM_PROMPT
            },
            {
                "role": "user",
                "content": user_message
            }
        ]
    });

    let resp = client
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(&api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("OpenAI API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_openai_text(&json)
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}
