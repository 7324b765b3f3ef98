use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::OpenAiConfig;
use crate::summary::Summarizer;
use crate::transcribe::SpeechToText;

/// Client for the OpenAI transcription and chat completion endpoints
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    transcription_model: String,
    summary_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiClient {
    pub fn new(client: Client, config: &OpenAiConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transcription_model: config.transcription_model.clone(),
            summary_model: config.summary_model.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn chat_request(&self, instructions: &str, part: &str) -> ChatRequest {
        ChatRequest {
            model: self.summary_model.clone(),
            messages: vec![
                ChatMessage::new("user", instructions),
                ChatMessage::new("user", part),
            ],
        }
    }
}

async fn error_for_status(response: reqwest::Response, api: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(anyhow!("OpenAI {} error {}: {}", api, status, text))
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let data = tokio::fs::read(audio)
            .await
            .with_context(|| format!("Failed to read {}", audio.display()))?;

        let file = Part::bytes(data)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone());

        tracing::debug!("Sending {} to OpenAI transcription", audio.display());

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let body: TranscriptionResponse = error_for_status(response, "transcription")
            .await?
            .json()
            .await?;

        Ok(body.text)
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(&self, instructions: &str, part: &str) -> Result<String> {
        let request = self.chat_request(instructions, part);

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = error_for_status(response, "chat")
            .await?
            .json()
            .await?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No response from OpenAI"))
    }
}
