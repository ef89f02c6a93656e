//! Ollama-compatible chat client backing all three capabilities
//!
//! One client, one model: `POST {base_url}/api/chat` with `format: "json"` and
//! `stream: false`. Output validation is delegated to [`super::schema`].

use super::{
    prompts, schema, ComparisonRequest, ComparisonVerdict, FieldParser, MatchComparator,
    WorkTypeClassifier,
};
use crate::types::{ParsedFields, RawReference, ResolveError, ResolveResult, WorkType};
use async_trait::async_trait;
use refcat_common::config::ModelConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Clone)]
pub struct ModelClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl ModelClient {
    pub fn new(config: &ModelConfig) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ResolveError::Capability(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one system + user exchange and return the raw assistant text
    pub async fn complete_json(&self, system: &str, user: &str) -> ResolveResult<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResolveError::Capability(format!("Model request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Capability(format!(
                "Model endpoint returned {}: {}",
                status,
                normalize_err_body(&body)
            )));
        }

        let response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ResolveError::Capability(format!("Failed to decode model response: {}", e)))?;

        let content = response.message.content.trim().to_string();
        debug!(model = %self.model, chars = content.len(), "Model response received");
        Ok(content)
    }
}

#[async_trait]
impl FieldParser for ModelClient {
    async fn parse(&self, reference: &RawReference) -> ResolveResult<ParsedFields> {
        let output = self
            .complete_json(prompts::PARSE_SYSTEM, &prompts::parse_reference(reference.as_str()))
            .await?;
        Ok(schema::parse_fields_output(&output))
    }
}

#[async_trait]
impl WorkTypeClassifier for ModelClient {
    async fn classify(&self, reference: &RawReference) -> ResolveResult<WorkType> {
        let output = self
            .complete_json(
                prompts::CLASSIFY_SYSTEM,
                &prompts::classify_work_type(reference.as_str()),
            )
            .await?;
        Ok(schema::parse_work_type_output(&output))
    }
}

#[async_trait]
impl MatchComparator for ModelClient {
    async fn compare(&self, request: &ComparisonRequest) -> ResolveResult<ComparisonVerdict> {
        let output = self
            .complete_json(prompts::COMPARE_SYSTEM, &prompts::compare_candidates(request))
            .await?;
        Ok(schema::parse_verdict_output(&output))
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
