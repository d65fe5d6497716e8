use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Opaque chat completion: one system prompt, one user message, one reply.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

/// Sampling and transport settings shared by every chat back-end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatSettings {
    /// Sampling temperature, 0.0 by default
    pub temperature: f32,
    /// Whole-request deadline; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl ChatSettings {
    /// HTTP client honouring `timeout`.
    pub fn http_client(&self) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("Failed to build HTTP client")
    }
}

pub struct OllamaProvider {
    client: Ollama,
    settings: ChatSettings,
}

impl OllamaProvider {
    pub fn new(client: Ollama, settings: ChatSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let messages = system
            .map(ChatMessage::system)
            .into_iter()
            .chain(std::iter::once(ChatMessage::user(prompt)))
            .collect();
        let request = ChatMessageRequest::new(model.to_string(), messages)
            .options(ModelOptions::default().temperature(self.settings.temperature));

        let reply = self
            .client
            .send_chat_messages(request)
            .await
            .with_context(|| format!("Ollama chat with {} at {} failed", model, self.client.url_str()))?;
        Ok(reply.message.content)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Deserialize)]
struct CompletionContent {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// Any server speaking the OpenAI `/chat/completions` dialect.
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    settings: ChatSettings,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, api_key: Option<String>, settings: ChatSettings) -> Result<Self> {
        Ok(Self {
            client: settings.http_client()?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            settings,
        })
    }

    fn request_body<'a>(&self, model: &'a str, prompt: &'a str, system: Option<&'a str>) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(content) = system {
            messages.push(CompletionMessage { role: "system", content });
        }
        messages.push(CompletionMessage { role: "user", content: prompt });
        CompletionRequest {
            model,
            messages,
            temperature: self.settings.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let body = self.request_body(model, &prompt, system.as_deref());
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Chat request to {} ({}) failed", self.endpoint, model))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("{} answered {} for {}: {}", self.endpoint, status, model, detail.trim());
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .with_context(|| format!("Unreadable chat completion from {}", self.endpoint))?;
        debug!("Chat completion from {} ({})", self.endpoint, model);
        completion
            .into_text()
            .with_context(|| format!("{} returned no message content for {}", self.endpoint, model))
    }
}
