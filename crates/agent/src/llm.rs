//! Text-generation clients. The assistant treats the model as a black box:
//! a system prompt and a window of turns go in, plain text comes out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use soldy_core::config::{AssistantConfig, LlmConfig, LlmProvider};
use thiserror::Error;
use tracing::debug;

use crate::conversation::ConversationTurn;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repeat_penalty: Option<f32>,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self::from(&AssistantConfig::default())
    }
}

impl From<&AssistantConfig> for DecodingParams {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
            repeat_penalty: config.repeat_penalty,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub messages: Vec<ConversationTurn>,
    pub decoding: DecodingParams,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("text generation request failed: {0}")]
    Request(String),
    #[error("text generation returned status {status}")]
    Status { status: u16, body: String },
    #[error("text generation response was malformed: {0}")]
    Malformed(String),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Builds the configured client. Validation already guarantees the key and
/// base URL each provider needs.
pub fn generator_from_config(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        LlmProvider::Ollama => {
            let base_url = config.base_url.as_deref().unwrap_or(OllamaClient::DEFAULT_BASE_URL);
            Ok(Arc::new(OllamaClient::new(base_url, &config.model, timeout)?))
        }
        LlmProvider::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::Request("missing api key for openai provider".to_owned()))?;
            let base_url =
                config.base_url.as_deref().unwrap_or(OpenAiCompatibleClient::DEFAULT_BASE_URL);
            Ok(Arc::new(OpenAiCompatibleClient::new(api_key, base_url, &config.model, timeout)?))
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|error| LlmError::Request(error.to_string()))
}

fn wire_messages(request: &GenerationRequest) -> Vec<WireMessage<'_>> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system_prompt.trim().is_empty() {
        messages.push(WireMessage { role: "system", content: &request.system_prompt });
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|turn| WireMessage { role: turn.role.as_str(), content: &turn.content }),
    );
    messages
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Request(error.to_string())
    }
}

async fn read_body(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await.map_err(|error| map_send_error(error, timeout))?;
    if !status.is_success() {
        return Err(LlmError::Status { status: status.as_u16(), body });
    }
    Ok(body)
}

fn non_empty(text: Option<String>) -> Result<GenerationResponse, LlmError> {
    match text.map(|text| text.trim().to_owned()) {
        Some(text) if !text.is_empty() => Ok(GenerationResponse { text }),
        _ => Err(LlmError::Malformed("response carried no assistant content".to_owned())),
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            timeout,
        })
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

pub(crate) fn parse_ollama_response(body: &str) -> Result<GenerationResponse, LlmError> {
    let parsed: OllamaChatResponse =
        serde_json::from_str(body).map_err(|error| LlmError::Malformed(error.to_string()))?;
    non_empty(parsed.message.map(|message| message.content))
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let decoding = request.decoding;
        let body = OllamaChatRequest {
            model: &self.model,
            messages: wire_messages(&request),
            stream: false,
            options: OllamaOptions {
                temperature: decoding.temperature,
                num_predict: decoding.max_output_tokens,
                top_p: decoding.top_p,
                top_k: decoding.top_k,
                repeat_penalty: decoding.repeat_penalty,
            },
        };

        debug!(event_name = "agent.llm.request", provider = "ollama", model = %self.model);
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|error| map_send_error(error, self.timeout))?;
        let text = read_body(response, self.timeout).await?;
        parse_ollama_response(&text)
    }
}

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            timeout,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub(crate) fn parse_chat_completions_response(body: &str) -> Result<GenerationResponse, LlmError> {
    let parsed: ChatCompletionsResponse =
        serde_json::from_str(body).map_err(|error| LlmError::Malformed(error.to_string()))?;
    non_empty(parsed.choices.into_iter().next().and_then(|choice| choice.message.content))
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let decoding = request.decoding;
        let body = ChatCompletionsRequest {
            model: &self.model,
            messages: wire_messages(&request),
            temperature: decoding.temperature,
            max_tokens: decoding.max_output_tokens,
            top_p: decoding.top_p,
        };

        debug!(event_name = "agent.llm.request", provider = "openai", model = %self.model);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| map_send_error(error, self.timeout))?;
        let text = read_body(response, self.timeout).await?;
        parse_chat_completions_response(&text)
    }
}
