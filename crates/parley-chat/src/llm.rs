//! Chat-completion model seam.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::config::ModelConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::types::{ModelReply, ToolCallRequest, ToolSpec, Turn};

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub history: &'a [Turn],
    /// Tools offered this round; `None` forces a plain-text answer.
    pub tools: Option<&'a [ToolSpec]>,
    pub temperature: f32,
}

/// A chat model with tool calling.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply>;
}

// =============================================================================
// OpenAI-compatible client
// =============================================================================

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
        }
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ChatError::ModelUnavailable(format!("{} is not set", config.api_key_env))
            })?;
        Ok(Self::new(key, config))
    }

    fn payload(&self, request: &CompletionRequest<'_>) -> Value {
        let messages: Vec<Value> = request.history.iter().map(wire_message).collect();
        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(tools) = request.tools.filter(|t| !t.is_empty()) {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            payload["tools"] = Value::Array(tools);
            payload["tool_choice"] = json!("auto");
        }
        payload
    }
}

fn wire_message(turn: &Turn) -> Value {
    let mut message = json!({
        "role": turn.role,
        "content": turn.content,
    });
    if !turn.tool_calls.is_empty() {
        message["tool_calls"] = turn
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                })
            })
            .collect();
    }
    if let Some(id) = &turn.tool_call_id {
        message["tool_call_id"] = json!(id);
    }
    if let Some(name) = &turn.name {
        message["name"] = json!(name);
    }
    message
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(&request))
            .send()
            .await
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ChatError::ModelUnavailable(format!(
                "completion error {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ChatError::ModelUnavailable("no choices returned".to_string()))?;

        debug!(
            tool_calls = message.tool_calls.len(),
            has_content = message.content.is_some(),
            "completion received"
        );
        Ok(ModelReply {
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|c| ToolCallRequest {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
        })
    }
}

// =============================================================================
// Scripted model
// =============================================================================

/// What a [`ScriptedModel`] was asked.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub history: Vec<Turn>,
    pub tool_names: Option<Vec<String>>,
    pub temperature: f32,
}

/// Replays a fixed sequence of replies. Fails once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<ModelReply, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        let model = Self::new();
        for reply in replies {
            model.push_reply(reply);
        }
        model
    }

    pub fn push_reply(&self, reply: ModelReply) {
        lock(&self.replies).push_back(Ok(reply));
    }

    pub fn push_failure(&self, reason: &str) {
        lock(&self.replies).push_back(Err(reason.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply> {
        lock(&self.requests).push(RecordedRequest {
            history: request.history.to_vec(),
            tool_names: request
                .tools
                .map(|tools| tools.iter().map(|t| t.name.clone()).collect()),
            temperature: request.temperature,
        });
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(ChatError::ModelUnavailable(reason)),
            None => Err(ChatError::ModelUnavailable("script exhausted".to_string())),
        }
    }
}
