//! Ollama chat transport - completion calls, provisioning, health probes.
//!
//! The deliberation engine only depends on the [`ChatBackend`] trait; the
//! [`OllamaClient`] is the production implementation speaking the Ollama
//! HTTP API. Streaming is disabled on every call so a reply arrives as one
//! complete JSON body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::registry::{ModelSpec, Participant};

/// Timeout for lightweight probes (`/api/tags`). Completion calls are
/// bounded by the dispatcher instead, since inference can take minutes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from a single model query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{model} returned status {status}")]
    Status {
        model: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed response from {model}: {reason}")]
    MalformedResponse { model: String, reason: String },
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Abstraction over the completion transport.
///
/// The engine is driven through this trait so tests can substitute scripted
/// backends for live model services.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a conversation to one participant and return its reply text.
    async fn chat(
        &self,
        participant: &Participant,
        messages: &[ChatMessage],
    ) -> Result<String, QueryError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// HTTP client for local or remote Ollama instances.
///
/// One client serves every participant; the target host comes from each
/// participant's endpoint, and model selection happens via the model name in
/// the request body.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Single completion call: POST `/api/chat` with streaming disabled.
    async fn complete(
        &self,
        participant: &Participant,
        messages: &[ChatMessage],
    ) -> Result<String, QueryError> {
        let url = format!("{}/api/chat", participant.endpoint.base_url());
        let body = json!({
            "model": participant.served_model(),
            "messages": messages,
            "stream": false,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| QueryError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                model: participant.display_name().to_string(),
                status,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| QueryError::MalformedResponse {
                    model: participant.display_name().to_string(),
                    reason: e.to_string(),
                })?;

        debug!(
            model = %participant.display_name(),
            chars = parsed.message.content.len(),
            "completion received"
        );
        Ok(parsed.message.content)
    }

    /// Pull the participant's base model onto its host (POST `/api/pull`).
    pub async fn pull(&self, participant: &Participant) -> Result<(), QueryError> {
        let url = format!("{}/api/pull", participant.endpoint.base_url());
        info!(model = %participant.model, endpoint = %participant.endpoint, "pulling model");

        let response = self
            .http
            .post(&url)
            .json(&json!({ "model": participant.model, "stream": false }))
            .send()
            .await
            .map_err(|source| QueryError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                model: participant.model.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Create the derived model for a customized participant
    /// (POST `/api/create` with the base model and its system instruction).
    /// No-op for standard participants.
    pub async fn create_custom(&self, participant: &Participant) -> Result<(), QueryError> {
        let ModelSpec::Customized { system_prompt } = &participant.spec else {
            return Ok(());
        };

        let url = format!("{}/api/create", participant.endpoint.base_url());
        info!(
            model = %participant.served_model(),
            from = %participant.model,
            "creating customized model"
        );

        let response = self
            .http
            .post(&url)
            .json(&json!({
                "model": participant.served_model(),
                "from": participant.model,
                "system": system_prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|source| QueryError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                model: participant.served_model(),
                status,
            });
        }
        Ok(())
    }

    /// Whether the participant's host is reachable and serves its model
    /// (GET `/api/tags`).
    pub async fn has_model(&self, participant: &Participant) -> bool {
        let url = format!("{}/api/tags", participant.endpoint.base_url());

        let response = match self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(_) => return false,
        };
        if !response.status().is_success() {
            return false;
        }

        match response.json::<TagsResponse>().await {
            Ok(tags) => {
                let wanted = participant.served_model();
                tags.models.iter().any(|m| m.name == wanted)
            }
            Err(_) => false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(
        &self,
        participant: &Participant,
        messages: &[ChatMessage],
    ) -> Result<String, QueryError> {
        self.complete(participant, messages).await
    }
}
