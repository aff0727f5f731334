//! HTTP adapter for the LLM orchestrator port.
//!
//! Speaks the OpenAI-compatible chat-completions shape, which every
//! deployment target here (hosted APIs, local inference gateways) accepts.
//! The tool registry lives with the orchestrator service, not in this
//! adapter.

use async_trait::async_trait;
use frameworks_core::database::ports::{
    ChatMessage, ChatRole, Orchestrator, OrchestratorReply, TokenCounts, TokenStreamer,
};
use frameworks_core::error::{CoreError, Result};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct HttpOrchestrator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for HttpOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrchestrator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl HttpOrchestrator {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn role_name(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn run(
        &self,
        cancel: &CancellationToken,
        messages: &[ChatMessage],
        streamer: Option<&dyn TokenStreamer>,
    ) -> Result<OrchestratorReply> {
        let body = json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({ "role": Self::role_name(m.role), "content": m.content }))
                .collect::<Vec<_>>(),
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(CoreError::Cancelled("orchestrator call".to_string()));
            }
            response = request.send() => {
                response.map_err(|e| CoreError::UpstreamTransient(format!("llm endpoint: {e}")))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::UpstreamTransient(format!(
                "llm endpoint returned {status}"
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| CoreError::UpstreamTransient(format!("llm response body: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::UpstreamTransient("llm returned no choices".to_string()))?;

        if let Some(streamer) = streamer {
            streamer.on_chunk(&content);
        }

        let usage = completion.usage.unwrap_or_default();
        Ok(OrchestratorReply {
            content,
            usage: TokenCounts {
                prompt: usage.prompt_tokens,
                completion: usage.completion_tokens,
            },
        })
    }
}
