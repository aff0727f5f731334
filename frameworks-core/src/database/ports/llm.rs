//! The LLM orchestrator capability.
//!
//! The concrete orchestrator (and its tool registry) is an external
//! collaborator; exposing it as `run(cancel, messages, streamer?)` lets
//! tests supply a deterministic stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub prompt: u64,
    pub completion: u64,
}

#[derive(Debug, Clone)]
pub struct OrchestratorReply {
    /// Arbitrary model output; a JSON object may appear anywhere inside it.
    pub content: String,
    pub usage: TokenCounts,
}

/// Receives incremental output while a run is in flight.
pub trait TokenStreamer: Send + Sync {
    fn on_chunk(&self, chunk: &str);
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn run(
        &self,
        cancel: &CancellationToken,
        messages: &[ChatMessage],
        streamer: Option<&dyn TokenStreamer>,
    ) -> Result<OrchestratorReply>;
}
