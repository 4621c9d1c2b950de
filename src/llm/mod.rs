//! Chat model trait and implementations
//!
//! The model sees the ordered conversation plus the declared tools and
//! either answers or asks for tool calls. It never executes tools itself.

use crate::error::AgentError;
use crate::memory::ConversationMessage;
use crate::models::{ToolCall, ToolSpec};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

/// What the model produced for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        ModelReply::Text(text.into())
    }

    /// Single tool call with a generated id
    pub fn call(name: &str, args: serde_json::Value) -> Self {
        ModelReply::ToolCalls(vec![ToolCall::new(name, args)])
    }
}

/// Trait for the conversational model (LLM controlled)
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply>;

    /// One-shot prompt without history or tools
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        match self.invoke(&[ConversationMessage::user(prompt)], &[]).await? {
            ModelReply::Text(text) => Ok(text),
            ModelReply::ToolCalls(calls) => Err(AgentError::LlmError(format!(
                "Expected text, model requested {} tool call(s)",
                calls.len()
            ))),
        }
    }
}

/// Scripted model for development & testing
/// Replays queued replies in order and records what it was shown
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    seen: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of times the model was invoked
    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Conversations the model was invoked with, oldest first
    pub fn seen(&self) -> Vec<Vec<ConversationMessage>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(
        &self,
        messages: &[ConversationMessage],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("Scripted model has no replies left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new([
            ModelReply::call("get_stock_price", json!({"symbol": "AAPL"})),
            ModelReply::text("done"),
        ]);

        let first = model.invoke(&[ConversationMessage::user("hi")], &[]).await.unwrap();
        assert!(matches!(first, ModelReply::ToolCalls(ref calls) if calls[0].name == "get_stock_price"));

        let second = model.invoke(&[], &[]).await.unwrap();
        assert_eq!(second, ModelReply::text("done"));

        assert_eq!(model.call_count(), 2);
        assert_eq!(model.seen()[0].len(), 1);
        assert!(model.invoke(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_generate_text_rejects_tool_calls() {
        let model = ScriptedModel::new([ModelReply::call("buy_stocks", json!({}))]);
        let result = model.generate_text("hello").await;
        assert!(matches!(result, Err(AgentError::LlmError(_))));
    }
}
