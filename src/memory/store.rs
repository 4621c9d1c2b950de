//! Conversation history storage
//!
//! Append-only message log for one thread, with timestamps and typed content

use crate::models::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// Payload of a conversation message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolCall {
        call: ToolCall,
    },
    ToolResult {
        call_id: String,
        name: String,
        output: serde_json::Value,
    },
    /// A tool suspended here waiting for a human decision
    Interrupt {
        call_id: String,
        prompt: String,
    },
    /// The human decision that resumed a suspended tool
    Resume {
        call_id: String,
        decision: String,
    },
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ConversationMessage {
    fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::Text { text: text.into() })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Text { text: text.into() })
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::ToolCall { call })
    }

    pub fn tool_result(call: &ToolCall, output: serde_json::Value) -> Self {
        Self::new(
            MessageRole::Tool,
            MessageContent::ToolResult {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                output,
            },
        )
    }

    pub fn interrupt(call: &ToolCall, prompt: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Tool,
            MessageContent::Interrupt {
                call_id: call.call_id.clone(),
                prompt: prompt.into(),
            },
        )
    }

    pub fn resume(call: &ToolCall, decision: impl Into<String>) -> Self {
        Self::new(
            MessageRole::User,
            MessageContent::Resume {
                call_id: call.call_id.clone(),
                decision: decision.into(),
            },
        )
    }

    /// Plain text content, if this is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// One-line human readable rendering
    pub fn render(&self) -> String {
        match &self.content {
            MessageContent::Text { text } => text.clone(),
            MessageContent::ToolCall { call } => format!("{}({})", call.name, call.args),
            MessageContent::ToolResult { name, output, .. } => format!("{} -> {}", name, output),
            MessageContent::Interrupt { prompt, .. } => format!("[interrupt] {}", prompt),
            MessageContent::Resume { decision, .. } => format!("[resume] {}", decision),
        }
    }
}

/// Conversation history for one thread
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<ConversationMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; history is never reordered
    pub fn add_message(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Get formatted conversation (useful for logs and debugging)
    pub fn get_formatted_context(&self) -> String {
        let mut context = String::new();
        context.push_str("## Conversation History\n\n");

        for msg in &self.messages {
            let role_str = match msg.role {
                MessageRole::User => "**User**",
                MessageRole::Assistant => "**Assistant**",
                MessageRole::Tool => "**Tool**",
            };

            context.push_str(&format!(
                "{}: {} ({})\n\n",
                role_str,
                msg.render(),
                msg.timestamp.format("%H:%M:%S")
            ));
        }

        context
    }
}
