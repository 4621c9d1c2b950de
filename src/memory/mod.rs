//! Agent Memory System
//!
//! Conversation history kept per thread and checkpointed by the state layer

pub mod store;

pub use store::{ConversationHistory, ConversationMessage, MessageContent, MessageRole};
