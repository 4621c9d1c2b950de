//! Stock Buy Agent
//!
//! A conversational tool-calling agent that:
//! - Answers stock price questions from a static price catalog
//! - Requests purchases through a tool that pauses for human approval
//! - Checkpoints every conversation by thread id so a suspended purchase
//!   can be resumed later, possibly from another process
//!
//! LOOP:
//! USER → MODEL → TOOL? → MODEL → … → ANSWER | SUSPEND → RESUME → TOOL → MODEL

pub mod agent;
pub mod api;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod execution;
pub mod llm;
pub mod memory;
pub mod models;
pub mod state;
pub mod tools;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
pub use agent::{StockAgent, TurnOutcome};
pub use config::AgentConfig;
