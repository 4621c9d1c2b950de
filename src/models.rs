//! Core data models for the stock buy agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//
// ================= Tool Calls =================
//

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub args: serde_json::Value,
}

impl ToolCall {
    /// Create a call with a generated id (for providers that do not assign one)
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            call_id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }

    pub fn input(&self) -> ToolInput {
        ToolInput {
            tool_name: self.name.clone(),
            parameters: self.args.clone(),
        }
    }
}

//
// ================= Tool Declarations =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

/// Declared signature of a tool, offered to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

/// Result of running a tool once
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Completed(serde_json::Value),
    /// The tool needs an external decision before it can finish
    Interrupted { prompt: String },
}

//
// ================= Suspension =================
//

/// A tool call suspended while waiting for a human decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingApproval {
    pub thread_id: String,
    pub call: ToolCall,
    pub prompt: String,
    /// Calls from the same model reply that have not run yet
    #[serde(default)]
    pub queued: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

//
// ================= Approval Record =================
//

/// Audit entry for one resolved approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub audit_id: Uuid,
    pub thread_id: String,
    pub call: ToolCall,
    pub prompt: String,
    pub decision: String,
    pub approved: bool,
    pub outcome: serde_json::Value,
    /// SHA-256 of the suspended call, for integrity checks
    pub call_hash: String,
    pub requested_at: DateTime<Utc>,
    pub decided_at: DateTime<Utc>,
}
