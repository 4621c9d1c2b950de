//! Conversation controller - implements the tool-use loop
//!
//! MODEL → (TOOLS → MODEL)* → ANSWER
//!                 ↘ SUSPEND (approval) → RESUME → TOOLS → MODEL …
//!
//! Every step is checkpointed under the thread id, so a suspended thread
//! can be resumed by any agent sharing the same checkpoint store.

use crate::audit::{compute_call_hash, AuditLog};
use crate::catalog::PriceCatalog;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::execution::ExecutionEngine;
use crate::llm::{ChatModel, GeminiClient, ModelReply};
use crate::memory::ConversationMessage;
use crate::models::{ApprovalRecord, PendingApproval, ToolCall, ToolOutcome};
use crate::state::{build_checkpointer, Checkpointer, ThreadState};
use crate::tools::{create_default_registry, is_approval};
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How an `invoke` or `resume` call ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed { answer: String },
    Suspended { approval: PendingApproval },
}

impl TurnOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            TurnOutcome::Completed { answer } => Some(answer),
            TurnOutcome::Suspended { .. } => None,
        }
    }

    pub fn approval(&self) -> Option<&PendingApproval> {
        match self {
            TurnOutcome::Completed { .. } => None,
            TurnOutcome::Suspended { approval } => Some(approval),
        }
    }
}

/// Stateful tool-calling agent
pub struct StockAgent {
    model: Arc<dyn ChatModel>,
    execution_engine: ExecutionEngine,
    checkpointer: Arc<dyn Checkpointer>,
    audit_log: AuditLog,
    max_steps: u32,
}

impl StockAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        execution_engine: ExecutionEngine,
        checkpointer: Arc<dyn Checkpointer>,
        audit_log: AuditLog,
        max_steps: u32,
    ) -> Self {
        Self {
            model,
            execution_engine,
            checkpointer,
            audit_log,
            max_steps: max_steps.max(1),
        }
    }

    /// Wire the Gemini model, the configured catalog and checkpoint backend
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let model = GeminiClient::new(config.api_key.clone(), config.model.clone())?
            .with_base_url(config.base_url.clone())
            .with_temperature(config.temperature);

        let catalog: Arc<dyn PriceCatalog> = Arc::new(config.catalog.clone());
        let execution_engine = ExecutionEngine::new(create_default_registry(catalog));
        let checkpointer: Arc<dyn Checkpointer> =
            Arc::from(build_checkpointer(config.database_url.as_deref()));

        Ok(Self::new(
            Arc::new(model),
            execution_engine,
            checkpointer,
            AuditLog::new(),
            config.max_steps,
        ))
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Persisted state of a thread, if it exists
    pub async fn state(&self, thread_id: &str) -> Result<Option<ThreadState>> {
        self.checkpointer.load(thread_id).await
    }

    /// Add a user message to the thread and run until an answer or a suspension
    pub async fn invoke(&self, thread_id: &str, user_text: &str) -> Result<TurnOutcome> {
        let mut state = self
            .checkpointer
            .load(thread_id)
            .await?
            .unwrap_or_else(|| ThreadState::new(thread_id));

        if state.is_suspended() {
            return Err(AgentError::PendingApproval(thread_id.to_string()));
        }

        info!(
            thread_id,
            history = state.history.message_count(),
            "Agent: new user turn"
        );

        state.push(ConversationMessage::user(user_text));
        self.checkpointer.save(&state).await?;

        self.run_loop(&mut state).await
    }

    /// Deliver the human decision to the suspended tool call and continue
    pub async fn resume(&self, thread_id: &str, decision: &str) -> Result<TurnOutcome> {
        let mut state = self
            .checkpointer
            .load(thread_id)
            .await?
            .ok_or_else(|| AgentError::NothingToResume(thread_id.to_string()))?;

        let pending = state
            .pending
            .take()
            .ok_or_else(|| AgentError::NothingToResume(thread_id.to_string()))?;

        info!(
            thread_id,
            tool_name = %pending.call.name,
            call_id = %pending.call.call_id,
            "Agent: resuming suspended tool call"
        );

        let output = self
            .execution_engine
            .resume_call(&pending.call, decision)
            .await?;

        state.push(ConversationMessage::resume(&pending.call, decision));
        state.push(ConversationMessage::tool_result(&pending.call, output.clone()));

        let record = ApprovalRecord {
            audit_id: Uuid::new_v4(),
            thread_id: thread_id.to_string(),
            call_hash: compute_call_hash(&pending.call),
            call: pending.call.clone(),
            prompt: pending.prompt.clone(),
            decision: decision.to_string(),
            approved: is_approval(decision),
            outcome: output,
            requested_at: pending.created_at,
            decided_at: Utc::now(),
        };
        let audit_id = self.audit_log.record(record).await?;
        debug!(thread_id, %audit_id, "Approval recorded");

        if let Some(outcome) = self.run_tool_calls(&mut state, pending.queued).await? {
            return Ok(outcome);
        }

        self.run_loop(&mut state).await
    }

    /// Alternate model turns and tool turns
    async fn run_loop(&self, state: &mut ThreadState) -> Result<TurnOutcome> {
        let specs = self.execution_engine.specs();

        for step in 0..self.max_steps {
            debug!(thread_id = %state.thread_id, step, "Model turn");

            let reply = self.model.invoke(state.history.messages(), &specs).await?;

            match reply {
                ModelReply::Text(answer) => {
                    state.push(ConversationMessage::assistant(answer.clone()));
                    self.checkpointer.save(state).await?;

                    info!(thread_id = %state.thread_id, "Agent: turn completed");
                    return Ok(TurnOutcome::Completed { answer });
                }
                ModelReply::ToolCalls(calls) => {
                    if calls.is_empty() {
                        return Err(AgentError::LlmError(
                            "Model returned an empty tool call list".to_string(),
                        ));
                    }

                    for call in &calls {
                        state.push(ConversationMessage::tool_call(call.clone()));
                    }
                    self.checkpointer.save(state).await?;

                    if let Some(outcome) = self.run_tool_calls(state, calls).await? {
                        return Ok(outcome);
                    }
                }
            }
        }

        warn!(thread_id = %state.thread_id, max_steps = self.max_steps, "Step limit reached");
        Err(AgentError::MaxStepsExceeded(format!(
            "Thread {} exceeded {} model turns",
            state.thread_id, self.max_steps
        )))
    }

    /// Run calls in order. Returns `Some` when one of them suspends;
    /// the calls after it are queued on the pending approval.
    async fn run_tool_calls(
        &self,
        state: &mut ThreadState,
        calls: Vec<ToolCall>,
    ) -> Result<Option<TurnOutcome>> {
        let mut calls = calls.into_iter();

        while let Some(call) = calls.next() {
            match self.execution_engine.execute_call(&call).await {
                ToolOutcome::Completed(output) => {
                    state.push(ConversationMessage::tool_result(&call, output));
                }
                ToolOutcome::Interrupted { prompt } => {
                    state.push(ConversationMessage::interrupt(&call, prompt.clone()));

                    let approval = PendingApproval {
                        thread_id: state.thread_id.clone(),
                        call,
                        prompt,
                        queued: calls.collect(),
                        created_at: Utc::now(),
                    };
                    state.pending = Some(approval.clone());
                    self.checkpointer.save(state).await?;

                    info!(
                        thread_id = %state.thread_id,
                        tool_name = %approval.call.name,
                        prompt = %approval.prompt,
                        "Agent: suspended for approval"
                    );
                    debug!(
                        thread_id = %state.thread_id,
                        "Suspended conversation:\n{}",
                        state.history.get_formatted_context()
                    );
                    return Ok(Some(TurnOutcome::Suspended { approval }));
                }
            }
        }

        self.checkpointer.save(state).await?;
        Ok(None)
    }
}
