//! Execution engine for tool calls
//!
//! Runs the calls the model requested against the tool registry.
//! LLM is NOT allowed here. Tool failures are folded into the result
//! payload so the model can see and react to them.

use crate::error::AgentError;
use crate::models::{ToolCall, ToolOutcome, ToolSpec};
use crate::tools::ToolRegistry;
use crate::Result;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

/// Executes tool calls deterministically
pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self { tool_registry }
    }

    /// Declarations offered to the model
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tool_registry.specs()
    }

    /// Run one call. Never fails: errors become `{"error": ...}` results.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolOutcome {
        debug!(tool_name = %call.name, call_id = %call.call_id, "Executing tool call");

        let Some(tool) = self.tool_registry.get(&call.name) else {
            warn!(tool_name = %call.name, "Tool not registered");
            return ToolOutcome::Completed(json!({
                "error": format!("Tool not registered: {}", call.name)
            }));
        };

        let start = Instant::now();
        let outcome = match tool.execute(&call.input()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    tool_name = %call.name,
                    error = %e,
                    "Tool execution failed"
                );
                ToolOutcome::Completed(json!({ "error": e.to_string() }))
            }
        };

        debug!(
            tool_name = %call.name,
            execution_time_ms = start.elapsed().as_millis() as u64,
            interrupted = matches!(outcome, ToolOutcome::Interrupted { .. }),
            "Tool call finished"
        );

        outcome
    }

    /// Finish an interrupted call with the external decision
    pub async fn resume_call(&self, call: &ToolCall, decision: &str) -> Result<Value> {
        let tool = self
            .tool_registry
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        match tool.resume(&call.input(), decision).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(
                    tool_name = %call.name,
                    error = %e,
                    "Tool resume failed"
                );
                Ok(json!({ "error": e.to_string() }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::tools::{create_default_registry, BUY_STOCKS, GET_STOCK_PRICE};
    use std::sync::Arc;

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(create_default_registry(Arc::new(StaticCatalog::default())))
    }

    #[tokio::test]
    async fn test_execute_price_call() {
        let call = ToolCall::new(GET_STOCK_PRICE, json!({"symbol": "MSFT"}));
        let outcome = engine().execute_call(&call).await;

        match outcome {
            ToolOutcome::Completed(output) => assert_eq!(output["price"], json!(200.3)),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let call = ToolCall::new("sell_stocks", json!({}));
        let outcome = engine().execute_call(&call).await;

        match outcome {
            ToolOutcome::Completed(output) => {
                assert!(output["error"].as_str().unwrap().contains("sell_stocks"))
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_becomes_error_result() {
        let call = ToolCall::new(BUY_STOCKS, json!({"symbol": "AAPL"}));
        let outcome = engine().execute_call(&call).await;
        assert!(matches!(outcome, ToolOutcome::Completed(ref v) if v.get("error").is_some()));
    }

    #[tokio::test]
    async fn test_buy_interrupts_then_resumes() {
        let engine = engine();
        let call = ToolCall::new(
            BUY_STOCKS,
            json!({"symbol": "AAPL", "quantity": 3, "total_price": 301.2}),
        );

        assert!(matches!(
            engine.execute_call(&call).await,
            ToolOutcome::Interrupted { .. }
        ));

        let output = engine.resume_call(&call, "no").await.unwrap();
        assert_eq!(output, json!("Buying declined."));
    }

    #[tokio::test]
    async fn test_resume_unknown_tool_is_error() {
        let call = ToolCall::new("sell_stocks", json!({}));
        let result = engine().resume_call(&call, "yes").await;
        assert!(matches!(result, Err(AgentError::ToolNotFound(_))));
    }
}
