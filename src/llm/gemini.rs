//! Gemini API client with function calling
//!
//! Maps the conversation onto `generateContent` contents, declares the
//! registered tools as function declarations and turns the reply into a
//! `ModelReply`. Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelReply};
use crate::memory::{ConversationMessage, MessageContent, MessageRole};
use crate::models::{ParamKind, ToolCall, ToolSpec};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Model used by the one-shot smoke prompt
pub const SMOKE_MODEL: &str = "gemini-2.5-pro";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a stock trading assistant.

Guidelines:
- Use get_stock_price to look up the current price of a stock symbol
- Use buy_stocks to buy; total_price is the current price times the quantity
- Never guess prices, always look them up first
- Report tool results to the user plainly and concisely"#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            temperature: 0.3,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, messages: &[ConversationMessage], tools: &[ToolSpec]) -> GeminiRequest {
        let tools = if tools.is_empty() {
            vec![]
        } else {
            vec![ToolDeclarations {
                function_declarations: tools.iter().map(function_declaration).collect(),
            }]
        };

        GeminiRequest {
            contents: build_contents(messages),
            tools,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: self.system_prompt.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part::text(text.clone())],
            }),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn invoke(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        if self.api_key.is_empty() {
            return Err(AgentError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let request = self.build_request(messages, tools);

        info!(
            model = %self.model,
            messages = request.contents.len(),
            tools = tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::LlmError(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let reply = parse_reply(gemini_response)?;
        debug!(?reply, "Gemini reply");

        Ok(reply)
    }
}

/// Map conversation messages onto Gemini contents.
///
/// Interrupt and resume markers are bookkeeping only and never sent.
/// Consecutive messages with the same Gemini role share one content so
/// parallel function calls and their responses stay grouped. Function
/// responses never share a content with text.
fn build_contents(messages: &[ConversationMessage]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    for msg in messages {
        let (role, part) = match &msg.content {
            MessageContent::Text { text } => {
                let role = match msg.role {
                    MessageRole::Assistant => "model",
                    MessageRole::User | MessageRole::Tool => "user",
                };
                (role, Part::text(text.clone()))
            }
            MessageContent::ToolCall { call } => (
                "model",
                Part {
                    function_call: Some(FunctionCall {
                        id: None,
                        name: call.name.clone(),
                        args: call.args.clone(),
                    }),
                    ..Part::default()
                },
            ),
            MessageContent::ToolResult { name, output, .. } => (
                "user",
                Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: response_object(output),
                    }),
                    ..Part::default()
                },
            ),
            MessageContent::Interrupt { .. } | MessageContent::Resume { .. } => continue,
        };

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) && last.accepts(&part) => {
                last.parts.push(part)
            }
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![part],
            }),
        }
    }

    contents
}

/// Function responses must be JSON objects
fn response_object(output: &Value) -> Value {
    if output.is_object() {
        output.clone()
    } else {
        json!({ "result": output })
    }
}

fn function_declaration(spec: &ToolSpec) -> FunctionDeclaration {
    let mut properties = Map::new();
    for param in &spec.parameters {
        let kind = match param.kind {
            ParamKind::String => "STRING",
            ParamKind::Integer => "INTEGER",
            ParamKind::Number => "NUMBER",
        };
        properties.insert(
            param.name.to_string(),
            json!({ "type": kind, "description": param.description }),
        );
    }

    let required: Vec<&str> = spec.parameters.iter().map(|p| p.name).collect();

    FunctionDeclaration {
        name: spec.name.to_string(),
        description: spec.description.to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        }),
    }
}

fn parse_reply(response: GeminiResponse) -> Result<ModelReply> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        AgentError::LlmError("No response from Gemini API".to_string())
    })?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut calls = Vec::new();
    let mut text = String::new();

    for part in parts {
        if let Some(call) = part.function_call {
            let args = if call.args.is_null() { json!({}) } else { call.args };
            let mut tool_call = ToolCall::new(call.name, args);
            if let Some(id) = call.id.filter(|id| !id.is_empty()) {
                tool_call.call_id = id;
            }
            calls.push(tool_call);
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if !calls.is_empty() {
        return Ok(ModelReply::ToolCalls(calls));
    }

    if text.trim().is_empty() {
        return Err(AgentError::LlmError(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(ModelReply::Text(text))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

impl Content {
    fn accepts(&self, part: &Part) -> bool {
        self.parts.last().map_or(true, |last| {
            last.function_response.is_some() == part.function_response.is_some()
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::tools::create_default_registry;
    use std::sync::Arc;

    fn client() -> GeminiClient {
        GeminiClient::new("test-key", DEFAULT_MODEL).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let registry = create_default_registry(Arc::new(StaticCatalog::default()));
        let request = client().build_request(
            &[ConversationMessage::user("What is the price of AAPL?")],
            &registry.specs(),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "What is the price of AAPL?");
        assert!(value["generationConfig"]["maxOutputTokens"].is_number());
        assert!(value["systemInstruction"]["parts"][0]["text"].is_string());

        let declarations = value["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0]["name"], "buy_stocks");
        assert_eq!(
            declarations[0]["parameters"]["properties"]["quantity"]["type"],
            "INTEGER"
        );
        assert_eq!(
            declarations[0]["parameters"]["required"],
            json!(["symbol", "quantity", "total_price"])
        );
    }

    #[test]
    fn test_no_tools_key_without_tools() {
        let request = client().build_request(&[ConversationMessage::user("hi")], &[]);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_contents_skip_markers_and_group_roles() {
        let price = ToolCall::new("get_stock_price", json!({"symbol": "AAPL"}));
        let buy = ToolCall::new("buy_stocks", json!({"symbol": "AAPL", "quantity": 3, "total_price": 301.2}));

        let messages = vec![
            ConversationMessage::user("price?"),
            ConversationMessage::tool_call(price.clone()),
            ConversationMessage::tool_result(&price, json!({"price": 100.4})),
            ConversationMessage::assistant("100.4"),
            ConversationMessage::user("buy"),
            ConversationMessage::tool_call(buy.clone()),
            ConversationMessage::interrupt(&buy, "Approve?"),
            ConversationMessage::resume(&buy, "yes"),
            ConversationMessage::tool_result(&buy, json!("You bought 3 shares")),
        ];

        let contents = build_contents(&messages);
        let roles: Vec<&str> = contents.iter().filter_map(|c| c.role.as_deref()).collect();
        assert_eq!(roles, vec!["user", "model", "user", "model", "user", "model", "user"]);

        let last = serde_json::to_value(contents.last().unwrap()).unwrap();
        assert_eq!(last["parts"][0]["functionResponse"]["name"], "buy_stocks");
        assert_eq!(
            last["parts"][0]["functionResponse"]["response"]["result"],
            "You bought 3 shares"
        );
    }

    #[test]
    fn test_user_text_after_unanswered_tool_result_gets_own_content() {
        // A turn that failed after its tool ran leaves no assistant answer
        let price = ToolCall::new("get_stock_price", json!({"symbol": "AAPL"}));
        let messages = vec![
            ConversationMessage::user("price?"),
            ConversationMessage::tool_call(price.clone()),
            ConversationMessage::tool_result(&price, json!({"price": 100.4})),
            ConversationMessage::user("try again"),
        ];

        let contents = build_contents(&messages);
        let roles: Vec<&str> = contents.iter().filter_map(|c| c.role.as_deref()).collect();
        assert_eq!(roles, vec!["user", "model", "user", "user"]);

        let response = serde_json::to_value(&contents[2]).unwrap();
        assert_eq!(response["parts"].as_array().unwrap().len(), 1);
        assert!(response["parts"][0]["functionResponse"].is_object());

        let text = serde_json::to_value(&contents[3]).unwrap();
        assert_eq!(text["parts"], json!([{"text": "try again"}]));
    }

    #[test]
    fn test_parallel_tool_results_share_one_content() {
        let first = ToolCall::new("get_stock_price", json!({"symbol": "AAPL"}));
        let second = ToolCall::new("get_stock_price", json!({"symbol": "MSFT"}));
        let messages = vec![
            ConversationMessage::user("prices?"),
            ConversationMessage::tool_call(first.clone()),
            ConversationMessage::tool_call(second.clone()),
            ConversationMessage::tool_result(&first, json!({"price": 100.4})),
            ConversationMessage::tool_result(&second, json!({"price": 200.3})),
        ];

        let contents = build_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[2].parts.len(), 2);
    }

    #[test]
    fn test_parse_function_call_reply() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "get_stock_price", "args": {"symbol": "AAPL"}}}]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        match parse_reply(response).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "get_stock_price");
                assert_eq!(calls[0].args, json!({"symbol": "AAPL"}));
                assert!(calls[0].call_id.starts_with("call_"));
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_reply_and_provider_ids() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "AAPL is "}, {"text": "$100.40."}]}
            }]
        }))
        .unwrap();
        assert_eq!(parse_reply(response).unwrap(), ModelReply::text("AAPL is $100.40."));

        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"id": "fc-1", "name": "buy_stocks"}}]}
            }]
        }))
        .unwrap();
        match parse_reply(response).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls[0].call_id, "fc-1");
                assert_eq!(calls[0].args, json!({}));
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_reply_is_error() {
        let response: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(parse_reply(response).is_err());

        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        let err = parse_reply(response).unwrap_err().to_string();
        assert!(err.contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new("", DEFAULT_MODEL).unwrap();
        let result = client.generate_text("Sing a ballad").await;

        assert!(result.is_err());
        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.to_lowercase().contains("api_key"));
    }
}
