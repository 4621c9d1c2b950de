//! Tool trait and registry
//!
//! Tools declare a typed signature (`ToolSpec`) for the model and run
//! against the injected price catalog. A tool may interrupt instead of
//! completing; it is then finished later through `resume`.

use crate::catalog::{normalize_symbol, PriceCatalog};
use crate::error::AgentError;
use crate::models::{ParamKind, ParamSpec, ToolInput, ToolOutcome, ToolSpec};
use crate::Result;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const GET_STOCK_PRICE: &str = "get_stock_price";
pub const BUY_STOCKS: &str = "buy_stocks";

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Vec<ParamSpec>;

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutcome>;

    /// Finish an interrupted execution with an external decision
    async fn resume(&self, _input: &ToolInput, _decision: &str) -> Result<Value> {
        Err(AgentError::ToolError(format!(
            "{} does not support resuming",
            self.name()
        )))
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Declarations for every registered tool, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by_key(|s| s.name);
        specs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AgentError::InvalidToolInput(format!(
            "{}: tool_input must be a JSON object",
            input.tool_name
        )))
    }
}

fn require_symbol(input: &ToolInput) -> Result<String> {
    input
        .parameters
        .get("symbol")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AgentError::InvalidToolInput("Expected non-empty 'symbol' in tool_input".to_string())
        })
}

/// Positive whole number; models sometimes send integers as `3.0` or `"3"`
fn require_quantity(input: &ToolInput) -> Result<u64> {
    let value = input.parameters.get("quantity");

    let quantity = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match quantity {
        Some(q) if q > 0 => Ok(q),
        _ => Err(AgentError::InvalidToolInput(format!(
            "Expected positive integer 'quantity' in tool_input, got {}",
            value.map(|v| v.to_string()).unwrap_or_else(|| "nothing".to_string())
        ))),
    }
}

/// Kept as the float the model sent so the rendered amount rounds the
/// binary value, e.g. 2.675 shows as 2.67
fn require_total_price(input: &ToolInput) -> Result<f64> {
    let value = input.parameters.get("total_price");

    let price = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_start_matches('$').parse::<f64>().ok(),
        _ => None,
    };

    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(AgentError::InvalidToolInput(format!(
            "Expected non-negative number 'total_price' in tool_input, got {}",
            value.map(|v| v.to_string()).unwrap_or_else(|| "nothing".to_string())
        ))),
    }
}

/// Two-decimal money rendering of the exact binary value
pub fn format_money(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Whether a resume decision approves; only "yes" in any casing does
pub fn is_approval(decision: &str) -> bool {
    decision.to_lowercase() == "yes"
}

/// Return the current price of a stock given the stock symbol
pub struct GetStockPriceTool {
    catalog: Arc<dyn PriceCatalog>,
}

impl GetStockPriceTool {
    pub fn new(catalog: Arc<dyn PriceCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl Tool for GetStockPriceTool {
    fn name(&self) -> &'static str {
        GET_STOCK_PRICE
    }

    fn description(&self) -> &'static str {
        "Return the current price of a stock given the stock symbol"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "symbol",
            kind: ParamKind::String,
            description: "Ticker symbol, e.g. MSFT",
        }]
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutcome> {
        ensure_object_parameters(input)?;
        let symbol = normalize_symbol(&require_symbol(input)?);

        let found = self.catalog.get(&symbol);
        let price = found.unwrap_or(Decimal::ZERO);

        Ok(ToolOutcome::Completed(json!({
            "symbol": symbol,
            "price": price.to_f64().unwrap_or_default(),
            "found": found.is_some(),
        })))
    }
}

/// Buy stocks given the stock symbol and quantity; always asks for approval
pub struct BuyStocksTool;

impl BuyStocksTool {
    fn parse(input: &ToolInput) -> Result<(String, u64, f64)> {
        ensure_object_parameters(input)?;
        Ok((
            require_symbol(input)?,
            require_quantity(input)?,
            require_total_price(input)?,
        ))
    }

    pub fn approval_prompt(symbol: &str, quantity: u64, total_price: f64) -> String {
        format!(
            "Approve buying {} {} stocks for ${}?",
            quantity,
            symbol,
            format_money(total_price)
        )
    }
}

#[async_trait::async_trait]
impl Tool for BuyStocksTool {
    fn name(&self) -> &'static str {
        BUY_STOCKS
    }

    fn description(&self) -> &'static str {
        "Buy stocks given the stock symbol and quantity"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec {
                name: "symbol",
                kind: ParamKind::String,
                description: "Ticker symbol to buy",
            },
            ParamSpec {
                name: "quantity",
                kind: ParamKind::Integer,
                description: "Number of shares",
            },
            ParamSpec {
                name: "total_price",
                kind: ParamKind::Number,
                description: "Total price for all shares in dollars",
            },
        ]
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutcome> {
        let (symbol, quantity, total_price) = Self::parse(input)?;

        Ok(ToolOutcome::Interrupted {
            prompt: Self::approval_prompt(&symbol, quantity, total_price),
        })
    }

    async fn resume(&self, input: &ToolInput, decision: &str) -> Result<Value> {
        let (symbol, quantity, total_price) = Self::parse(input)?;

        let message = if is_approval(decision) {
            format!(
                "You bought {} shares of {} for a total price of ${}.",
                quantity,
                symbol,
                format_money(total_price)
            )
        } else {
            "Buying declined.".to_string()
        };

        Ok(Value::String(message))
    }
}

/// Create the registry with the price lookup and purchase tools
pub fn create_default_registry(catalog: Arc<dyn PriceCatalog>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(GetStockPriceTool::new(catalog)));
    registry.register(Arc::new(BuyStocksTool));

    registry
}
