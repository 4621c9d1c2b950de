//! Agent configuration
//!
//! Built once at startup (usually from the environment after `dotenv`)
//! and passed to the components that need it.

use crate::catalog::StaticCatalog;
use crate::error::AgentError;
use crate::llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, SMOKE_MODEL};
use crate::Result;
use std::env;
use std::fmt;

pub const DEFAULT_THREAD_ID: &str = "buy_thread";
pub const DEFAULT_MAX_STEPS: u32 = 10;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub model: String,
    pub smoke_model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Thread used by the console flow
    pub thread_id: String,
    /// Model turns allowed per invocation
    pub max_steps: u32,
    pub catalog: StaticCatalog,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            smoke_model: SMOKE_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.3,
            thread_id: DEFAULT_THREAD_ID.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            catalog: StaticCatalog::default(),
            database_url: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AgentConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .unwrap_or_default();

        let temperature = match get("GEMINI_TEMPERATURE") {
            Some(raw) => raw.parse::<f32>().map_err(|e| {
                AgentError::ConfigError(format!("GEMINI_TEMPERATURE '{}': {}", raw, e))
            })?,
            None => defaults.temperature,
        };

        let max_steps = match get("AGENT_MAX_STEPS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(AgentError::ConfigError(format!(
                        "AGENT_MAX_STEPS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
            None => defaults.max_steps,
        };

        let catalog = match get("STOCK_CATALOG") {
            Some(raw) => StaticCatalog::parse(&raw)?,
            None => defaults.catalog,
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AgentError::ConfigError(format!("PORT '{}': {}", raw, e)))?,
            None => defaults.port,
        };

        Ok(Self {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            smoke_model: get("GEMINI_SMOKE_MODEL").unwrap_or(defaults.smoke_model),
            base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            temperature,
            thread_id: get("AGENT_THREAD_ID").unwrap_or(defaults.thread_id),
            max_steps,
            catalog,
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            port,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != "your_gemini_api_key_here"
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("smoke_model", &self.smoke_model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("thread_id", &self.thread_id)
            .field("max_steps", &self.max_steps)
            .field("catalog", &self.catalog)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .finish()
    }
}
