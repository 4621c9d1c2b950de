//! State persistence layer
//!
//! Checkpoints each conversation thread (history plus any pending approval)
//! keyed by thread id. In-memory by default; Postgres when configured.

use crate::memory::{ConversationHistory, ConversationMessage};
use crate::models::PendingApproval;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub mod postgres;
pub use postgres::PostgresCheckpointer;

/// Everything needed to continue a conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadState {
    pub thread_id: String,
    pub history: ConversationHistory,
    pub pending: Option<PendingApproval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            history: ConversationHistory::new(),
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.history.add_message(message);
        self.updated_at = Utc::now();
    }

    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }
}

/// Trait for checkpoint persistence
#[async_trait::async_trait]
pub trait Checkpointer: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>>;
    async fn save(&self, state: &ThreadState) -> Result<()>;
}

/// In-memory checkpoint store for development
pub struct InMemoryCheckpointer {
    threads: Arc<RwLock<HashMap<String, ThreadState>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, state: &ThreadState) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.insert(state.thread_id.clone(), state.clone());
        Ok(())
    }
}

/// Pick the checkpoint backend: Postgres when a database URL is given
pub fn build_checkpointer(database_url: Option<&str>) -> Box<dyn Checkpointer> {
    if let Some(url) = database_url {
        match PostgresCheckpointer::connect_lazy(url) {
            Ok(store) => {
                info!("Checkpoint backend: postgres");
                return Box::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres checkpoint backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Checkpoint backend: in-memory");
    Box::new(InMemoryCheckpointer::new())
}
