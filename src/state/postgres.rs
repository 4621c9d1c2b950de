//! Postgres checkpoint backend
//!
//! One row per thread holding the serialized `ThreadState`, replaced on
//! every save. Schema is created on first use.

use crate::error::AgentError;
use crate::state::{Checkpointer, ThreadState};
use crate::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub struct PostgresCheckpointer {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresCheckpointer {
    /// Build a pool without connecting; the first query connects
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS agent_checkpoints (
                      thread_id TEXT PRIMARY KEY,
                      state TEXT NOT NULL,
                      suspended BOOLEAN NOT NULL DEFAULT FALSE,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::DatabaseError(format!(
                    "Failed to initialize checkpoint schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Checkpointer for PostgresCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadState>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT state FROM agent_checkpoints WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AgentError::DatabaseError(format!("Failed to load checkpoint: {}", e))
            })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("state")?;
        let state: ThreadState = serde_json::from_str(&raw).map_err(|e| {
            AgentError::StateError(format!("Corrupt checkpoint for thread {}: {}", thread_id, e))
        })?;

        debug!(thread_id, messages = state.history.message_count(), "Checkpoint loaded");
        Ok(Some(state))
    }

    async fn save(&self, state: &ThreadState) -> Result<()> {
        self.ensure_schema().await?;

        let raw = serde_json::to_string(state)?;

        sqlx::query(
            r#"
            INSERT INTO agent_checkpoints (thread_id, state, suspended, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (thread_id)
            DO UPDATE SET state = EXCLUDED.state,
                          suspended = EXCLUDED.suspended,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&state.thread_id)
        .bind(raw)
        .bind(state.is_suspended())
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::DatabaseError(format!("Failed to save checkpoint: {}", e)))?;

        debug!(thread_id = %state.thread_id, "Checkpoint saved");
        Ok(())
    }
}
