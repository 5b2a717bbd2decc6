// SQLite RetryQueue Implementation
//
// READY rows are deliverable; a claim flips the oldest READY row to CLAIMED
// atomically. Ack deletes the row, release flips it back.

use crate::error::map_queue_error;
use async_trait::async_trait;
use herald_core::error::{AppError, Result};
use herald_core::port::{QueueDelivery, RetryQueue, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Wait between claim attempts while the queue is empty
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const STATE_READY: &str = "READY";
const STATE_CLAIMED: &str = "CLAIMED";

pub struct SqliteRetryQueue {
    pool: SqlitePool,
    name: String,
    poll_interval: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteRetryQueue {
    pub fn new(pool: SqlitePool, name: impl Into<String>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            name: name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            time_provider,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn try_claim(&self) -> Result<Option<QueueDelivery>> {
        let row: Option<(i64, Vec<u8>)> = sqlx::query_as(
            r#"
            UPDATE retry_queue
            SET state = ?, claimed_at = ?
            WHERE id = (
                SELECT id FROM retry_queue
                WHERE queue = ? AND state = ?
                ORDER BY id ASC
                LIMIT 1
            )
            RETURNING id, payload
            "#,
        )
        .bind(STATE_CLAIMED)
        .bind(self.time_provider.now_millis())
        .bind(&self.name)
        .bind(STATE_READY)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_queue_error)?;

        Ok(row.map(|(delivery_id, payload)| QueueDelivery {
            delivery_id,
            payload,
        }))
    }
}

#[async_trait]
impl RetryQueue for SqliteRetryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish_raw(&self, payload: &[u8]) -> Result<()> {
        if self.pool.is_closed() {
            return Err(AppError::Queue(format!("Queue {} is closed", self.name)));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO retry_queue (queue, payload, state, enqueued_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&self.name)
        .bind(payload)
        .bind(STATE_READY)
        .bind(self.time_provider.now_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(map_queue_error)?;

        debug!(queue = %self.name, delivery_id = id, "Published retry item");
        Ok(())
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueDelivery>> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(delivery) = self.try_claim().await? {
                return Ok(Some(delivery));
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return Ok(None),
            }
        }
    }

    async fn ack(&self, delivery: &QueueDelivery) -> Result<()> {
        let result = sqlx::query("DELETE FROM retry_queue WHERE id = ? AND state = ?")
            .bind(delivery.delivery_id)
            .bind(STATE_CLAIMED)
            .execute(&self.pool)
            .await
            .map_err(map_queue_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Queue(format!(
                "Delivery {} is not claimed on {}",
                delivery.delivery_id, self.name
            )));
        }
        Ok(())
    }

    async fn release(&self, delivery: &QueueDelivery) -> Result<()> {
        let result = sqlx::query(
            "UPDATE retry_queue SET state = ?, claimed_at = NULL WHERE id = ? AND state = ?",
        )
        .bind(STATE_READY)
        .bind(delivery.delivery_id)
        .bind(STATE_CLAIMED)
        .execute(&self.pool)
        .await
        .map_err(map_queue_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Queue(format!(
                "Delivery {} is not claimed on {}",
                delivery.delivery_id, self.name
            )));
        }
        Ok(())
    }

    async fn recover_unacked(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE retry_queue SET state = ?, claimed_at = NULL WHERE queue = ? AND state = ?",
        )
        .bind(STATE_READY)
        .bind(&self.name)
        .bind(STATE_CLAIMED)
        .execute(&self.pool)
        .await
        .map_err(map_queue_error)?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            info!(queue = %self.name, recovered, "Recovered unacknowledged retry items");
        }
        Ok(recovered)
    }

    async fn depth(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM retry_queue WHERE queue = ? AND state = ?")
            .bind(&self.name)
            .bind(STATE_READY)
            .fetch_one(&self.pool)
            .await
            .map_err(map_queue_error)
    }

    /// Closes the pool this queue was built on. The daemon shares that pool
    /// with the notification repository, so call this last.
    async fn close(&self) {
        self.pool.close().await;
        info!(queue = %self.name, "Retry queue closed");
    }
}
