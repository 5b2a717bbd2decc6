// Retry Queue Port (durable, at-least-once)

use crate::domain::FailedMessage;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One claimed queue item; it stays invisible to other consumers until it
/// is acknowledged or released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDelivery {
    pub delivery_id: i64,
    pub payload: Vec<u8>,
}

/// Durable publish/consume channel for failed deliveries
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Queue name used for logging
    fn name(&self) -> &str;

    /// Enqueue an already-encoded payload
    async fn publish_raw(&self, payload: &[u8]) -> Result<()>;

    /// Serialize `message` to its JSON wire form and enqueue it
    async fn publish(&self, message: &FailedMessage) -> Result<()> {
        let payload = message.to_payload()?;
        self.publish_raw(&payload).await
    }

    /// Wait for the next item.
    ///
    /// Returns `Ok(None)` once `cancel` fires.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueDelivery>>;

    /// Remove the item permanently
    async fn ack(&self, delivery: &QueueDelivery) -> Result<()>;

    /// Give the item back for redelivery
    async fn release(&self, delivery: &QueueDelivery) -> Result<()>;

    /// Make items claimed by a previous (crashed) consumer deliverable again
    async fn recover_unacked(&self) -> Result<u64>;

    /// Items waiting for delivery (claimed items excluded)
    async fn depth(&self) -> Result<i64>;

    async fn close(&self);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct State {
        next_id: i64,
        ready: VecDeque<QueueDelivery>,
        claimed: HashMap<i64, QueueDelivery>,
        published: Vec<Vec<u8>>,
        acked: Vec<i64>,
        released: Vec<i64>,
        fail_publish: bool,
        closed: bool,
    }

    /// In-memory queue that records every publish, ack and release
    #[derive(Default)]
    pub struct InMemoryRetryQueue {
        state: Mutex<State>,
        notify: Notify,
    }

    impl InMemoryRetryQueue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_publishes(&self, fail: bool) {
            self.state.lock().unwrap().fail_publish = fail;
        }

        /// Every successfully published message that parses, in order
        pub fn published(&self) -> Vec<FailedMessage> {
            self.state
                .lock()
                .unwrap()
                .published
                .iter()
                .filter_map(|p| FailedMessage::from_payload(p).ok())
                .collect()
        }

        pub fn publish_count(&self) -> usize {
            self.state.lock().unwrap().published.len()
        }

        pub fn acked(&self) -> Vec<i64> {
            self.state.lock().unwrap().acked.clone()
        }

        pub fn released(&self) -> Vec<i64> {
            self.state.lock().unwrap().released.clone()
        }

        pub fn ready_len(&self) -> usize {
            self.state.lock().unwrap().ready.len()
        }

        pub fn claimed_len(&self) -> usize {
            self.state.lock().unwrap().claimed.len()
        }

        pub fn is_closed(&self) -> bool {
            self.state.lock().unwrap().closed
        }

        fn try_claim(&self) -> Option<QueueDelivery> {
            let mut state = self.state.lock().unwrap();
            let delivery = state.ready.pop_front()?;
            state.claimed.insert(delivery.delivery_id, delivery.clone());
            Some(delivery)
        }
    }

    #[async_trait]
    impl RetryQueue for InMemoryRetryQueue {
        fn name(&self) -> &str {
            "in-memory"
        }

        async fn publish_raw(&self, payload: &[u8]) -> Result<()> {
            {
                let mut state = self.state.lock().unwrap();
                if state.closed {
                    return Err(AppError::Queue("queue closed".to_string()));
                }
                if state.fail_publish {
                    return Err(AppError::Queue("publish failed (mock)".to_string()));
                }
                state.next_id += 1;
                let delivery = QueueDelivery {
                    delivery_id: state.next_id,
                    payload: payload.to_vec(),
                };
                state.published.push(delivery.payload.clone());
                state.ready.push_back(delivery);
            }
            self.notify.notify_one();
            Ok(())
        }

        async fn receive(&self, cancel: &CancellationToken) -> Result<Option<QueueDelivery>> {
            loop {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                if let Some(delivery) = self.try_claim() {
                    return Ok(Some(delivery));
                }
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = cancel.cancelled() => return Ok(None),
                }
            }
        }

        async fn ack(&self, delivery: &QueueDelivery) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state
                .claimed
                .remove(&delivery.delivery_id)
                .ok_or_else(|| AppError::Queue(format!("delivery {} not claimed", delivery.delivery_id)))?;
            state.acked.push(delivery.delivery_id);
            Ok(())
        }

        async fn release(&self, delivery: &QueueDelivery) -> Result<()> {
            {
                let mut state = self.state.lock().unwrap();
                let item = state
                    .claimed
                    .remove(&delivery.delivery_id)
                    .ok_or_else(|| AppError::Queue(format!("delivery {} not claimed", delivery.delivery_id)))?;
                state.released.push(item.delivery_id);
                state.ready.push_front(item);
            }
            self.notify.notify_one();
            Ok(())
        }

        async fn recover_unacked(&self) -> Result<u64> {
            let recovered = {
                let mut state = self.state.lock().unwrap();
                let mut items: Vec<QueueDelivery> = state.claimed.drain().map(|(_, d)| d).collect();
                items.sort_by_key(|d| std::cmp::Reverse(d.delivery_id));
                let count = items.len() as u64;
                for item in items {
                    state.ready.push_front(item);
                }
                count
            };
            if recovered > 0 {
                self.notify.notify_one();
            }
            Ok(recovered)
        }

        async fn depth(&self) -> Result<i64> {
            Ok(self.state.lock().unwrap().ready.len() as i64)
        }

        async fn close(&self) {
            self.state.lock().unwrap().closed = true;
        }
    }

}
