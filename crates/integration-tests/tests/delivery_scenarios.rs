//! Delivery and retry scenarios against SQLite
//!
//! Each test drives one Delivery Worker pass and then hands queue items to
//! the retry processor one at a time, so every step can be asserted.

use herald_core::application::{DeliveryWorker, RetryOutcome, RetryProcessor};
use herald_core::domain::{FailedMessage, NewNotification, Notification, Status};
use herald_core::port::webhook_client::mocks::{Outcome, ScriptedWebhookClient};
use herald_core::port::{NotificationRepository, RetryQueue, SystemTimeProvider};
use herald_infra_sqlite::{
    create_pool, run_migrations, SqliteNotificationRepository, SqliteRetryQueue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const UNIT: Duration = Duration::from_millis(5);

struct Harness {
    repo: Arc<SqliteNotificationRepository>,
    queue: Arc<SqliteRetryQueue>,
    webhook: Arc<ScriptedWebhookClient>,
    worker: Arc<DeliveryWorker>,
}

impl Harness {
    async fn new(webhook: ScriptedWebhookClient) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time = Arc::new(SystemTimeProvider);
        let repo = Arc::new(SqliteNotificationRepository::new(pool.clone(), time.clone()));
        let queue = Arc::new(
            SqliteRetryQueue::new(pool, "retry", time).with_poll_interval(Duration::from_millis(10)),
        );
        let webhook = Arc::new(webhook);
        let worker = Arc::new(DeliveryWorker::new(
            repo.clone(),
            webhook.clone(),
            queue.clone(),
        ));

        Self {
            repo,
            queue,
            webhook,
            worker,
        }
    }

    async fn create(&self, content: &str) -> Notification {
        self.repo
            .create_notification(&NewNotification::new("+905551112233", content))
            .await
            .unwrap()
    }

    async fn status_of(&self, n: &Notification) -> Status {
        self.repo.find_by_id(n.id).await.unwrap().unwrap().status
    }

    fn processor(&self, max_retries: u32) -> RetryProcessor {
        RetryProcessor::new(self.queue.clone(), self.worker.clone(), max_retries, UNIT)
    }

    /// Claim the next item and let the processor decide its fate
    async fn step(&self, processor: &RetryProcessor) -> RetryOutcome {
        let cancel = CancellationToken::new();
        let delivery = self.queue.receive(&cancel).await.unwrap().unwrap();
        processor.handle_delivery(&delivery, &cancel).await
    }

    async fn peek_attempt(&self) -> u32 {
        let cancel = CancellationToken::new();
        let delivery = self.queue.receive(&cancel).await.unwrap().unwrap();
        let message = FailedMessage::from_payload(&delivery.payload).unwrap();
        self.queue.release(&delivery).await.unwrap();
        message.attempt
    }
}

#[tokio::test]
async fn scenario_all_delivered_on_first_pass() {
    let h = Harness::new(ScriptedWebhookClient::always_accept()).await;
    let a = h.create("first").await;
    let b = h.create("second").await;

    let report = h.worker.deliver_due_notifications().await.unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(h.status_of(&a).await, Status::Sent);
    assert_eq!(h.status_of(&b).await, Status::Sent);
    assert_eq!(h.queue.depth().await.unwrap(), 0);
    assert_eq!(h.webhook.call_count(), 2);
}

#[tokio::test]
async fn scenario_retries_until_delivered() {
    let script = [
        Outcome::server_error(),
        Outcome::server_error(),
        Outcome::server_error(),
        Outcome::Accept,
    ];
    let h = Harness::new(ScriptedWebhookClient::new(script, Outcome::Accept)).await;
    let n = h.create("flaky").await;

    h.worker.deliver_due_notifications().await.unwrap();
    assert_eq!(h.status_of(&n).await, Status::Fail);
    assert_eq!(h.peek_attempt().await, 0);

    let processor = h.processor(3);
    assert_eq!(h.step(&processor).await, RetryOutcome::Rescheduled { attempt: 1 });
    assert_eq!(h.peek_attempt().await, 1);
    assert_eq!(h.status_of(&n).await, Status::Fail);

    assert_eq!(h.step(&processor).await, RetryOutcome::Rescheduled { attempt: 2 });
    assert_eq!(h.peek_attempt().await, 2);

    assert_eq!(h.step(&processor).await, RetryOutcome::Delivered);
    assert_eq!(h.status_of(&n).await, Status::Sent);
    assert_eq!(h.queue.depth().await.unwrap(), 0);
    assert_eq!(h.webhook.call_count(), 4);
}

#[tokio::test]
async fn scenario_dead_lettered_at_retry_ceiling() {
    let h = Harness::new(ScriptedWebhookClient::always_fail()).await;
    let n = h.create("doomed").await;

    h.worker.deliver_due_notifications().await.unwrap();
    let processor = h.processor(1);

    assert_eq!(h.step(&processor).await, RetryOutcome::Rescheduled { attempt: 1 });
    assert_eq!(h.webhook.call_count(), 2);

    assert_eq!(h.step(&processor).await, RetryOutcome::DeadLettered);
    assert_eq!(h.status_of(&n).await, Status::Dead);
    assert_eq!(h.queue.depth().await.unwrap(), 0);
    // no delivery attempt once the ceiling is reached
    assert_eq!(h.webhook.call_count(), 2);
}

#[tokio::test]
async fn scenario_malformed_payload_is_dead_lettered() {
    let h = Harness::new(ScriptedWebhookClient::always_fail()).await;
    let n = h.create("garbled").await;
    h.worker.deliver_due_notifications().await.unwrap();

    // swap the well-formed item for an unreadable one naming the same notification
    let cancel = CancellationToken::new();
    let original = h.queue.receive(&cancel).await.unwrap().unwrap();
    h.queue.ack(&original).await.unwrap();
    let payload = format!(r#"{{"messageId":"{}","attempt":"many"}}"#, n.id);
    h.queue.publish_raw(payload.as_bytes()).await.unwrap();

    let delivery = h.queue.receive(&cancel).await.unwrap().unwrap();
    let outcome = h.processor(3).handle_delivery(&delivery, &cancel).await;

    assert_eq!(outcome, RetryOutcome::Malformed);
    assert_eq!(h.status_of(&n).await, Status::Dead);
    assert_eq!(h.queue.depth().await.unwrap(), 0);
    // acknowledged exactly once: a second ack finds nothing
    assert!(h.queue.ack(&delivery).await.is_err());
    assert_eq!(h.webhook.call_count(), 1);
}

#[tokio::test]
async fn scenario_round_trip_preserves_message_fields() {
    let h = Harness::new(ScriptedWebhookClient::always_fail()).await;
    let n = h.create("keep me").await;
    h.worker.deliver_due_notifications().await.unwrap();

    let delivery = h.queue.receive(&CancellationToken::new()).await.unwrap().unwrap();
    let message = FailedMessage::from_payload(&delivery.payload).unwrap();

    assert_eq!(message.message_id, n.id.to_string());
    assert_eq!(message.phone_number, n.phone_number);
    assert_eq!(message.content, n.content);
    assert_eq!(message.attempt, 0);
    assert_eq!(message.status, Status::Fail.code());
}
