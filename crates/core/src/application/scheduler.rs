//! Scheduler - runs a delivery pass on a fixed interval
//!
//! One loop per process. The first pass runs right after `start`, then one
//! pass per interval. Cancelling the scope stops new passes; a pass already
//! in flight runs to completion.

use crate::application::background::BackgroundLoop;
use crate::application::worker::constants::DEFAULT_SCHEDULER_INTERVAL;
use crate::application::worker::DeliveryWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Scheduler {
    worker: Arc<DeliveryWorker>,
    interval: Duration,
    task: BackgroundLoop,
}

impl Scheduler {
    pub fn new(worker: Arc<DeliveryWorker>) -> Self {
        Self::with_interval(worker, DEFAULT_SCHEDULER_INTERVAL)
    }

    pub fn with_interval(worker: Arc<DeliveryWorker>, interval: Duration) -> Self {
        Self {
            worker,
            interval,
            task: BackgroundLoop::new("scheduler"),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the loop in a child scope of `parent`; no-op if already running
    pub async fn start(&self, parent: &CancellationToken) -> bool {
        let worker = Arc::clone(&self.worker);
        let interval = self.interval;
        self.task
            .start(parent, move |scope| run_loop(worker, interval, scope))
            .await
    }

    /// Cancel the loop; no-op if not running
    pub async fn stop(&self) -> bool {
        self.task.stop().await
    }

    pub async fn is_running(&self) -> bool {
        self.task.is_running().await
    }

    /// Wait for the loop (and its in-flight pass) to finish
    pub async fn join(&self, timeout: Duration) -> bool {
        self.task.join(timeout).await
    }
}

async fn run_loop(worker: Arc<DeliveryWorker>, interval: Duration, scope: CancellationToken) {
    info!(interval_ms = interval.as_millis() as u64, "Scheduler loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match worker.deliver_due_notifications().await {
            Ok(report) => debug!(fetched = report.fetched, "Scheduler pass complete"),
            Err(e) => error!(error = %e, "Scheduler pass failed"),
        }
    }
    info!("Scheduler loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;
    use crate::port::notification_repository::mocks::InMemoryNotificationRepository;
    use crate::port::retry_queue::mocks::InMemoryRetryQueue;
    use crate::port::webhook_client::mocks::ScriptedWebhookClient;

    fn scheduler(
        repo: Arc<InMemoryNotificationRepository>,
        interval: Duration,
    ) -> Scheduler {
        let worker = DeliveryWorker::new(
            repo,
            Arc::new(ScriptedWebhookClient::always_accept()),
            Arc::new(InMemoryRetryQueue::new()),
        );
        Scheduler::with_interval(Arc::new(worker), interval)
    }

    #[tokio::test]
    async fn test_start_runs_passes_until_stopped() {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let n = repo.seed("+905551110001", "one");
        let scheduler = scheduler(repo.clone(), Duration::from_millis(20));
        let root = CancellationToken::new();

        assert!(scheduler.start(&root).await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(repo.status_of(n.id), Some(Status::Sent));

        assert!(scheduler.stop().await);
        assert!(scheduler.join(Duration::from_secs(1)).await);

        // nothing picks this one up once stopped
        let later = repo.seed("+905551110002", "two");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(repo.status_of(later.id), Some(Status::New));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let scheduler = scheduler(repo, Duration::from_secs(10));
        let root = CancellationToken::new();

        assert!(!scheduler.stop().await);
        assert!(scheduler.start(&root).await);
        assert!(!scheduler.start(&root).await);
        assert!(scheduler.is_running().await);
        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        assert!(!scheduler.is_running().await);
    }

    /// Every notification reached the webhook exactly once, in id order
    fn assert_delivered_once(webhook: &ScriptedWebhookClient, expected: &[&str]) {
        let contents: Vec<String> = webhook.requests().into_iter().map(|r| r.content).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_restart_during_pass_delivers_once() {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let webhook =
            Arc::new(ScriptedWebhookClient::always_accept().with_latency(Duration::from_millis(200)));
        let worker = DeliveryWorker::new(repo.clone(), webhook.clone(), Arc::new(InMemoryRetryQueue::new()));
        let scheduler = Scheduler::with_interval(Arc::new(worker), Duration::from_secs(10));
        let root = CancellationToken::new();
        let seeded: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|content| repo.seed("+905551110001", content))
            .collect();

        assert!(scheduler.start(&root).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.stop().await);
        // the first pass is still holding "one"
        assert!(scheduler.start(&root).await);

        tokio::time::sleep(Duration::from_millis(900)).await;
        root.cancel();
        assert!(scheduler.join(Duration::from_secs(2)).await);

        for n in &seeded {
            assert_eq!(repo.status_of(n.id), Some(Status::Sent));
        }
        assert_delivered_once(&webhook, &["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_concurrent_starts_spawn_one_loop() {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let webhook = Arc::new(ScriptedWebhookClient::always_accept());
        let worker = DeliveryWorker::new(repo.clone(), webhook.clone(), Arc::new(InMemoryRetryQueue::new()));
        let scheduler = Arc::new(Scheduler::with_interval(Arc::new(worker), Duration::from_secs(10)));
        let root = CancellationToken::new();
        repo.seed("+905551110001", "one");
        repo.seed("+905551110002", "two");

        let mut starts = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            let root = root.clone();
            starts.spawn(async move { scheduler.start(&root).await });
        }
        let mut started = 0;
        while let Some(result) = starts.join_next().await {
            if result.unwrap() {
                started += 1;
            }
        }
        assert_eq!(started, 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        root.cancel();
        assert!(scheduler.join(Duration::from_secs(1)).await);
        assert_delivered_once(&webhook, &["one", "two"]);
    }

    #[tokio::test]
    async fn test_failing_pass_keeps_loop_alive() {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        repo.fail_fetches(true);
        let scheduler = scheduler(repo.clone(), Duration::from_millis(10));
        let root = CancellationToken::new();

        scheduler.start(&root).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.is_running().await);

        repo.fail_fetches(false);
        let n = repo.seed("+905551110001", "one");
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(repo.status_of(n.id), Some(Status::Sent));
        root.cancel();
        assert!(scheduler.join(Duration::from_secs(1)).await);
    }
}
