// Application Layer - Use Cases and Business Logic

mod background;
pub mod backoff;
pub mod notification;
pub mod recovery;
pub mod retry_consumer;
pub mod scheduler;
pub mod worker;

// Re-exports
pub use backoff::{backoff_delay, fibonacci};
pub use notification::{CreateNotificationRequest, NotificationService};
pub use recovery::{RecoveryReport, RecoveryService};
pub use retry_consumer::{RetryConsumer, RetryHandler, RetryOutcome, RetryProcessor};
pub use scheduler::Scheduler;
pub use worker::{DeliveryReport, DeliveryWorker};
