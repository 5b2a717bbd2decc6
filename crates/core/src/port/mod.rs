// Port Layer - Interfaces for external dependencies

pub mod notification_repository;
pub mod retry_queue;
pub mod time_provider;
pub mod webhook_client;

// Re-exports
pub use notification_repository::NotificationRepository;
pub use retry_queue::{QueueDelivery, RetryQueue};
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use webhook_client::{SendMessageRequest, SendMessageResponse, WebhookClient, WebhookError};
