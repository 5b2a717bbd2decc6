// Herald Infrastructure - SQLite Adapter
// Implements: NotificationRepository, RetryQueue

mod connection;
mod error;
mod migration;
mod notification_repository;
mod retry_queue;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use notification_repository::SqliteNotificationRepository;
pub use retry_queue::{SqliteRetryQueue, DEFAULT_POLL_INTERVAL};

// sqlx::Error -> AppError goes through error::map_sqlx_error (orphan rules
// rule out a From impl here)
