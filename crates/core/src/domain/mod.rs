// Domain Layer - Pure business logic and entities

pub mod error;
pub mod failed_message;
pub mod notification;
pub mod status;

// Re-exports
pub use error::DomainError;
pub use failed_message::FailedMessage;
pub use notification::{NewNotification, Notification, NotificationId};
pub use status::{status_label, Status};
