// Notification Repository Port (Interface)

use crate::domain::{NewNotification, Notification, NotificationId, Status};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Notification persistence
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert a new notification in `New`; the store assigns id and `created_at`
    async fn create_notification(&self, new: &NewNotification) -> Result<Notification>;

    /// Oldest `New` notifications, id ascending
    async fn fetch_oldest_new(&self, limit: u32) -> Result<Vec<Notification>>;

    /// Move a notification to `status` and stamp `updated_at`.
    ///
    /// Re-recording the current status succeeds without changes, except
    /// for `Process`: that write is the delivery claim and succeeds once.
    ///
    /// # Errors
    /// - `AppError::NotFound` if no notification has this id
    /// - `AppError::Conflict` if the notification is already in `Process`
    /// - `AppError::InvalidState` if the lifecycle forbids the move
    async fn update_status(&self, id: NotificationId, status: Status) -> Result<()>;

    /// All notifications currently in `status`, id ascending
    async fn fetch_by_status(&self, status: Status) -> Result<Vec<Notification>>;

    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>>;

    async fn count_by_status(&self, status: Status) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        rows: BTreeMap<NotificationId, Notification>,
        next_id: i64,
        clock: i64,
        failing_targets: HashSet<Status>,
        fail_fetch: bool,
        history: Vec<(NotificationId, Status)>,
    }

    /// In-memory repository with the same transition rules as the SQLite adapter
    #[derive(Default)]
    pub struct InMemoryNotificationRepository {
        state: Mutex<State>,
    }

    impl InMemoryNotificationRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a `New` notification without going through the async API
        pub fn seed(&self, phone_number: &str, content: &str) -> Notification {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.clock += 1;
            let notification = Notification {
                id: NotificationId::new(state.next_id),
                phone_number: phone_number.to_string(),
                content: content.to_string(),
                status: Status::New,
                created_at: state.clock,
                updated_at: None,
            };
            state.rows.insert(notification.id, notification.clone());
            notification
        }

        /// Insert a notification already sitting in `status`
        pub fn seed_with_status(&self, phone_number: &str, content: &str, status: Status) -> Notification {
            let mut notification = self.seed(phone_number, content);
            let mut state = self.state.lock().unwrap();
            if let Some(row) = state.rows.get_mut(&notification.id) {
                row.status = status;
            }
            notification.status = status;
            notification
        }

        pub fn status_of(&self, id: NotificationId) -> Option<Status> {
            self.state.lock().unwrap().rows.get(&id).map(|n| n.status)
        }

        /// Make every write targeting `status` fail with a database error
        pub fn fail_updates_to(&self, status: Status) {
            self.state.lock().unwrap().failing_targets.insert(status);
        }

        pub fn fail_fetches(&self, fail: bool) {
            self.state.lock().unwrap().fail_fetch = fail;
        }

        /// Successful status writes in call order
        pub fn history(&self) -> Vec<(NotificationId, Status)> {
            self.state.lock().unwrap().history.clone()
        }
    }

    #[async_trait]
    impl NotificationRepository for InMemoryNotificationRepository {
        async fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
            Ok(self.seed(&new.phone_number, &new.content))
        }

        async fn fetch_oldest_new(&self, limit: u32) -> Result<Vec<Notification>> {
            let state = self.state.lock().unwrap();
            if state.fail_fetch {
                return Err(AppError::Database("fetch failed (mock)".to_string()));
            }
            Ok(state
                .rows
                .values()
                .filter(|n| n.status == Status::New)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn update_status(&self, id: NotificationId, status: Status) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.failing_targets.contains(&status) {
                return Err(AppError::Database(format!(
                    "update to {} failed (mock)",
                    status
                )));
            }
            state.clock += 1;
            let now = state.clock;
            let row = state
                .rows
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Notification {}", id)))?;
            if row.status == status {
                if status == Status::Process {
                    return Err(AppError::Conflict(format!(
                        "Notification {} is already being delivered",
                        id
                    )));
                }
                return Ok(());
            }
            row.transition(status, now)
                .map_err(|e| AppError::InvalidState(e.to_string()))?;
            state.history.push((id, status));
            Ok(())
        }

        async fn fetch_by_status(&self, status: Status) -> Result<Vec<Notification>> {
            let state = self.state.lock().unwrap();
            if state.fail_fetch {
                return Err(AppError::Database("fetch failed (mock)".to_string()));
            }
            Ok(state
                .rows
                .values()
                .filter(|n| n.status == status)
                .cloned()
                .collect())
        }

        async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>> {
            Ok(self.state.lock().unwrap().rows.get(&id).cloned())
        }

        async fn count_by_status(&self, status: Status) -> Result<i64> {
            let state = self.state.lock().unwrap();
            Ok(state.rows.values().filter(|n| n.status == status).count() as i64)
        }
    }
}
