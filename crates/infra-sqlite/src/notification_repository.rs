// SQLite NotificationRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use herald_core::domain::{NewNotification, Notification, NotificationId, Status};
use herald_core::error::{AppError, Result};
use herald_core::port::{NotificationRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (phone_number, content, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL)
            RETURNING id, phone_number, content, status, created_at, updated_at
            "#,
        )
        .bind(&new.phone_number)
        .bind(&new.content)
        .bind(i64::from(Status::New.code()))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_notification()
    }

    async fn fetch_oldest_new(&self, limit: u32) -> Result<Vec<Notification>> {
        // id, not created_at: ids are monotonic even with concurrent producers
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, phone_number, content, status, created_at, updated_at
            FROM notifications
            WHERE status = ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(Status::New.code()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    async fn update_status(&self, id: NotificationId, status: Status) -> Result<()> {
        // Conditional update: only from a lifecycle predecessor of `status`.
        // Codes come from the Status enum, never from input.
        let allowed_from: Vec<String> = status
            .predecessors()
            .into_iter()
            .map(|s| s.code().to_string())
            .collect();

        let rows_affected = if allowed_from.is_empty() {
            0
        } else {
            let sql = format!(
                "UPDATE notifications SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
                allowed_from.join(", ")
            );
            sqlx::query(&sql)
                .bind(i64::from(status.code()))
                .bind(self.time_provider.now_millis())
                .bind(id.as_i64())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected()
        };

        if rows_affected > 0 {
            return Ok(());
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT status FROM notifications WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match current {
            None => Err(AppError::NotFound(format!("Notification {} not found", id))),
            // Process is the delivery claim: only one pass may win it
            Some(code) if status == Status::Process && code == i64::from(status.code()) => {
                Err(AppError::Conflict(format!(
                    "Notification {} is already being delivered",
                    id
                )))
            }
            // re-recording any other status is a no-op
            Some(code) if code == i64::from(status.code()) => Ok(()),
            Some(code) => Err(AppError::InvalidState(format!(
                "Cannot move notification {} from {} to {}",
                id,
                herald_core::domain::status_label(u8::try_from(code).unwrap_or(0)),
                status
            ))),
        }
    }

    async fn fetch_by_status(&self, status: Status) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, phone_number, content, status, created_at, updated_at
            FROM notifications
            WHERE status = ?
            ORDER BY id ASC
            "#,
        )
        .bind(i64::from(status.code()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, phone_number, content, status, created_at, updated_at FROM notifications WHERE id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(NotificationRow::into_notification).transpose()
    }

    async fn count_by_status(&self, status: Status) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE status = ?")
            .bind(i64::from(status.code()))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    phone_number: String,
    content: String,
    status: i64,
    created_at: i64,
    updated_at: Option<i64>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification> {
        let status = u8::try_from(self.status)
            .ok()
            .and_then(Status::from_code)
            .ok_or_else(|| {
                AppError::Database(format!(
                    "Notification {} has unknown status code {}",
                    self.id, self.status
                ))
            })?;

        Ok(Notification {
            id: NotificationId::new(self.id),
            phone_number: self.phone_number,
            content: self.content,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use herald_core::port::time_provider::mocks::ManualClock;

    async fn setup_test_db() -> (SqliteNotificationRepository, Arc<ManualClock>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        (SqliteNotificationRepository::new(pool, clock.clone()), clock)
    }

    fn new(content: &str) -> NewNotification {
        NewNotification::new("+905551112233", content)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (repo, _) = setup_test_db().await;

        let created = repo.create_notification(&new("hello")).await.unwrap();
        assert_eq!(created.status, Status::New);
        assert_eq!(created.created_at, 1_000);
        assert_eq!(created.updated_at, None);

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(repo.find_by_id(NotificationId::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (repo, _) = setup_test_db().await;
        let a = repo.create_notification(&new("a")).await.unwrap();
        let b = repo.create_notification(&new("b")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_fetch_oldest_new_orders_by_id_and_limits() {
        let (repo, _) = setup_test_db().await;
        let a = repo.create_notification(&new("a")).await.unwrap();
        let b = repo.create_notification(&new("b")).await.unwrap();
        let c = repo.create_notification(&new("c")).await.unwrap();
        repo.update_status(a.id, Status::Process).await.unwrap();

        let batch = repo.fetch_oldest_new(2).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, c.id]);
    }

    #[tokio::test]
    async fn test_update_status_follows_lifecycle() {
        let (repo, clock) = setup_test_db().await;
        let n = repo.create_notification(&new("a")).await.unwrap();

        clock.advance(500);
        repo.update_status(n.id, Status::Process).await.unwrap();
        repo.update_status(n.id, Status::Fail).await.unwrap();
        repo.update_status(n.id, Status::Dead).await.unwrap();

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.status, Status::Dead);
        assert_eq!(found.updated_at, Some(1_500));
        assert_eq!(found.created_at, 1_000);
    }

    #[tokio::test]
    async fn test_update_status_rejects_leaving_terminal() {
        let (repo, _) = setup_test_db().await;
        let n = repo.create_notification(&new("a")).await.unwrap();
        repo.update_status(n.id, Status::Process).await.unwrap();
        repo.update_status(n.id, Status::Sent).await.unwrap();

        let err = repo.update_status(n.id, Status::Fail).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        let err = repo.update_status(n.id, Status::New).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_update_status_same_status_is_noop() {
        let (repo, clock) = setup_test_db().await;
        let n = repo.create_notification(&new("a")).await.unwrap();
        repo.update_status(n.id, Status::Process).await.unwrap();
        repo.update_status(n.id, Status::Fail).await.unwrap();

        clock.advance(10);
        repo.update_status(n.id, Status::Fail).await.unwrap();

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.updated_at, Some(1_000));
    }

    #[tokio::test]
    async fn test_process_claim_is_exclusive() {
        let (repo, clock) = setup_test_db().await;
        let n = repo.create_notification(&new("a")).await.unwrap();
        repo.update_status(n.id, Status::Process).await.unwrap();

        clock.advance(10);
        let err = repo.update_status(n.id, Status::Process).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.status, Status::Process);
        assert_eq!(found.updated_at, Some(1_000));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (repo, _) = setup_test_db().await;
        let repo = Arc::new(repo);
        let n = repo.create_notification(&new("a")).await.unwrap();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let repo = repo.clone();
            set.spawn(async move { repo.update_status(n.id, Status::Process).await });
        }

        let mut won = 0;
        while let Some(result) = set.join_next().await {
            match result.unwrap() {
                Ok(()) => won += 1,
                Err(e) => assert!(matches!(e, AppError::Conflict(_))),
            }
        }
        assert_eq!(won, 1);
    }

    #[tokio::test]
    async fn test_update_status_unknown_id() {
        let (repo, _) = setup_test_db().await;
        let err = repo
            .update_status(NotificationId::new(42), Status::Process)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_and_count_by_status() {
        let (repo, _) = setup_test_db().await;
        let a = repo.create_notification(&new("a")).await.unwrap();
        repo.create_notification(&new("b")).await.unwrap();
        repo.update_status(a.id, Status::Process).await.unwrap();
        repo.update_status(a.id, Status::Sent).await.unwrap();

        let sent = repo.fetch_by_status(Status::Sent).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, a.id);
        assert_eq!(repo.count_by_status(Status::New).await.unwrap(), 1);
        assert_eq!(repo.count_by_status(Status::Dead).await.unwrap(), 0);
    }
}
