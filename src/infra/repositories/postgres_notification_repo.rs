use crate::domain::models::notification::Notification;
use crate::domain::ports::NotificationRepository;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PostgresNotificationRepo {
    pool: PgPool,
}

impl PostgresNotificationRepo {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepo {
    async fn create(&self, n: &Notification) -> Result<Notification, AppError> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, recipient_id, appointment_id, notification_type, title, message, is_read, created_at, sent_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"
        )
            .bind(&n.id).bind(&n.recipient_id).bind(&n.appointment_id).bind(n.notification_type)
            .bind(&n.title).bind(&n.message).bind(n.is_read).bind(n.created_at).bind(n.sent_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_id(&self, recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_recipient(&self, recipient_id: &str, limit: i64) -> Result<Vec<Notification>, AppError> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        )
            .bind(recipient_id)
            .bind(limit)
            .fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE")
            .bind(recipient_id)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2 AND is_read = FALSE")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE")
            .bind(recipient_id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError> {
        sqlx::query_as::<_, Notification>("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2 RETURNING *")
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }
}
