use crate::domain::models::mail_log::{MailLog, MAIL_SENT};
use crate::domain::ports::MailLogRepository;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteMailLogRepo {
    pool: SqlitePool,
}

impl SqliteMailLogRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[async_trait]
impl MailLogRepository for SqliteMailLogRepo {
    async fn log_mail(&self, log: &MailLog) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO mail_logs (id, job_id, recipient, template_id, context_hash, sent_at, status) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
            .bind(&log.id).bind(&log.job_id).bind(&log.recipient).bind(&log.template_id)
            .bind(&log.context_hash).bind(log.sent_at).bind(&log.status)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn has_mail_been_sent(&self, recipient: &str, template_id: &str, context_hash: &str) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM mail_logs WHERE recipient = ? AND template_id = ? AND context_hash = ? AND status = ?"
        )
            .bind(recipient).bind(template_id).bind(context_hash).bind(MAIL_SENT)
            .fetch_one(&self.pool).await.map_err(AppError::Database)?;
        Ok(count > 0)
    }

    async fn list_logs(&self, recipient: Option<&str>) -> Result<Vec<MailLog>, AppError> {
        match recipient {
            Some(r) => sqlx::query_as::<_, MailLog>("SELECT * FROM mail_logs WHERE recipient = ? ORDER BY sent_at DESC")
                .bind(r)
                .fetch_all(&self.pool).await,
            None => sqlx::query_as::<_, MailLog>("SELECT * FROM mail_logs ORDER BY sent_at DESC LIMIT 100")
                .fetch_all(&self.pool).await,
        }
        .map_err(AppError::Database)
    }
}
