use crate::domain::{models::job::Job, ports::JobRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresJobRepo {
    pool: PgPool,
}

impl PostgresJobRepo {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl JobRepository for PostgresJobRepo {
    async fn create(&self, job: &Job) -> Result<Job, AppError> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, job_type, payload, execute_at, status, attempts, error_message, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *"
        )
            .bind(&job.id)
            .bind(&job.job_type)
            .bind(&job.payload)
            .bind(job.execute_at)
            .bind(&job.status)
            .bind(job.attempts)
            .bind(&job.error_message)
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_pending(&self, limit: i32) -> Result<Vec<Job>, AppError> {
        let now = Utc::now();
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'PROCESSING' WHERE id IN (SELECT id FROM jobs WHERE status = 'PENDING' AND execute_at <= $1 ORDER BY execute_at ASC LIMIT $2 FOR UPDATE SKIP LOCKED) RETURNING *"
        )
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_for_appointment(&self, appointment_id: &str) -> Result<Vec<Job>, AppError> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE payload->>'appointment_id' = $1 ORDER BY created_at ASC"
        )
            .bind(appointment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update_status(&self, id: &str, status: &str, error_message: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE jobs SET status = $1, error_message = $2 WHERE id = $3")
            .bind(status)
            .bind(error_message)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn retry_later(&self, id: &str, attempts: i32, execute_at: DateTime<Utc>, error_message: Option<String>) -> Result<(), AppError> {
        sqlx::query("UPDATE jobs SET status = 'PENDING', attempts = $1, execute_at = $2, error_message = $3 WHERE id = $4")
            .bind(attempts)
            .bind(execute_at)
            .bind(error_message)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn cancel_pending_reminders(&self, appointment_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE jobs SET status = 'CANCELLED' WHERE payload->>'appointment_id' = $1 AND job_type = 'REMINDER' AND status = 'PENDING'")
            .bind(appointment_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
