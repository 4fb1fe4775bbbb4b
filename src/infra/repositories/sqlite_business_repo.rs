use crate::domain::models::business::{Business, CancellationPolicy};
use crate::domain::ports::PolicyRepository;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteBusinessRepo {
    pool: SqlitePool,
}

impl SqliteBusinessRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[async_trait]
impl PolicyRepository for SqliteBusinessRepo {
    async fn create_business(&self, b: &Business) -> Result<Business, AppError> {
        sqlx::query_as::<_, Business>(
            "INSERT INTO businesses (id, owner_id, name, timezone, allow_client_cancellation, min_cancellation_hours, max_monthly_cancellations, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&b.id).bind(&b.owner_id).bind(&b.name).bind(&b.timezone)
            .bind(b.allow_client_cancellation).bind(b.min_cancellation_hours).bind(b.max_monthly_cancellations)
            .bind(b.created_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_business(&self, id: &str) -> Result<Option<Business>, AppError> {
        sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn update_policy(&self, business_id: &str, policy: &CancellationPolicy) -> Result<Business, AppError> {
        sqlx::query_as::<_, Business>(
            "UPDATE businesses SET allow_client_cancellation = ?, min_cancellation_hours = ?, max_monthly_cancellations = ?
             WHERE id = ? RETURNING *"
        )
            .bind(policy.allow_client_cancellation).bind(policy.min_hours_notice).bind(policy.max_monthly_cancellations)
            .bind(business_id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Business not found".into()))
    }
}
