use crate::domain::models::appointment::{Appointment, AppointmentStatus};
use crate::domain::ports::AppointmentRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

pub struct PostgresAppointmentRepo {
    pool: PgPool,
}

impl PostgresAppointmentRepo {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Serializes slot writes per employee until the transaction ends.
    async fn lock_employee(tx: &mut Transaction<'_, Postgres>, employee_id: &str) -> Result<(), AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(employee_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for PostgresAppointmentRepo {
    async fn find_by_id(&self, id: &str) -> Result<Option<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_business(&self, business_id: &str, date: Option<NaiveDate>) -> Result<Vec<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE business_id = $1 AND ($2::date IS NULL OR date = $2) ORDER BY date ASC, start_time ASC"
        )
            .bind(business_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE client_id = $1 ORDER BY date DESC, start_time DESC"
        )
            .bind(client_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create_if_slot_free(&self, a: &Appointment) -> Result<Appointment, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        Self::lock_employee(&mut tx, &a.employee_id).await?;

        let created = sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (id, business_id, employee_id, client_id, walk_in_client_id, date, start_time, end_time, services, total_price_cents, status, notes, internal_notes, cancelled_by, cancelled_at, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17
            WHERE NOT EXISTS (
                SELECT 1 FROM appointments
                WHERE employee_id = $3 AND date = $6
                AND status NOT IN ('cancelled', 'no_show')
                AND start_time < $8 AND $7 < end_time
            )
            RETURNING *
            "#
        )
            .bind(&a.id).bind(&a.business_id).bind(&a.employee_id).bind(&a.client_id).bind(&a.walk_in_client_id)
            .bind(a.date).bind(a.start_time).bind(a.end_time).bind(&a.services).bind(a.total_price_cents)
            .bind(a.status).bind(&a.notes).bind(&a.internal_notes).bind(&a.cancelled_by).bind(a.cancelled_at)
            .bind(a.created_at).bind(a.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        let Some(created) = created else {
            tx.rollback().await.map_err(AppError::Database)?;
            return Err(AppError::SlotUnavailable);
        };
        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    async fn update_status(&self, a: &Appointment, expected: AppointmentStatus) -> Result<Option<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "UPDATE appointments SET status = $1, notes = $2, internal_notes = $3, cancelled_by = $4, cancelled_at = $5, updated_at = $6
             WHERE id = $7 AND status = $8 RETURNING *"
        )
            .bind(a.status).bind(&a.notes).bind(&a.internal_notes).bind(&a.cancelled_by).bind(a.cancelled_at).bind(a.updated_at)
            .bind(&a.id).bind(expected)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update_schedule(&self, a: &Appointment, expected: AppointmentStatus) -> Result<Appointment, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        Self::lock_employee(&mut tx, &a.employee_id).await?;

        let current = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1 FOR UPDATE")
            .bind(&a.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Appointment not found".into()))?;
        if current.status != expected {
            return Err(AppError::Conflict(format!("Appointment is now {}", current.status)));
        }

        let updated = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments SET date = $1, start_time = $2, end_time = $3, employee_id = $4, updated_at = $5
            WHERE id = $6 AND status = $7
            AND NOT EXISTS (
                SELECT 1 FROM appointments
                WHERE id <> $6 AND employee_id = $4 AND date = $1
                AND status NOT IN ('cancelled', 'no_show')
                AND start_time < $3 AND $2 < end_time
            )
            RETURNING *
            "#
        )
            .bind(a.date).bind(a.start_time).bind(a.end_time).bind(&a.employee_id).bind(a.updated_at)
            .bind(&a.id).bind(expected)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        let Some(updated) = updated else {
            return Err(AppError::SlotUnavailable);
        };
        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }

    async fn find_overlapping(&self, employee_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Vec<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments
             WHERE employee_id = $1 AND date = $2 AND status NOT IN ('cancelled', 'no_show')
             AND start_time < $3 AND $4 < end_time
             ORDER BY start_time ASC"
        )
            .bind(employee_id).bind(date).bind(end).bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count_client_cancellations(&self, client_id: &str, business_id: &str, since: DateTime<Utc>) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM appointments
             WHERE client_id = $1 AND business_id = $2 AND status = 'cancelled' AND cancelled_by = $1 AND cancelled_at >= $3"
        )
            .bind(client_id)
            .bind(business_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
