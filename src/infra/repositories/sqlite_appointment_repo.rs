use crate::domain::models::appointment::{Appointment, AppointmentStatus};
use crate::domain::ports::AppointmentRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteAppointmentRepo {
    pool: SqlitePool,
}

impl SqliteAppointmentRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

// Slot-holding rows of one employee on one day that intersect [start, end).
const OVERLAP_FILTER: &str = "employee_id = ? AND date = ? AND status NOT IN ('cancelled', 'no_show') AND start_time < ? AND ? < end_time";

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepo {
    async fn find_by_id(&self, id: &str) -> Result<Option<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_business(&self, business_id: &str, date: Option<NaiveDate>) -> Result<Vec<Appointment>, AppError> {
        match date {
            Some(day) => sqlx::query_as::<_, Appointment>(
                "SELECT * FROM appointments WHERE business_id = ? AND date = ? ORDER BY start_time ASC"
            )
                .bind(business_id)
                .bind(day)
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query_as::<_, Appointment>(
                "SELECT * FROM appointments WHERE business_id = ? ORDER BY date ASC, start_time ASC"
            )
                .bind(business_id)
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(AppError::Database)
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE client_id = ? ORDER BY date DESC, start_time DESC"
        )
            .bind(client_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create_if_slot_free(&self, a: &Appointment) -> Result<Appointment, AppError> {
        // Single statement: SQLite's write lock makes the check and the insert atomic.
        let query = format!(
            "INSERT INTO appointments (id, business_id, employee_id, client_id, walk_in_client_id, date, start_time, end_time, services, total_price_cents, status, notes, internal_notes, cancelled_by, cancelled_at, created_at, updated_at)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (SELECT 1 FROM appointments WHERE {})
             RETURNING *",
            OVERLAP_FILTER
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(&a.id).bind(&a.business_id).bind(&a.employee_id).bind(&a.client_id).bind(&a.walk_in_client_id)
            .bind(a.date).bind(a.start_time).bind(a.end_time).bind(&a.services).bind(a.total_price_cents)
            .bind(a.status).bind(&a.notes).bind(&a.internal_notes).bind(&a.cancelled_by).bind(a.cancelled_at)
            .bind(a.created_at).bind(a.updated_at)
            .bind(&a.employee_id).bind(a.date).bind(a.end_time).bind(a.start_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::SlotUnavailable)
    }

    async fn update_status(&self, a: &Appointment, expected: AppointmentStatus) -> Result<Option<Appointment>, AppError> {
        sqlx::query_as::<_, Appointment>(
            "UPDATE appointments SET status = ?, notes = ?, internal_notes = ?, cancelled_by = ?, cancelled_at = ?, updated_at = ?
             WHERE id = ? AND status = ? RETURNING *"
        )
            .bind(a.status).bind(&a.notes).bind(&a.internal_notes).bind(&a.cancelled_by).bind(a.cancelled_at).bind(a.updated_at)
            .bind(&a.id).bind(expected)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update_schedule(&self, a: &Appointment, expected: AppointmentStatus) -> Result<Appointment, AppError> {
        let query = format!(
            "UPDATE appointments SET date = ?, start_time = ?, end_time = ?, employee_id = ?, updated_at = ?
             WHERE id = ? AND status = ?
             AND NOT EXISTS (SELECT 1 FROM appointments WHERE id <> ? AND {})
             RETURNING *",
            OVERLAP_FILTER
        );
        let updated = sqlx::query_as::<_, Appointment>(&query)
            .bind(a.date).bind(a.start_time).bind(a.end_time).bind(&a.employee_id).bind(a.updated_at)
            .bind(&a.id).bind(expected)
            .bind(&a.id).bind(&a.employee_id).bind(a.date).bind(a.end_time).bind(a.start_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        match updated {
            Some(appointment) => Ok(appointment),
            None => match self.find_by_id(&a.id).await? {
                Some(current) if current.status != expected => {
                    Err(AppError::Conflict(format!("Appointment is now {}", current.status)))
                }
                Some(_) => Err(AppError::SlotUnavailable),
                None => Err(AppError::NotFound("Appointment not found".into())),
            },
        }
    }

    async fn find_overlapping(&self, employee_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Vec<Appointment>, AppError> {
        let query = format!("SELECT * FROM appointments WHERE {} ORDER BY start_time ASC", OVERLAP_FILTER);
        sqlx::query_as::<_, Appointment>(&query)
            .bind(employee_id).bind(date).bind(end).bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn count_client_cancellations(&self, client_id: &str, business_id: &str, since: DateTime<Utc>) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM appointments
             WHERE client_id = ? AND business_id = ? AND status = 'cancelled' AND cancelled_by = ? AND cancelled_at >= ?"
        )
            .bind(client_id)
            .bind(business_id)
            .bind(client_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
