use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use crate::domain::models::reschedule::RescheduleChanges;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_PROCESSING: &str = "PROCESSING";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_CANCELLED: &str = "CANCELLED";

/// Lifecycle events that fan out into emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailEvent {
    NewBooking,
    Cancellation,
    NoShow,
    Reminder,
    Reschedule,
}

impl EmailEvent {
    pub fn job_type(&self) -> &'static str {
        match self {
            EmailEvent::NewBooking => "NEW_BOOKING",
            EmailEvent::Cancellation => "CANCELLATION",
            EmailEvent::NoShow => "NO_SHOW",
            EmailEvent::Reminder => "REMINDER",
            EmailEvent::Reschedule => "RESCHEDULE",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobPayload {
    pub appointment_id: String,
    pub event: EmailEvent,
    pub changes: Option<RescheduleChanges>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub payload: Json<JobPayload>,
    pub execute_at: DateTime<Utc>,
    pub status: String,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(event: EmailEvent, appointment_id: String, changes: Option<RescheduleChanges>, execute_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type: event.job_type().to_string(),
            payload: Json(JobPayload { appointment_id, event, changes }),
            execute_at,
            status: STATUS_PENDING.to_string(),
            attempts: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}
