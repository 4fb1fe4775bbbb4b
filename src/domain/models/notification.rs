use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewAppointment,
    CancelledByClient,
    ModifiedByClient,
    Confirmed,
    CancelledByBusiness,
    Rescheduled,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub appointment_id: Option<String>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

pub struct NewNotification {
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub appointment_id: Option<String>,
}

impl Notification {
    pub fn new(params: NewNotification) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            recipient_id: params.recipient_id,
            appointment_id: params.appointment_id,
            notification_type: params.notification_type,
            title: params.title,
            message: params.message,
            is_read: false,
            created_at: now,
            sent_at: Some(now),
        }
    }
}
