use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Business {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub timezone: String,
    pub allow_client_cancellation: bool,
    pub min_cancellation_hours: i32,
    pub max_monthly_cancellations: i32,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn new(owner_id: String, name: String, timezone: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            name,
            timezone,
            allow_client_cancellation: true,
            min_cancellation_hours: 24,
            max_monthly_cancellations: 3,
            created_at: Utc::now(),
        }
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn policy(&self) -> CancellationPolicy {
        CancellationPolicy {
            allow_client_cancellation: self.allow_client_cancellation,
            min_hours_notice: self.min_cancellation_hours,
            max_monthly_cancellations: self.max_monthly_cancellations,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CancellationPolicy {
    pub allow_client_cancellation: bool,
    pub min_hours_notice: i32,
    pub max_monthly_cancellations: i32,
}

/// Whether a client may book at a business, recomputed on every check.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BookingBlockStatus {
    pub allowed: bool,
    pub is_blocked: bool,
    pub cancellations_this_month: i64,
    pub max_allowed: i64,
    pub reason: Option<String>,
}
