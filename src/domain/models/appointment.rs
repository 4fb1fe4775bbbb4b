use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::FromRow;
use sqlx::types::Json;
use std::fmt;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed | AppointmentStatus::NoShow)
    }

    /// Cancelled and no-show appointments no longer hold their slot.
    pub fn releases_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceLine {
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Appointment {
    pub id: String,
    pub business_id: String,
    pub employee_id: String,
    pub client_id: Option<String>,
    pub walk_in_client_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub services: Json<Vec<ServiceLine>>,
    pub total_price_cents: i64,
    pub status: AppointmentStatus,
    /// Visible to the client.
    pub notes: Option<String>,
    /// Visible to the business only.
    pub internal_notes: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who the appointment is for. Registered clients and walk-ins are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRef {
    Registered(String),
    WalkIn(String),
}

pub struct NewAppointmentParams {
    pub business_id: String,
    pub employee_id: String,
    pub client: ClientRef,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub services: Vec<ServiceLine>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Appointment {
    pub fn new(params: NewAppointmentParams) -> Result<Self, AppError> {
        if params.end_time <= params.start_time {
            return Err(AppError::Validation("End time must be after start time".into()));
        }
        if params.status.is_terminal() {
            return Err(AppError::Validation(format!("Cannot create an appointment as {}", params.status)));
        }
        if params.services.iter().any(|s| s.price_cents < 0) {
            return Err(AppError::Validation("Service prices cannot be negative".into()));
        }

        let (client_id, walk_in_client_id) = match params.client {
            ClientRef::Registered(id) => (Some(id), None),
            ClientRef::WalkIn(id) => (None, Some(id)),
        };
        let total_price_cents = params.services.iter().map(|s| s.price_cents).sum();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            business_id: params.business_id,
            employee_id: params.employee_id,
            client_id,
            walk_in_client_id,
            date: params.date,
            start_time: params.start_time,
            end_time: params.end_time,
            services: Json(params.services),
            total_price_cents,
            status: params.status,
            notes: params.notes,
            internal_notes: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn client_ref(&self) -> Option<ClientRef> {
        match (&self.client_id, &self.walk_in_client_id) {
            (Some(id), _) => Some(ClientRef::Registered(id.clone())),
            (None, Some(id)) => Some(ClientRef::WalkIn(id.clone())),
            (None, None) => None,
        }
    }

    pub fn is_walk_in(&self) -> bool {
        self.client_id.is_none()
    }

    /// Wall-clock start in the business time zone, as an instant.
    pub fn starts_at(&self, tz: Tz) -> Option<DateTime<Utc>> {
        tz.from_local_datetime(&self.date.and_time(self.start_time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Same employee, same day, both holding their slot, and intervals intersect.
    pub fn conflicts_with(&self, other: &Appointment) -> bool {
        self.id != other.id
            && self.employee_id == other.employee_id
            && self.date == other.date
            && !self.status.releases_slot()
            && !other.status.releases_slot()
            && intervals_overlap(self.start_time, self.end_time, other.start_time, other.end_time)
    }
}

/// Half-open `[start, end)` comparison: touching intervals do not overlap.
pub fn intervals_overlap(start_a: NaiveTime, end_a: NaiveTime, start_b: NaiveTime, end_b: NaiveTime) -> bool {
    start_a < end_b && start_b < end_a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn params(start: NaiveTime, end: NaiveTime) -> NewAppointmentParams {
        NewAppointmentParams {
            business_id: "biz".into(),
            employee_id: "emp".into(),
            client: ClientRef::Registered("client".into()),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: start,
            end_time: end,
            services: vec![
                ServiceLine { name: "Corte".into(), price_cents: 1500 },
                ServiceLine { name: "Barba".into(), price_cents: 800 },
            ],
            status: AppointmentStatus::Pending,
            notes: None,
        }
    }

    #[test]
    fn rejects_end_not_after_start() {
        assert!(Appointment::new(params(t(10, 0), t(10, 0))).is_err());
        assert!(Appointment::new(params(t(11, 0), t(10, 0))).is_err());
    }

    #[test]
    fn total_is_sum_of_service_lines() {
        let appt = Appointment::new(params(t(10, 0), t(11, 0))).unwrap();
        assert_eq!(appt.total_price_cents, 2300);
        assert_eq!(appt.client_ref(), Some(ClientRef::Registered("client".into())));
        assert!(appt.walk_in_client_id.is_none());
    }

    #[test]
    fn half_open_intervals() {
        assert!(intervals_overlap(t(10, 0), t(11, 0), t(10, 30), t(11, 30)));
        assert!(!intervals_overlap(t(10, 0), t(11, 0), t(11, 0), t(12, 0)));
        assert!(intervals_overlap(t(9, 0), t(12, 0), t(10, 0), t(10, 15)));
    }

    #[test]
    fn released_slots_do_not_conflict() {
        let a = Appointment::new(params(t(10, 0), t(11, 0))).unwrap();
        let mut b = Appointment::new(params(t(10, 30), t(11, 30))).unwrap();
        assert!(a.conflicts_with(&b));

        b.status = AppointmentStatus::Cancelled;
        assert!(!a.conflicts_with(&b));
        b.status = AppointmentStatus::NoShow;
        assert!(!a.conflicts_with(&b));
        b.status = AppointmentStatus::Completed;
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        use AppointmentStatus::*;
        let all = [Pending, Confirmed, InProgress, Completed, Cancelled, NoShow];
        for from in [Completed, Cancelled, NoShow] {
            assert!(from.is_terminal());
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
        assert!(!Pending.can_transition_to(NoShow));
        assert!(!InProgress.can_transition_to(Cancelled));
    }
}
