use std::sync::Arc;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;
use crate::domain::models::{
    actor::Actor,
    appointment::{Appointment, AppointmentStatus},
    business::{Business, BookingBlockStatus, CancellationPolicy},
};
use crate::domain::ports::{AppointmentRepository, PolicyRepository};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allowed,
    Denied(String),
}

impl PolicyVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyVerdict::Allowed)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            PolicyVerdict::Allowed => Ok(()),
            PolicyVerdict::Denied(reason) => Err(AppError::PolicyDenied(reason)),
        }
    }
}

/// Client-initiated cancellation rules, first failing rule wins.
pub fn can_client_cancel(appointment: &Appointment, policy: &CancellationPolicy, tz: Tz, now: DateTime<Utc>) -> PolicyVerdict {
    if !policy.allow_client_cancellation {
        return PolicyVerdict::Denied("Cancellation is not permitted by business".into());
    }

    if appointment.status == AppointmentStatus::Cancelled {
        return PolicyVerdict::Denied("Appointment is already cancelled".into());
    }
    if appointment.status.is_terminal() {
        return PolicyVerdict::Denied(format!("Appointment is already {}", appointment.status));
    }

    let Some(starts_at) = appointment.starts_at(tz) else {
        return PolicyVerdict::Denied("Appointment start time does not exist in the business time zone".into());
    };

    let remaining = starts_at - now;
    if remaining < chrono::Duration::hours(policy.min_hours_notice as i64) {
        return PolicyVerdict::Denied(format!(
            "Cancellations require at least {} hours notice",
            policy.min_hours_notice
        ));
    }

    PolicyVerdict::Allowed
}

/// Blocked once the month's cancellation count reaches the maximum.
pub fn evaluate_booking_block(cancellations_this_month: i64, max_allowed: i64) -> BookingBlockStatus {
    let is_blocked = cancellations_this_month >= max_allowed;
    let reason = is_blocked.then(|| format!(
        "You have cancelled {} appointments this month at this business (maximum {}). Booking is blocked until next month.",
        cancellations_this_month, max_allowed
    ));

    BookingBlockStatus {
        allowed: !is_blocked,
        is_blocked,
        cancellations_this_month,
        max_allowed,
        reason,
    }
}

/// First day of the current calendar month at 00:00 business-local time.
pub fn month_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0));

    first
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Cheap authorization pre-flight, independent of the cancellation policy.
pub fn can_cancel(appointment: &Appointment, business: &Business, actor: &Actor) -> Result<(), AppError> {
    authorize(appointment, business, actor)?;
    if appointment.status.is_terminal() {
        return Err(AppError::Conflict(format!("Appointment is already {}", appointment.status)));
    }
    Ok(())
}

/// Clients act only on their own appointments, owners only within their business.
pub fn authorize(appointment: &Appointment, business: &Business, actor: &Actor) -> Result<(), AppError> {
    if appointment.business_id != business.id {
        return Err(AppError::InternalWithMsg(format!(
            "Appointment {} loaded with business {} instead of {}",
            appointment.id, business.id, appointment.business_id
        )));
    }
    let owns = match actor {
        Actor::Client(id) => appointment.client_id.as_deref() == Some(id.as_str()),
        Actor::BusinessOwner(id) => business.is_owned_by(id),
    };
    if owns {
        Ok(())
    } else {
        Err(AppError::Forbidden("You do not have access to this appointment".into()))
    }
}

pub struct PolicyService {
    appointments: Arc<dyn AppointmentRepository>,
    businesses: Arc<dyn PolicyRepository>,
    default_max_monthly_cancellations: i32,
}

impl PolicyService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        businesses: Arc<dyn PolicyRepository>,
        default_max_monthly_cancellations: i32,
    ) -> Self {
        Self { appointments, businesses, default_max_monthly_cancellations }
    }

    /// Stores a new business with the configured default threshold. Later edits,
    /// including 0, are taken as they are.
    pub async fn register_business(&self, mut business: Business) -> Result<Business, AppError> {
        business.max_monthly_cancellations = self.default_max_monthly_cancellations;
        self.businesses.create_business(&business).await
    }

    /// Recomputed on every call so the latest cancellation is always reflected.
    pub async fn check_client_booking_allowed(&self, client_id: &str, business_id: &str, now: DateTime<Utc>) -> Result<BookingBlockStatus, AppError> {
        let business = self.businesses.find_business(business_id).await?
            .ok_or(AppError::NotFound(format!("Business {} not found", business_id)))?;
        self.booking_block_for(client_id, &business, now).await
    }

    pub async fn booking_block_for(&self, client_id: &str, business: &Business, now: DateTime<Utc>) -> Result<BookingBlockStatus, AppError> {
        let since = month_start(now, business.tz());
        let count = self.appointments.count_client_cancellations(client_id, &business.id, since).await?;

        let max = business.max_monthly_cancellations;

        let status = evaluate_booking_block(count, max as i64);
        debug!(client_id, business_id = %business.id, count, max, blocked = status.is_blocked, "Evaluated booking block");
        Ok(status)
    }
}
