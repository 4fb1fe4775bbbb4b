use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use crate::domain::models::{
    appointment::Appointment,
    job::{EmailEvent, Job},
    reschedule::RescheduleChanges,
};
use crate::domain::ports::JobRepository;

pub const REMINDER_LEAD_HOURS: i64 = 24;

/// Queues an email fan-out for the worker. Runs after the authoritative write, so a
/// failure here is logged and otherwise ignored.
pub async fn enqueue_email(
    jobs: &dyn JobRepository,
    event: EmailEvent,
    appointment_id: &str,
    changes: Option<RescheduleChanges>,
    execute_at: DateTime<Utc>,
) -> Option<Job> {
    let job = Job::new(event, appointment_id.to_string(), changes, execute_at);
    match jobs.create(&job).await {
        Ok(created) => {
            info!(job_id = %created.id, job_type = %created.job_type, appointment_id, "Email job queued");
            Some(created)
        }
        Err(e) => {
            warn!(appointment_id, job_type = event.job_type(), "Failed to queue email job: {}", e);
            None
        }
    }
}

/// Queues the 24h reminder when that moment is still ahead of `now`.
pub async fn schedule_reminder(jobs: &dyn JobRepository, appointment: &Appointment, starts_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Job> {
    if appointment.is_walk_in() {
        return None;
    }
    let remind_at = starts_at? - Duration::hours(REMINDER_LEAD_HOURS);
    if remind_at <= now {
        return None;
    }
    enqueue_email(jobs, EmailEvent::Reminder, &appointment.id, None, remind_at).await
}

pub async fn drop_reminders(jobs: &dyn JobRepository, appointment_id: &str) {
    if let Err(e) = jobs.cancel_pending_reminders(appointment_id).await {
        warn!(appointment_id, "Failed to cancel pending reminders: {}", e);
    }
}
