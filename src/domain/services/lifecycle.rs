use chrono::{DateTime, Utc};
use crate::domain::models::{
    actor::Actor,
    appointment::{Appointment, AppointmentStatus},
};
use crate::error::AppError;

pub const NOTE_SEPARATOR: &str = "\n---\n";

/// Marks the appointment cancelled by `actor`. Policy must already have approved;
/// this only refuses terminal appointments.
pub fn apply_cancellation(appointment: &Appointment, actor: &Actor, reason: Option<&str>, now: DateTime<Utc>) -> Result<Appointment, AppError> {
    ensure_transition(appointment, AppointmentStatus::Cancelled)?;

    let mut updated = appointment.clone();
    updated.status = AppointmentStatus::Cancelled;
    updated.cancelled_by = Some(actor.id().to_string());
    updated.cancelled_at = Some(now);
    updated.updated_at = now;

    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        match actor {
            Actor::Client(_) => {
                let entry = format!("Motivo de cancelación (cliente): {}", reason);
                updated.notes = Some(append_note(appointment.notes.as_deref(), &entry));
            }
            Actor::BusinessOwner(_) => {
                let entry = format!("Motivo de cancelación (negocio): {}", reason);
                updated.internal_notes = Some(append_note(appointment.internal_notes.as_deref(), &entry));
            }
        }
    }

    Ok(updated)
}

/// Business/system-driven moves along the happy path plus no-show.
pub fn apply_transition(appointment: &Appointment, next: AppointmentStatus, now: DateTime<Utc>) -> Result<Appointment, AppError> {
    if next == AppointmentStatus::Cancelled {
        return Err(AppError::Validation("Use the cancellation endpoints to cancel an appointment".into()));
    }
    ensure_transition(appointment, next)?;

    let mut updated = appointment.clone();
    updated.status = next;
    updated.updated_at = now;
    Ok(updated)
}

fn ensure_transition(appointment: &Appointment, next: AppointmentStatus) -> Result<(), AppError> {
    let current = appointment.status;
    if current.is_terminal() {
        return Err(AppError::Conflict(format!("Appointment is already {}", current)));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!("Cannot move appointment from {} to {}", current, next)));
    }
    Ok(())
}

fn append_note(existing: Option<&str>, entry: &str) -> String {
    match existing.filter(|n| !n.trim().is_empty()) {
        Some(prior) => format!("{}{}{}", prior, NOTE_SEPARATOR, entry),
        None => entry.to_string(),
    }
}
