use std::sync::Arc;
use chrono::Utc;
use tracing::info;
use crate::domain::models::{
    actor::Actor,
    appointment::Appointment,
    business::Business,
    job::EmailEvent,
    notification::NotificationType,
};
use crate::domain::ports::{AppointmentRepository, JobRepository, PolicyRepository};
use crate::domain::services::{
    lifecycle,
    notification_service::NotificationService,
    outbox,
    policy::{self, PolicyVerdict},
};
use crate::error::AppError;

/// Client- and business-initiated cancellation. Only the status write can fail the
/// operation; notification and email side effects are best-effort.
pub struct CancellationService {
    appointments: Arc<dyn AppointmentRepository>,
    businesses: Arc<dyn PolicyRepository>,
    jobs: Arc<dyn JobRepository>,
    notifications: NotificationService,
}

impl CancellationService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        businesses: Arc<dyn PolicyRepository>,
        jobs: Arc<dyn JobRepository>,
        notifications: NotificationService,
    ) -> Self {
        Self { appointments, businesses, jobs, notifications }
    }

    /// Ownership + non-terminal pre-flight, then the cancellation policy for clients.
    pub async fn can_cancel(&self, appointment_id: &str, actor: &Actor) -> Result<PolicyVerdict, AppError> {
        let (appointment, business) = self.load(appointment_id).await?;
        policy::can_cancel(&appointment, &business, actor)?;

        Ok(match actor {
            Actor::Client(_) => policy::can_client_cancel(&appointment, &business.policy(), business.tz(), Utc::now()),
            Actor::BusinessOwner(_) => PolicyVerdict::Allowed,
        })
    }

    pub async fn cancel(&self, appointment_id: &str, actor: &Actor, reason: Option<&str>) -> Result<Appointment, AppError> {
        let now = Utc::now();
        let (appointment, business) = self.load(appointment_id).await?;
        policy::authorize(&appointment, &business, actor)?;

        if let Actor::Client(client_id) = actor {
            let verdict = policy::can_client_cancel(&appointment, &business.policy(), business.tz(), now);
            if let PolicyVerdict::Denied(why) = &verdict {
                info!(appointment_id, client_id = %client_id, reason = %why, "Client cancellation denied");
            }
            verdict.into_result()?;
        }

        let updated = lifecycle::apply_cancellation(&appointment, actor, reason, now)?;
        let cancelled = self.appointments.update_status(&updated, appointment.status).await?
            .ok_or_else(|| AppError::Conflict("Appointment was changed by someone else; reload and try again".into()))?;

        info!(appointment_id, actor = actor.role(), actor_id = actor.id(), "Appointment cancelled");

        self.after_cancellation(&cancelled, &business, actor).await;
        Ok(cancelled)
    }

    async fn after_cancellation(&self, appointment: &Appointment, business: &Business, actor: &Actor) {
        outbox::drop_reminders(self.jobs.as_ref(), &appointment.id).await;

        let when = format!("{} a las {}", appointment.date.format("%d/%m/%Y"), appointment.start_time.format("%H:%M"));
        match actor {
            Actor::Client(_) => {
                self.notifications.notify(
                    &business.owner_id,
                    NotificationType::CancelledByClient,
                    "Cita cancelada por el cliente",
                    &format!("Un cliente ha cancelado su cita del {}.", when),
                    Some(&appointment.id),
                ).await;
            }
            Actor::BusinessOwner(_) => {
                if let Some(client_id) = appointment.client_id.as_deref() {
                    self.notifications.notify(
                        client_id,
                        NotificationType::CancelledByBusiness,
                        "Cita cancelada",
                        &format!("{} ha cancelado tu cita del {}.", business.name, when),
                        Some(&appointment.id),
                    ).await;
                }
            }
        }

        outbox::enqueue_email(self.jobs.as_ref(), EmailEvent::Cancellation, &appointment.id, None, Utc::now()).await;
    }

    async fn load(&self, appointment_id: &str) -> Result<(Appointment, Business), AppError> {
        let appointment = self.appointments.find_by_id(appointment_id).await?
            .ok_or(AppError::NotFound("Appointment not found".into()))?;
        let business = self.businesses.find_business(&appointment.business_id).await?
            .ok_or(AppError::Internal)?;
        Ok((appointment, business))
    }
}
