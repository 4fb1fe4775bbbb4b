use std::sync::Arc;
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};
use crate::domain::models::{
    actor::Actor,
    appointment::{Appointment, AppointmentStatus, ClientRef, NewAppointmentParams, ServiceLine},
    business::Business,
    directory::{Employee, WalkInClient},
    job::EmailEvent,
    notification::NotificationType,
    reschedule::RescheduleChanges,
};
use crate::domain::ports::{AppointmentRepository, DirectoryRepository, JobRepository, PolicyRepository};
use crate::domain::services::{
    lifecycle,
    notification_service::NotificationService,
    outbox,
    policy::{self, PolicyService},
};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub enum BookingClient {
    Registered(String),
    WalkIn { full_name: String, phone: Option<String> },
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub employee_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub services: Vec<ServiceLine>,
    /// Required for owners; clients always book for themselves.
    pub client: Option<BookingClient>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub employee_id: Option<String>,
}

pub struct BookingService {
    appointments: Arc<dyn AppointmentRepository>,
    businesses: Arc<dyn PolicyRepository>,
    directory: Arc<dyn DirectoryRepository>,
    jobs: Arc<dyn JobRepository>,
    notifications: NotificationService,
    policy: Arc<PolicyService>,
}

impl BookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        businesses: Arc<dyn PolicyRepository>,
        directory: Arc<dyn DirectoryRepository>,
        jobs: Arc<dyn JobRepository>,
        notifications: NotificationService,
        policy: Arc<PolicyService>,
    ) -> Self {
        Self { appointments, businesses, directory, jobs, notifications, policy }
    }

    pub async fn book(&self, business_id: &str, actor: &Actor, request: NewBooking) -> Result<Appointment, AppError> {
        let now = Utc::now();
        let business = self.businesses.find_business(business_id).await?
            .ok_or(AppError::NotFound(format!("Business {} not found", business_id)))?;
        self.employee_of(&business, &request.employee_id).await?;

        if request.end_time <= request.start_time {
            return Err(AppError::Validation("End time must be after start time".into()));
        }

        let (client, status) = match actor {
            Actor::Client(client_id) => {
                if let Some(BookingClient::Registered(other)) = &request.client && other != client_id {
                    return Err(AppError::Forbidden("Clients can only book for themselves".into()));
                }
                if matches!(request.client, Some(BookingClient::WalkIn { .. })) {
                    return Err(AppError::Forbidden("Only the business can book walk-in clients".into()));
                }

                let block = self.policy.booking_block_for(client_id, &business, now).await?;
                if block.is_blocked {
                    info!(client_id = %client_id, business_id, count = block.cancellations_this_month, "Booking blocked");
                    return Err(AppError::PolicyDenied(block.reason.unwrap_or_else(|| "Booking is blocked".into())));
                }
                (ClientRef::Registered(client_id.clone()), AppointmentStatus::Pending)
            }
            Actor::BusinessOwner(owner_id) => {
                if !business.is_owned_by(owner_id) {
                    return Err(AppError::Forbidden("You do not manage this business".into()));
                }
                let client = match &request.client {
                    Some(BookingClient::Registered(client_id)) => {
                        self.directory.find_profile(client_id).await?
                            .ok_or(AppError::NotFound("Client not found".into()))?;
                        ClientRef::Registered(client_id.clone())
                    }
                    Some(BookingClient::WalkIn { full_name, phone }) => {
                        self.ensure_slot_free(&request.employee_id, request.date, request.start_time, request.end_time).await?;
                        let walk_in = WalkInClient::new(business.id.clone(), full_name.clone(), phone.clone());
                        let walk_in = self.directory.create_walk_in(&walk_in).await?;
                        ClientRef::WalkIn(walk_in.id)
                    }
                    None => return Err(AppError::Validation("A client or walk-in is required".into())),
                };
                (client, AppointmentStatus::Confirmed)
            }
        };

        let appointment = Appointment::new(NewAppointmentParams {
            business_id: business.id.clone(),
            employee_id: request.employee_id,
            client,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            services: request.services,
            status,
            notes: request.notes,
        })?;

        let created = self.appointments.create_if_slot_free(&appointment).await?;
        info!(appointment_id = %created.id, business_id, status = %created.status, "Appointment booked");

        self.after_booking(&created, &business, actor, now).await;
        Ok(created)
    }

    async fn after_booking(&self, appointment: &Appointment, business: &Business, actor: &Actor, now: chrono::DateTime<Utc>) {
        let when = describe_slot(appointment);
        match (actor, appointment.client_id.as_deref()) {
            (Actor::Client(_), _) => {
                self.notifications.notify(
                    &business.owner_id,
                    NotificationType::NewAppointment,
                    "Nueva cita",
                    &format!("Tienes una nueva cita el {}.", when),
                    Some(&appointment.id),
                ).await;
            }
            (Actor::BusinessOwner(_), Some(client_id)) => {
                self.notifications.notify(
                    client_id,
                    NotificationType::Confirmed,
                    "Cita confirmada",
                    &format!("{} ha confirmado tu cita del {}.", business.name, when),
                    Some(&appointment.id),
                ).await;
            }
            (Actor::BusinessOwner(_), None) => {}
        }

        outbox::enqueue_email(self.jobs.as_ref(), EmailEvent::NewBooking, &appointment.id, None, now).await;
        outbox::schedule_reminder(self.jobs.as_ref(), appointment, appointment.starts_at(business.tz()), now).await;
    }

    /// Business-driven moves: confirm, start, complete, no-show.
    pub async fn transition(&self, appointment_id: &str, actor: &Actor, next: AppointmentStatus) -> Result<Appointment, AppError> {
        let Actor::BusinessOwner(_) = actor else {
            return Err(AppError::Forbidden("Only the business can change the appointment status".into()));
        };
        let now = Utc::now();
        let (appointment, business) = self.load(appointment_id).await?;
        policy::authorize(&appointment, &business, actor)?;

        let updated = lifecycle::apply_transition(&appointment, next, now)?;
        let stored = self.appointments.update_status(&updated, appointment.status).await?
            .ok_or_else(|| AppError::Conflict("Appointment was changed by someone else; reload and try again".into()))?;
        info!(appointment_id, from = %appointment.status, to = %stored.status, "Appointment status changed");

        if stored.status == AppointmentStatus::Confirmed && let Some(client_id) = stored.client_id.as_deref() {
            self.notifications.notify(
                client_id,
                NotificationType::Confirmed,
                "Cita confirmada",
                &format!("{} ha confirmado tu cita del {}.", business.name, describe_slot(&stored)),
                Some(&stored.id),
            ).await;
        }
        if stored.status == AppointmentStatus::NoShow {
            outbox::enqueue_email(self.jobs.as_ref(), EmailEvent::NoShow, &stored.id, None, now).await;
        }
        if stored.status.is_terminal() {
            outbox::drop_reminders(self.jobs.as_ref(), &stored.id).await;
        }
        Ok(stored)
    }

    /// Moves the appointment to a new slot. For clients a move gives up the old slot,
    /// so it is held to the same policy as a cancellation.
    pub async fn reschedule(&self, appointment_id: &str, actor: &Actor, schedule: NewSchedule) -> Result<Appointment, AppError> {
        let now = Utc::now();
        let (appointment, business) = self.load(appointment_id).await?;
        policy::can_cancel(&appointment, &business, actor)?;

        if let Actor::Client(_) = actor {
            policy::can_client_cancel(&appointment, &business.policy(), business.tz(), now).into_result()?;
        }
        if schedule.end_time <= schedule.start_time {
            return Err(AppError::Validation("End time must be after start time".into()));
        }

        let employee_id = schedule.employee_id.unwrap_or_else(|| appointment.employee_id.clone());
        if employee_id != appointment.employee_id {
            self.employee_of(&business, &employee_id).await?;
        }

        let mut moved = appointment.clone();
        moved.date = schedule.date;
        moved.start_time = schedule.start_time;
        moved.end_time = schedule.end_time;
        moved.employee_id = employee_id;
        moved.updated_at = now;

        if moved.date == appointment.date
            && moved.start_time == appointment.start_time
            && moved.end_time == appointment.end_time
            && moved.employee_id == appointment.employee_id
        {
            debug!(appointment_id, "Reschedule without changes");
            return Ok(appointment);
        }

        let stored = self.appointments.update_schedule(&moved, appointment.status).await?;
        info!(appointment_id, actor = actor.role(), "Appointment rescheduled");

        let changes = RescheduleChanges::from_previous(&appointment);
        let when = describe_slot(&stored);
        match actor {
            Actor::Client(_) => {
                self.notifications.notify(
                    &business.owner_id,
                    NotificationType::ModifiedByClient,
                    "Cita modificada por el cliente",
                    &format!("Un cliente ha movido su cita al {}.", when),
                    Some(&stored.id),
                ).await;
            }
            Actor::BusinessOwner(_) => {
                if let Some(client_id) = stored.client_id.as_deref() {
                    self.notifications.notify(
                        client_id,
                        NotificationType::Rescheduled,
                        "Cita reprogramada",
                        &format!("{} ha cambiado tu cita al {}.", business.name, when),
                        Some(&stored.id),
                    ).await;
                }
            }
        }

        outbox::drop_reminders(self.jobs.as_ref(), &stored.id).await;
        outbox::schedule_reminder(self.jobs.as_ref(), &stored, stored.starts_at(business.tz()), now).await;
        outbox::enqueue_email(self.jobs.as_ref(), EmailEvent::Reschedule, &stored.id, Some(changes), now).await;
        Ok(stored)
    }

    /// Read access for the appointment's client or its business owner.
    pub async fn find_for(&self, appointment_id: &str, actor: &Actor) -> Result<Appointment, AppError> {
        let (appointment, business) = self.load(appointment_id).await?;
        policy::authorize(&appointment, &business, actor)?;
        Ok(appointment)
    }

    async fn load(&self, appointment_id: &str) -> Result<(Appointment, Business), AppError> {
        let appointment = self.appointments.find_by_id(appointment_id).await?
            .ok_or(AppError::NotFound("Appointment not found".into()))?;
        let business = self.businesses.find_business(&appointment.business_id).await?
            .ok_or(AppError::Internal)?;
        Ok((appointment, business))
    }

    async fn employee_of(&self, business: &Business, employee_id: &str) -> Result<Employee, AppError> {
        let employee = self.directory.find_employee(employee_id).await?
            .ok_or(AppError::NotFound("Employee not found".into()))?;
        if employee.business_id != business.id {
            return Err(AppError::Validation("Employee does not belong to this business".into()));
        }
        Ok(employee)
    }

    async fn ensure_slot_free(&self, employee_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<(), AppError> {
        let overlapping = self.appointments.find_overlapping(employee_id, date, start, end).await?;
        if overlapping.is_empty() {
            Ok(())
        } else {
            Err(AppError::SlotUnavailable)
        }
    }
}

fn describe_slot(appointment: &Appointment) -> String {
    format!("{} a las {}", appointment.date.format("%d/%m/%Y"), appointment.start_time.format("%H:%M"))
}
