use std::sync::Arc;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::domain::models::{
    appointment::Appointment,
    directory::{Employee, Profile},
    job::EmailEvent,
    mail_log::{MailLog, MAIL_SENT, MAIL_SKIPPED_DUPLICATE},
    reschedule::{RescheduleChanges, RescheduleDiff},
};
use crate::domain::ports::{AppointmentRepository, DirectoryRepository, EmailService, MailLogRepository, PolicyRepository};
use crate::domain::services::templates::{EmailRenderer, EmailTemplate};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Failed,
    Skipped,
}

/// Per-recipient outcome of one fan-out. Feeds logs and retries, never the caller's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub client_email: SendStatus,
    pub business_email: SendStatus,
}

impl DispatchReport {
    fn uniform(status: SendStatus) -> Self {
        Self { client_email: status, business_email: status }
    }

    pub fn has_failures(&self) -> bool {
        self.client_email == SendStatus::Failed || self.business_email == SendStatus::Failed
    }
}

struct Recipient<'a> {
    template: EmailTemplate,
    address: Option<&'a str>,
    context: Value,
}

pub struct EmailDispatcher {
    appointments: Arc<dyn AppointmentRepository>,
    businesses: Arc<dyn PolicyRepository>,
    directory: Arc<dyn DirectoryRepository>,
    mail_logs: Arc<dyn MailLogRepository>,
    email_service: Arc<dyn EmailService>,
    renderer: EmailRenderer,
    frontend_url: String,
}

impl EmailDispatcher {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        businesses: Arc<dyn PolicyRepository>,
        directory: Arc<dyn DirectoryRepository>,
        mail_logs: Arc<dyn MailLogRepository>,
        email_service: Arc<dyn EmailService>,
        renderer: EmailRenderer,
        frontend_url: String,
    ) -> Self {
        Self { appointments, businesses, directory, mail_logs, email_service, renderer, frontend_url }
    }

    /// Sends the client and business emails for `event`. Never fails: problems loading
    /// the appointment show up as `Failed` for both recipients.
    pub async fn dispatch(
        &self,
        event: EmailEvent,
        appointment_id: &str,
        changes: Option<&RescheduleChanges>,
        job_id: Option<&str>,
    ) -> DispatchReport {
        let report = match self.try_dispatch(event, appointment_id, changes, job_id).await {
            Ok(report) => report,
            Err(e) => {
                error!(appointment_id, ?event, "Email dispatch aborted: {}", e);
                DispatchReport::uniform(SendStatus::Failed)
            }
        };
        info!(appointment_id, ?event, client = ?report.client_email, business = ?report.business_email, "Email dispatch finished");
        report
    }

    async fn try_dispatch(
        &self,
        event: EmailEvent,
        appointment_id: &str,
        changes: Option<&RescheduleChanges>,
        job_id: Option<&str>,
    ) -> Result<DispatchReport, AppError> {
        // Always the stored state, never caller-supplied values.
        let appointment = self.appointments.find_by_id(appointment_id).await?
            .ok_or(AppError::NotFound(format!("Appointment {} not found", appointment_id)))?;

        let Some(client_id) = appointment.client_id.as_deref() else {
            debug!(appointment_id, "Walk-in appointment, no email to send");
            return Ok(DispatchReport::uniform(SendStatus::Skipped));
        };
        if event == EmailEvent::Reminder && appointment.status.is_terminal() {
            debug!(appointment_id, status = %appointment.status, "Reminder for finished appointment dropped");
            return Ok(DispatchReport::uniform(SendStatus::Skipped));
        }

        let business = self.businesses.find_business(&appointment.business_id).await?
            .ok_or(AppError::NotFound("Business not found".into()))?;
        let employee = self.directory.find_employee(&appointment.employee_id).await?
            .ok_or(AppError::NotFound("Employee not found".into()))?;
        let client = self.directory.find_profile(client_id).await?;
        let owner = self.directory.find_profile(&business.owner_id).await?;

        let mut base = json!({
            "business_name": business.name,
            "employee_name": employee.full_name,
            "date": appointment.date.format("%d/%m/%Y").to_string(),
            "start_time": appointment.start_time.format("%H:%M").to_string(),
            "end_time": appointment.end_time.format("%H:%M").to_string(),
            "services": appointment.services.0.iter()
                .map(|s| json!({ "name": s.name, "price": format_price(s.price_cents) }))
                .collect::<Vec<_>>(),
            "total_price": format_price(appointment.total_price_cents),
            "manage_link": format!("{}/appointments/{}", self.frontend_url, appointment.id),
            "booking_link": format!("{}/businesses/{}", self.frontend_url, business.id),
            "cancelled_by_business": appointment.cancelled_by.as_deref().is_some_and(|by| by != client_id),
        });
        if event == EmailEvent::Reschedule {
            let diff = self.reschedule_diff(changes, &appointment, &employee).await;
            merge(&mut base, reschedule_context(&diff));
        }

        let (client_template, business_template) = templates_for(event);
        // Retries of one job share its id; anything else is a distinct event and gets a fresh key.
        let dispatch_key = job_id.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut client_context = base.clone();
        merge(&mut client_context, json!({
            "user_name": client.as_ref().map(|c| c.full_name.as_str()).unwrap_or_default(),
        }));

        let mut business_context = base;
        merge(&mut business_context, json!({
            "user_name": owner.as_ref().map(|o| o.full_name.as_str()).unwrap_or_default(),
            "client_name": client.as_ref().map(|c| c.full_name.as_str()).unwrap_or_default(),
            "client_email": client.as_ref().and_then(|c| c.email.as_deref()).unwrap_or_default(),
            "client_phone": client.as_ref().and_then(|c| c.phone.as_deref()).unwrap_or_default(),
        }));

        let client_send = async {
            match client_template {
                Some(template) => self.send_one(Recipient {
                    template,
                    address: email_of(client.as_ref()),
                    context: client_context,
                }, job_id, &dispatch_key).await,
                None => SendStatus::Skipped,
            }
        };
        let business_send = async {
            match business_template {
                Some(template) => self.send_one(Recipient {
                    template,
                    address: email_of(owner.as_ref()),
                    context: business_context,
                }, job_id, &dispatch_key).await,
                None => SendStatus::Skipped,
            }
        };

        // Independent: one side failing never stops the other.
        let (client_email, business_email) = tokio::join!(client_send, business_send);
        Ok(DispatchReport { client_email, business_email })
    }

    async fn reschedule_diff(&self, changes: Option<&RescheduleChanges>, current: &Appointment, employee: &Employee) -> RescheduleDiff {
        let changes = changes.cloned().unwrap_or_default();
        let old_employee = match changes.old_employee_id.as_deref() {
            Some(old_id) if changes.employee_changed(current) => {
                self.directory.find_employee(old_id).await.unwrap_or_else(|e| {
                    warn!(old_id, "Could not load previous employee: {}", e);
                    None
                })
            }
            _ => None,
        };
        RescheduleDiff::compute(&changes, current, employee, old_employee.as_ref())
    }

    async fn send_one(&self, recipient: Recipient<'_>, job_id: Option<&str>, dispatch_key: &str) -> SendStatus {
        let template_id = recipient.template.slug();
        let Some(address) = recipient.address else {
            debug!(template_id, "Recipient has no email address");
            return SendStatus::Skipped;
        };

        let hash = context_hash(template_id, dispatch_key, &recipient.context);
        match self.mail_logs.has_mail_been_sent(address, template_id, &hash).await {
            Ok(true) => {
                info!(recipient = address, template_id, "Already sent, skipping duplicate");
                let log = MailLog::new(job_id, address, template_id, hash, MAIL_SKIPPED_DUPLICATE);
                if let Err(e) = self.mail_logs.log_mail(&log).await {
                    warn!("Failed to record skipped duplicate: {}", e);
                }
                return SendStatus::Sent;
            }
            Ok(false) => {}
            Err(e) => warn!(template_id, "Mail ledger unavailable, sending anyway: {}", e),
        }

        let rendered = match self.renderer.render(recipient.template, &recipient.context) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(template_id, "Failed to render email: {}", e);
                return SendStatus::Failed;
            }
        };

        match self.email_service.send(address, &rendered.subject, &rendered.html).await {
            Ok(()) => {
                let log = MailLog::new(job_id, address, template_id, hash, MAIL_SENT);
                if let Err(e) = self.mail_logs.log_mail(&log).await {
                    warn!(template_id, "Email sent but ledger write failed: {}", e);
                }
                SendStatus::Sent
            }
            Err(e) => {
                warn!(recipient = address, template_id, "Email send failed: {}", e);
                SendStatus::Failed
            }
        }
    }
}

fn templates_for(event: EmailEvent) -> (Option<EmailTemplate>, Option<EmailTemplate>) {
    match event {
        EmailEvent::NewBooking => (Some(EmailTemplate::NewBookingClient), Some(EmailTemplate::NewBookingBusiness)),
        EmailEvent::Cancellation => (Some(EmailTemplate::CancellationClient), Some(EmailTemplate::CancellationBusiness)),
        EmailEvent::NoShow => (Some(EmailTemplate::NoShowClient), Some(EmailTemplate::NoShowBusiness)),
        EmailEvent::Reminder => (Some(EmailTemplate::ReminderClient), None),
        EmailEvent::Reschedule => (Some(EmailTemplate::RescheduleClient), Some(EmailTemplate::RescheduleBusiness)),
    }
}

fn reschedule_context(diff: &RescheduleDiff) -> Value {
    let block = |s: &crate::domain::models::reschedule::SlotSnapshot| json!({
        "date": s.date.format("%d/%m/%Y").to_string(),
        "start_time": s.start_time.format("%H:%M").to_string(),
        "end_time": s.end_time.format("%H:%M").to_string(),
        "employee_name": s.employee_name,
    });
    json!({
        "date_changed": diff.date_changed,
        "time_changed": diff.time_changed,
        "employee_changed": diff.employee_changed,
        "old": block(&diff.old),
        "new": block(&diff.new),
    })
}

fn email_of(profile: Option<&Profile>) -> Option<&str> {
    profile
        .and_then(|p| p.email.as_deref())
        .filter(|e| !e.trim().is_empty())
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}

/// Ledger key for one (event, template, rendered context). Identical content sent for
/// two different events hashes differently.
pub fn context_hash(template_id: &str, dispatch_key: &str, context: &Value) -> String {
    let context_json = serde_json::to_string(context).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(template_id.as_bytes());
    hasher.update(dispatch_key.as_bytes());
    hasher.update(context_json.as_bytes());
    hex::encode(hasher.finalize())
}

fn format_price(cents: i64) -> String {
    format!("{}.{:02} €", cents / 100, cents % 100)
}
