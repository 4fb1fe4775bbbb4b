use std::sync::Arc;
use serde_json::Value;
use tera::{Context, Tera};
use crate::error::AppError;

/// Every email the platform sends, one per (lifecycle event, recipient role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailTemplate {
    NewBookingClient,
    NewBookingBusiness,
    CancellationClient,
    CancellationBusiness,
    NoShowClient,
    NoShowBusiness,
    ReminderClient,
    RescheduleClient,
    RescheduleBusiness,
}

impl EmailTemplate {
    pub const ALL: [EmailTemplate; 9] = [
        EmailTemplate::NewBookingClient,
        EmailTemplate::NewBookingBusiness,
        EmailTemplate::CancellationClient,
        EmailTemplate::CancellationBusiness,
        EmailTemplate::NoShowClient,
        EmailTemplate::NoShowBusiness,
        EmailTemplate::ReminderClient,
        EmailTemplate::RescheduleClient,
        EmailTemplate::RescheduleBusiness,
    ];

    /// Public name, used in `/emails/{kind}` and as the ledger template id.
    pub fn slug(&self) -> &'static str {
        match self {
            EmailTemplate::NewBookingClient => "new-booking",
            EmailTemplate::NewBookingBusiness => "new-booking-business",
            EmailTemplate::CancellationClient => "cancellation",
            EmailTemplate::CancellationBusiness => "cancellation-business",
            EmailTemplate::NoShowClient => "no-show",
            EmailTemplate::NoShowBusiness => "no-show-business",
            EmailTemplate::ReminderClient => "reminder",
            EmailTemplate::RescheduleClient => "reschedule",
            EmailTemplate::RescheduleBusiness => "reschedule-business",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.slug() == slug)
    }

    fn body_name(&self) -> &'static str {
        match self {
            EmailTemplate::NewBookingClient => "new_booking_client.html",
            EmailTemplate::NewBookingBusiness => "new_booking_business.html",
            EmailTemplate::CancellationClient => "cancellation_client.html",
            EmailTemplate::CancellationBusiness => "cancellation_business.html",
            EmailTemplate::NoShowClient => "no_show_client.html",
            EmailTemplate::NoShowBusiness => "no_show_business.html",
            EmailTemplate::ReminderClient => "reminder_client.html",
            EmailTemplate::RescheduleClient => "reschedule_client.html",
            EmailTemplate::RescheduleBusiness => "reschedule_business.html",
        }
    }

    fn body_source(&self) -> &'static str {
        match self {
            EmailTemplate::NewBookingClient => include_str!("../../../templates/email/new_booking_client.html"),
            EmailTemplate::NewBookingBusiness => include_str!("../../../templates/email/new_booking_business.html"),
            EmailTemplate::CancellationClient => include_str!("../../../templates/email/cancellation_client.html"),
            EmailTemplate::CancellationBusiness => include_str!("../../../templates/email/cancellation_business.html"),
            EmailTemplate::NoShowClient => include_str!("../../../templates/email/no_show_client.html"),
            EmailTemplate::NoShowBusiness => include_str!("../../../templates/email/no_show_business.html"),
            EmailTemplate::ReminderClient => include_str!("../../../templates/email/reminder_client.html"),
            EmailTemplate::RescheduleClient => include_str!("../../../templates/email/reschedule_client.html"),
            EmailTemplate::RescheduleBusiness => include_str!("../../../templates/email/reschedule_business.html"),
        }
    }

    // Subjects are plain text, so they are registered without an .html suffix to skip autoescaping.
    fn subject_source(&self) -> &'static str {
        match self {
            EmailTemplate::NewBookingClient => "Reserva registrada en {{ business_name | default(value=\"tu negocio\") }}",
            EmailTemplate::NewBookingBusiness => "Nueva cita: {{ client_name | default(value=\"cliente\") }} el {{ date | default(value=\"\") }}",
            EmailTemplate::CancellationClient => "Tu cita en {{ business_name | default(value=\"tu negocio\") }} ha sido cancelada",
            EmailTemplate::CancellationBusiness => "Cita cancelada: {{ client_name | default(value=\"cliente\") }} el {{ date | default(value=\"\") }}",
            EmailTemplate::NoShowClient => "No asististe a tu cita en {{ business_name | default(value=\"tu negocio\") }}",
            EmailTemplate::NoShowBusiness => "Inasistencia: {{ client_name | default(value=\"cliente\") }} el {{ date | default(value=\"\") }}",
            EmailTemplate::ReminderClient => "Recordatorio: tu cita en {{ business_name | default(value=\"tu negocio\") }}",
            EmailTemplate::RescheduleClient => "Tu cita en {{ business_name | default(value=\"tu negocio\") }} ha cambiado",
            EmailTemplate::RescheduleBusiness => "Cita reprogramada: {{ client_name | default(value=\"cliente\") }}",
        }
    }

    fn subject_name(&self) -> String {
        format!("{}.subject", self.slug())
    }
}

const PARTIALS: [(&str, &str); 3] = [
    ("_summary.html", include_str!("../../../templates/email/_summary.html")),
    ("_client_contact.html", include_str!("../../../templates/email/_client_contact.html")),
    ("_reschedule_changes.html", include_str!("../../../templates/email/_reschedule_changes.html")),
];

/// Compiles all bodies and subjects into one Tera instance. Run once at startup.
pub fn load_templates() -> Result<Tera, AppError> {
    let mut sources: Vec<(String, &'static str)> = PARTIALS
        .iter()
        .map(|(name, src)| (name.to_string(), *src))
        .collect();
    for template in EmailTemplate::ALL {
        sources.push((template.body_name().to_string(), template.body_source()));
        sources.push((template.subject_name(), template.subject_source()));
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(sources)
        .map_err(|e| AppError::Configuration(format!("Invalid email template: {}", e)))?;
    Ok(tera)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

#[derive(Clone)]
pub struct EmailRenderer {
    tera: Arc<Tera>,
}

impl EmailRenderer {
    pub fn new(tera: Arc<Tera>) -> Self {
        Self { tera }
    }

    pub fn render(&self, template: EmailTemplate, data: &Value) -> Result<RenderedEmail, AppError> {
        let context = Context::from_value(data.clone())
            .map_err(|_| AppError::Validation("Template data must be a JSON object".into()))?;

        let html = self.tera.render(template.body_name(), &context)
            .map_err(|e| AppError::Validation(format!("Could not render '{}' email: {}", template.slug(), e)))?;
        let subject = self.tera.render(&template.subject_name(), &context)
            .map_err(|e| AppError::Validation(format!("Could not render '{}' subject: {}", template.slug(), e)))?;

        Ok(RenderedEmail { subject: subject.trim().to_string(), html })
    }
}
