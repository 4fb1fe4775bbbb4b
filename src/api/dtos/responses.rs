use serde::Serialize;
use crate::domain::models::{appointment::Appointment, business::CancellationPolicy};
use crate::domain::services::email_dispatch::DispatchReport;

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub success: bool,
    pub appointment: Appointment,
}

impl AppointmentResponse {
    pub fn ok(appointment: Appointment) -> Self {
        Self { success: true, appointment }
    }
}

#[derive(Serialize)]
pub struct CanCancelResponse {
    pub allowed: bool,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct PolicyResponse {
    pub business_id: String,
    pub policy: CancellationPolicy,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct MarkedReadResponse {
    pub success: bool,
    pub updated: u64,
}

#[derive(Serialize)]
pub struct RescheduleNotificationResponse {
    pub success: bool,
    pub details: DispatchReport,
}

#[derive(Serialize)]
pub struct SentEmail {
    pub to: String,
    pub template: String,
    pub subject: String,
}

#[derive(Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub data: SentEmail,
}
