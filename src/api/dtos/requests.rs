use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use crate::domain::models::{appointment::{AppointmentStatus, ServiceLine}, reschedule::RescheduleChanges};

#[derive(Deserialize)]
pub struct WalkInRequest {
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct BookAppointmentRequest {
    pub employee_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    pub client_id: Option<String>,
    pub walk_in: Option<WalkInRequest>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub employee_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RescheduleNotificationRequest {
    pub changes: Option<RescheduleChanges>,
}

#[derive(Deserialize)]
pub struct UpdatePolicyRequest {
    pub allow_client_cancellation: Option<bool>,
    pub min_hours_notice: Option<i32>,
    pub max_monthly_cancellations: Option<i32>,
}

#[derive(Deserialize)]
pub struct BookingAllowedQuery {
    pub client_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<i64>,
}

/// Body of the ad-hoc email endpoint. Everything is optional so a missing
/// recipient surfaces as a 400 from the handler rather than a decode error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: Option<String>,
    pub user_name: Option<String>,
    pub data: Option<Value>,
}
