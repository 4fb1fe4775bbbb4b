use crate::domain::models::{
    appointment::{Appointment, AppointmentStatus},
    business::{Business, CancellationPolicy},
    directory::{Employee, Profile, WalkInClient},
    job::Job,
    mail_log::MailLog,
    notification::Notification,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Appointment>, AppError>;
    async fn list_by_business(&self, business_id: &str, date: Option<NaiveDate>) -> Result<Vec<Appointment>, AppError>;
    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Appointment>, AppError>;
    /// Inserts only if no slot-holding appointment of the same employee overlaps;
    /// otherwise `AppError::SlotUnavailable`.
    async fn create_if_slot_free(&self, appointment: &Appointment) -> Result<Appointment, AppError>;
    /// Persists status/notes/cancellation fields only while the stored status still
    /// equals `expected`. `None` means a concurrent write got there first.
    async fn update_status(&self, appointment: &Appointment, expected: AppointmentStatus) -> Result<Option<Appointment>, AppError>;
    /// Moves the appointment to its new date/time/employee, guarded by `expected`
    /// status and by the overlap rule.
    async fn update_schedule(&self, appointment: &Appointment, expected: AppointmentStatus) -> Result<Appointment, AppError>;
    async fn find_overlapping(&self, employee_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Vec<Appointment>, AppError>;
    /// Client-initiated cancellations at a business since `since`.
    async fn count_client_cancellations(&self, client_id: &str, business_id: &str, since: DateTime<Utc>) -> Result<i64, AppError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create_business(&self, business: &Business) -> Result<Business, AppError>;
    async fn find_business(&self, id: &str) -> Result<Option<Business>, AppError>;
    async fn update_policy(&self, business_id: &str, policy: &CancellationPolicy) -> Result<Business, AppError>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn create_profile(&self, profile: &Profile) -> Result<Profile, AppError>;
    async fn find_profile(&self, id: &str) -> Result<Option<Profile>, AppError>;
    async fn create_employee(&self, employee: &Employee) -> Result<Employee, AppError>;
    async fn find_employee(&self, id: &str) -> Result<Option<Employee>, AppError>;
    async fn create_walk_in(&self, client: &WalkInClient) -> Result<WalkInClient, AppError>;
    async fn find_walk_in(&self, id: &str) -> Result<Option<WalkInClient>, AppError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;
    async fn find_by_id(&self, recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError>;
    async fn list_by_recipient(&self, recipient_id: &str, limit: i64) -> Result<Vec<Notification>, AppError>;
    async fn count_unread(&self, recipient_id: &str) -> Result<i64, AppError>;
    /// Returns whether the row flipped from unread to read.
    async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError>;
    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError>;
    /// Returns the deleted row, if it existed.
    async fn delete(&self, recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<Job, AppError>;
    async fn find_pending(&self, limit: i32) -> Result<Vec<Job>, AppError>;
    async fn list_for_appointment(&self, appointment_id: &str) -> Result<Vec<Job>, AppError>;
    async fn update_status(&self, id: &str, status: &str, error_message: Option<String>) -> Result<(), AppError>;
    async fn retry_later(&self, id: &str, attempts: i32, execute_at: DateTime<Utc>, error_message: Option<String>) -> Result<(), AppError>;
    async fn cancel_pending_reminders(&self, appointment_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait MailLogRepository: Send + Sync {
    async fn log_mail(&self, log: &MailLog) -> Result<(), AppError>;
    async fn has_mail_been_sent(&self, recipient: &str, template_id: &str, context_hash: &str) -> Result<bool, AppError>;
    async fn list_logs(&self, recipient: Option<&str>) -> Result<Vec<MailLog>, AppError>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}
