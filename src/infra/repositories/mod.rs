pub mod sqlite_appointment_repo;
pub mod sqlite_business_repo;
pub mod sqlite_directory_repo;
pub mod sqlite_notification_repo;
pub mod sqlite_job_repo;
pub mod sqlite_mail_log_repo;

pub mod postgres_appointment_repo;
pub mod postgres_business_repo;
pub mod postgres_directory_repo;
pub mod postgres_notification_repo;
pub mod postgres_job_repo;
pub mod postgres_mail_log_repo;
