use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub const MAIL_SENT: &str = "SENT";
pub const MAIL_SKIPPED_DUPLICATE: &str = "SKIPPED_DUPLICATE";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct MailLog {
    pub id: String,
    pub job_id: Option<String>,
    pub recipient: String,
    pub template_id: String,
    pub context_hash: String,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

impl MailLog {
    pub fn new(job_id: Option<&str>, recipient: &str, template_id: &str, context_hash: String, status: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.map(str::to_string),
            recipient: recipient.to_string(),
            template_id: template_id.to_string(),
            context_hash,
            sent_at: Utc::now(),
            status: status.to_string(),
        }
    }
}
