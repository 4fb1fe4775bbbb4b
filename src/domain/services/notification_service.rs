use std::sync::Arc;
use tracing::{info, warn};
use crate::domain::models::notification::{NewNotification, Notification, NotificationType};
use crate::domain::ports::NotificationRepository;
use crate::domain::services::realtime::NotificationHub;
use crate::error::AppError;

pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Authoritative side of the notification store: persisted rows plus the
/// insert feed that drives realtime delivery.
#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    hub: Arc<NotificationHub>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, hub: Arc<NotificationHub>) -> Self {
        Self { repo, hub }
    }

    pub async fn create(
        &self,
        recipient_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        appointment_id: Option<&str>,
    ) -> Result<Notification, AppError> {
        let notification = Notification::new(NewNotification {
            recipient_id: recipient_id.to_string(),
            notification_type,
            title: title.to_string(),
            message: message.to_string(),
            appointment_id: appointment_id.map(str::to_string),
        });

        let created = self.repo.create(&notification).await?;
        self.hub.publish(&created);
        info!(notification_id = %created.id, recipient_id, "Notification created");
        Ok(created)
    }

    /// Side-channel variant: failures are logged and swallowed.
    pub async fn notify(
        &self,
        recipient_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        appointment_id: Option<&str>,
    ) -> Option<Notification> {
        match self.create(recipient_id, notification_type, title, message, appointment_id).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(recipient_id, ?notification_type, "Failed to insert notification: {}", e);
                None
            }
        }
    }

    pub async fn list(&self, recipient_id: &str, limit: Option<i64>) -> Result<Vec<Notification>, AppError> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIST_LIMIT);
        self.repo.list_by_recipient(recipient_id, limit).await
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<i64, AppError> {
        self.repo.count_unread(recipient_id).await
    }

    pub async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        if self.repo.find_by_id(recipient_id, id).await?.is_none() {
            return Err(AppError::NotFound("Notification not found".into()));
        }
        self.repo.mark_read(recipient_id, id).await
    }

    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        self.repo.mark_all_read(recipient_id).await
    }

    pub async fn delete(&self, recipient_id: &str, id: &str) -> Result<Notification, AppError> {
        self.repo.delete(recipient_id, id).await?
            .ok_or(AppError::NotFound("Notification not found".into()))
    }
}
