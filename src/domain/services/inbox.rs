use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;
use crate::domain::models::notification::Notification;
use crate::domain::services::notification_service::{NotificationService, DEFAULT_LIST_LIMIT};
use crate::domain::services::realtime::{RealtimeChannel, SubscriptionHandle};
use crate::error::AppError;

#[derive(Default)]
struct InboxState {
    /// Newest first, unique by id.
    items: Vec<Notification>,
    /// Unread rows the server reported beyond the fetched page.
    hidden_unread: i64,
}

impl InboxState {
    fn unread_count(&self) -> i64 {
        self.items.iter().filter(|n| !n.is_read).count() as i64 + self.hidden_unread
    }

    fn upsert(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        let at = self.items
            .iter()
            .position(|n| n.created_at < notification.created_at)
            .unwrap_or(self.items.len());
        self.items.insert(at, notification);
        true
    }

    fn set_read(&mut self, id: &str, read: bool) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if n.is_read != read => {
                n.is_read = read;
                true
            }
            _ => false,
        }
    }
}

/// Session-side view of a user's notifications. Keeps the unread counter in step with
/// the server across the initial fetch, realtime pushes, and optimistic mutations.
pub struct NotificationInbox {
    user_id: String,
    service: NotificationService,
    state: Mutex<InboxState>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl NotificationInbox {
    pub async fn open(service: NotificationService, channel: &Arc<RealtimeChannel>, user_id: &str) -> Result<Arc<Self>, AppError> {
        let inbox = Arc::new(Self {
            user_id: user_id.to_string(),
            service,
            state: Mutex::new(InboxState::default()),
            subscription: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&inbox);
        let handle = channel.subscribe(user_id, Arc::new(move |n| {
            if let Some(inbox) = weak.upgrade() {
                inbox.on_push(n);
            }
        }));
        *lock(&inbox.subscription) = Some(handle);

        inbox.refresh().await?;
        Ok(inbox)
    }

    /// Full fetch merged with anything pushed meanwhile, deduplicated by id.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let page = self.service.list(&self.user_id, Some(DEFAULT_LIST_LIMIT)).await?;
        let page_full = page.len() as i64 >= DEFAULT_LIST_LIMIT;
        let server_unread = self.service.unread_count(&self.user_id).await?;

        let mut state = lock(&self.state);
        let page_ids: HashSet<&str> = page.iter().map(|n| n.id.as_str()).collect();
        let pushed_only: Vec<Notification> = state.items
            .iter()
            .filter(|n| !page_ids.contains(n.id.as_str()))
            .cloned()
            .collect();

        let mut merged = InboxState {
            items: Vec::with_capacity(page.len() + pushed_only.len()),
            hidden_unread: 0,
        };
        for n in page.into_iter().chain(pushed_only) {
            merged.upsert(n);
        }
        // The count may already include rows pushed between the two reads, so every
        // unread row held locally is subtracted, not just the fetched page.
        if page_full {
            let held_unread = merged.items.iter().filter(|n| !n.is_read).count() as i64;
            merged.hidden_unread = (server_unread - held_unread).max(0);
        }
        *state = merged;
        Ok(())
    }

    /// Realtime delivery; duplicates of rows already held are ignored.
    pub fn on_push(&self, notification: Notification) {
        let id = notification.id.clone();
        if !lock(&self.state).upsert(notification) {
            debug!(notification_id = %id, "Ignoring duplicate push");
        }
    }

    pub fn unread_count(&self) -> i64 {
        lock(&self.state).unread_count()
    }

    pub fn items(&self) -> Vec<Notification> {
        lock(&self.state).items.clone()
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), AppError> {
        let (flipped, held) = {
            let mut state = lock(&self.state);
            let held = state.items.iter().any(|n| n.id == id);
            (state.set_read(id, true), held)
        };
        match self.service.mark_read(&self.user_id, id).await {
            Err(e) => {
                if flipped {
                    lock(&self.state).set_read(id, false);
                }
                Err(e)
            }
            Ok(changed) => {
                let mut state = lock(&self.state);
                // A row outside the fetched page only lives in the hidden tally.
                if !state.set_read(id, true) && changed && !held {
                    state.hidden_unread = (state.hidden_unread - 1).max(0);
                }
                Ok(())
            }
        }
    }

    pub async fn mark_all_read(&self) -> Result<(), AppError> {
        let (flipped, hidden) = {
            let mut state = lock(&self.state);
            let flipped: Vec<String> = state.items
                .iter_mut()
                .filter(|n| !n.is_read)
                .map(|n| {
                    n.is_read = true;
                    n.id.clone()
                })
                .collect();
            let hidden = std::mem::take(&mut state.hidden_unread);
            (flipped, hidden)
        };

        if let Err(e) = self.service.mark_all_read(&self.user_id).await {
            let mut state = lock(&self.state);
            for id in &flipped {
                state.set_read(id, false);
            }
            state.hidden_unread += hidden;
            return Err(e);
        }
        Ok(())
    }

    /// Removal and counter update happen in one state change.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let removed = {
            let mut state = lock(&self.state);
            let at = state.items.iter().position(|n| n.id == id);
            at.map(|at| state.items.remove(at))
        };

        match self.service.delete(&self.user_id, id).await {
            Err(e) => {
                if let Some(n) = removed {
                    lock(&self.state).upsert(n);
                }
                Err(e)
            }
            Ok(deleted) => {
                if removed.is_none() {
                    let mut state = lock(&self.state);
                    if let Some(at) = state.items.iter().position(|n| n.id == id) {
                        state.items.remove(at);
                    } else if !deleted.is_read {
                        state.hidden_unread = (state.hidden_unread - 1).max(0);
                    }
                }
                Ok(())
            }
        }
    }

    /// Tears down the realtime subscription. Safe to call repeatedly.
    pub fn close(&self) {
        if let Some(handle) = lock(&self.subscription).take() {
            handle.unsubscribe();
        }
    }
}

impl Drop for NotificationInbox {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::notification::{NewNotification, NotificationType};
    use crate::domain::ports::NotificationRepository;
    use crate::domain::services::realtime::NotificationHub;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    const USER: &str = "user-1";

    /// In-memory store. When armed, the next list call inserts a row right after
    /// reading the page and pushes it to the inbox, as a concurrent insert would.
    #[derive(Default)]
    struct MemoryRepo {
        rows: Mutex<Vec<Notification>>,
        insert_during_list: Mutex<Option<Notification>>,
        inbox: Mutex<Weak<NotificationInbox>>,
    }

    impl MemoryRepo {
        fn seed(&self, count: i64) -> Vec<Notification> {
            let base = Utc::now() - ChronoDuration::hours(1);
            let rows: Vec<Notification> = (0..count).map(|i| row(base + ChronoDuration::seconds(i))).collect();
            self.rows.lock().unwrap().extend(rows.clone());
            rows
        }
    }

    fn row(created_at: chrono::DateTime<Utc>) -> Notification {
        let mut n = Notification::new(NewNotification {
            recipient_id: USER.into(),
            notification_type: NotificationType::NewAppointment,
            title: "Nueva cita".into(),
            message: "Hola".into(),
            appointment_id: None,
        });
        n.created_at = created_at;
        n
    }

    #[async_trait]
    impl NotificationRepository for MemoryRepo {
        async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
            self.rows.lock().unwrap().push(notification.clone());
            Ok(notification.clone())
        }

        async fn find_by_id(&self, _recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError> {
            Ok(self.rows.lock().unwrap().iter().find(|n| n.id == id).cloned())
        }

        async fn list_by_recipient(&self, _recipient_id: &str, limit: i64) -> Result<Vec<Notification>, AppError> {
            let mut page = self.rows.lock().unwrap().clone();
            page.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            page.truncate(limit as usize);

            if let Some(late) = self.insert_during_list.lock().unwrap().take() {
                self.rows.lock().unwrap().push(late.clone());
                if let Some(inbox) = self.inbox.lock().unwrap().upgrade() {
                    inbox.on_push(late);
                }
            }
            Ok(page)
        }

        async fn count_unread(&self, _recipient_id: &str) -> Result<i64, AppError> {
            Ok(self.rows.lock().unwrap().iter().filter(|n| !n.is_read).count() as i64)
        }

        async fn mark_read(&self, _recipient_id: &str, id: &str) -> Result<bool, AppError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|n| n.id == id) {
                Some(n) if !n.is_read => {
                    n.is_read = true;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_all_read(&self, _recipient_id: &str) -> Result<u64, AppError> {
            let mut rows = self.rows.lock().unwrap();
            let mut changed = 0;
            for n in rows.iter_mut().filter(|n| !n.is_read) {
                n.is_read = true;
                changed += 1;
            }
            Ok(changed)
        }

        async fn delete(&self, _recipient_id: &str, id: &str) -> Result<Option<Notification>, AppError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.iter().position(|n| n.id == id).map(|at| rows.remove(at)))
        }
    }

    async fn open(repo: &Arc<MemoryRepo>) -> Arc<NotificationInbox> {
        let hub = Arc::new(NotificationHub::new());
        let channel = RealtimeChannel::new(hub.clone(), Duration::from_millis(5));
        let service = NotificationService::new(repo.clone(), hub);
        let inbox = NotificationInbox::open(service, &channel, USER).await.unwrap();
        *repo.inbox.lock().unwrap() = Arc::downgrade(&inbox);
        inbox
    }

    #[tokio::test]
    async fn row_inserted_between_list_and_count_is_counted_once() {
        let repo = Arc::new(MemoryRepo::default());
        let inbox = open(&repo).await;
        assert_eq!(inbox.unread_count(), 0);

        *repo.insert_during_list.lock().unwrap() = Some(row(Utc::now()));
        inbox.refresh().await.unwrap();

        assert_eq!(repo.count_unread(USER).await.unwrap(), 1);
        assert_eq!(inbox.items().len(), 1);
        assert_eq!(inbox.unread_count(), 1);
    }

    #[tokio::test]
    async fn full_page_with_concurrent_insert_is_counted_once() {
        let repo = Arc::new(MemoryRepo::default());
        repo.seed(DEFAULT_LIST_LIMIT + 2);
        let inbox = open(&repo).await;
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT + 2);

        *repo.insert_during_list.lock().unwrap() = Some(row(Utc::now()));
        inbox.refresh().await.unwrap();

        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT + 3);
        assert_eq!(inbox.unread_count(), repo.count_unread(USER).await.unwrap());
    }

    #[tokio::test]
    async fn mutating_rows_outside_the_page_updates_the_count() {
        let repo = Arc::new(MemoryRepo::default());
        let rows = repo.seed(DEFAULT_LIST_LIMIT + 2);
        let inbox = open(&repo).await;
        assert_eq!(inbox.items().len() as i64, DEFAULT_LIST_LIMIT);
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT + 2);

        // The two oldest rows are beyond the fetched page.
        inbox.mark_read(&rows[0].id).await.unwrap();
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT + 1);
        inbox.mark_read(&rows[0].id).await.unwrap();
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT + 1);

        inbox.delete(&rows[1].id).await.unwrap();
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT);

        // Deleting a row that was already read leaves the count alone.
        inbox.delete(&rows[0].id).await.unwrap();
        assert_eq!(inbox.unread_count(), DEFAULT_LIST_LIMIT);
        assert_eq!(inbox.unread_count(), repo.count_unread(USER).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_an_unread_row_decrements_by_one() {
        let repo = Arc::new(MemoryRepo::default());
        let rows = repo.seed(3);
        let inbox = open(&repo).await;
        assert_eq!(inbox.unread_count(), 3);

        inbox.delete(&rows[2].id).await.unwrap();
        assert_eq!(inbox.unread_count(), 2);
        assert_eq!(inbox.items().len(), 2);
    }
}
