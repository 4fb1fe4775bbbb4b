use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::domain::models::notification::Notification;

const HUB_CAPACITY: usize = 256;

/// Fan-in point for freshly inserted notification rows.
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, notification: &Notification) {
        // No receivers just means nobody is connected right now.
        let receivers = self.sender.send(notification.clone()).unwrap_or(0);
        debug!(notification_id = %notification.id, receivers, "Published notification");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

pub type NotificationCallback = Arc<dyn Fn(Notification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Subscribed,
    Closing,
}

struct ActiveSubscription {
    generation: u64,
    state: Arc<Mutex<SubscriptionState>>,
    callback: Arc<Mutex<Option<NotificationCallback>>>,
    task: JoinHandle<()>,
}

impl ActiveSubscription {
    /// Synchronous: once this returns the callback can no longer be invoked.
    fn teardown(self) {
        *lock(&self.state) = SubscriptionState::Closing;
        lock(&self.callback).take();
        self.task.abort();
        *lock(&self.state) = SubscriptionState::Idle;
    }
}

/// Per-recipient push channel. At most one live subscription per user;
/// delivery is at-most-once, durability lives in the notification table.
pub struct RealtimeChannel {
    hub: Arc<NotificationHub>,
    debounce: Duration,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    next_generation: AtomicU64,
}

impl RealtimeChannel {
    pub fn new(hub: Arc<NotificationHub>, debounce: Duration) -> Arc<Self> {
        Arc::new(Self {
            hub,
            debounce,
            subscriptions: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        })
    }

    /// Replaces any existing subscription for `user_id`. The channel opens after the
    /// debounce delay; a replacement within that window never opens the older one.
    /// `on_insert` runs under the subscription lock and must not call back into the channel.
    pub fn subscribe(self: &Arc<Self>, user_id: &str, on_insert: NotificationCallback) -> SubscriptionHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(Mutex::new(SubscriptionState::Subscribing));
        let callback = Arc::new(Mutex::new(Some(on_insert)));

        let mut subscriptions = lock(&self.subscriptions);
        if let Some(previous) = subscriptions.remove(user_id) {
            debug!(user_id, generation = previous.generation, "Tearing down previous subscription");
            previous.teardown();
        }

        let task = tokio::spawn(run_subscription(
            self.hub.clone(),
            self.debounce,
            user_id.to_string(),
            state.clone(),
            callback.clone(),
        ));

        subscriptions.insert(user_id.to_string(), ActiveSubscription { generation, state, callback, task });

        SubscriptionHandle {
            channel: Arc::downgrade(self),
            user_id: user_id.to_string(),
            generation,
            closed: AtomicBool::new(false),
        }
    }

    /// Swaps the consumer without reopening the channel.
    pub fn set_callback(&self, user_id: &str, on_insert: NotificationCallback) -> bool {
        let subscriptions = lock(&self.subscriptions);
        match subscriptions.get(user_id) {
            Some(active) => {
                let mut slot = lock(&active.callback);
                if slot.is_some() {
                    *slot = Some(on_insert);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn state_of(&self, user_id: &str) -> SubscriptionState {
        lock(&self.subscriptions)
            .get(user_id)
            .map(|active| *lock(&active.state))
            .unwrap_or(SubscriptionState::Idle)
    }

    fn release(&self, user_id: &str, generation: u64) {
        let mut subscriptions = lock(&self.subscriptions);
        let is_current = subscriptions.get(user_id).is_some_and(|a| a.generation == generation);
        if is_current && let Some(active) = subscriptions.remove(user_id) {
            active.teardown();
            debug!(user_id, generation, "Subscription released");
        }
    }
}

async fn run_subscription(
    hub: Arc<NotificationHub>,
    debounce: Duration,
    user_id: String,
    state: Arc<Mutex<SubscriptionState>>,
    callback: Arc<Mutex<Option<NotificationCallback>>>,
) {
    tokio::time::sleep(debounce).await;

    let mut receiver = hub.subscribe();
    {
        let mut current = lock(&state);
        if *current != SubscriptionState::Subscribing {
            return;
        }
        *current = SubscriptionState::Subscribed;
    }
    info!(user_id = %user_id, "Realtime subscription open");

    loop {
        match receiver.recv().await {
            Ok(notification) => {
                // Server-side filter: the channel is scoped to one recipient.
                if notification.recipient_id != user_id {
                    continue;
                }
                let slot = lock(&callback);
                match slot.as_ref() {
                    Some(deliver) => deliver(notification),
                    None => break,
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(user_id = %user_id, skipped, "Realtime subscriber lagged; missed rows are recovered by the next list fetch");
            }
            Err(RecvError::Closed) => {
                warn!(user_id = %user_id, "Realtime transport closed");
                lock(&callback).take();
                *lock(&state) = SubscriptionState::Idle;
                break;
            }
        }
    }
}

/// Dropping the handle unsubscribes. Unsubscribing is idempotent and never
/// affects a newer subscription for the same user.
pub struct SubscriptionHandle {
    channel: Weak<RealtimeChannel>,
    user_id: String,
    generation: u64,
    closed: AtomicBool,
}

impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(channel) = self.channel.upgrade() {
            channel.release(&self.user_id, self.generation);
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
