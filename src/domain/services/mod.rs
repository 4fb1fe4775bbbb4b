pub mod booking;
pub mod cancellation;
pub mod email_dispatch;
pub mod inbox;
pub mod lifecycle;
pub mod notification_service;
pub mod outbox;
pub mod policy;
pub mod realtime;
pub mod templates;
