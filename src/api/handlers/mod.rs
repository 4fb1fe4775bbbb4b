pub mod appointment;
pub mod email;
pub mod health;
pub mod notification;
pub mod policy;
