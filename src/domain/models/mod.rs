pub mod actor;
pub mod appointment;
pub mod business;
pub mod directory;
pub mod job;
pub mod mail_log;
pub mod notification;
pub mod reschedule;
