use std::sync::Arc;
use crate::config::Config;
use crate::domain::ports::{
    AppointmentRepository, DirectoryRepository, EmailService, JobRepository,
    MailLogRepository, NotificationRepository, PolicyRepository,
};
use crate::domain::services::{
    booking::BookingService,
    cancellation::CancellationService,
    email_dispatch::EmailDispatcher,
    notification_service::NotificationService,
    policy::PolicyService,
    realtime::{NotificationHub, RealtimeChannel},
    templates::EmailRenderer,
};
use tera::Tera;

/// One implementation per port, all backed by the same pool.
pub struct Repositories {
    pub appointments: Arc<dyn AppointmentRepository>,
    pub businesses: Arc<dyn PolicyRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub mail_logs: Arc<dyn MailLogRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub appointment_repo: Arc<dyn AppointmentRepository>,
    pub business_repo: Arc<dyn PolicyRepository>,
    pub directory_repo: Arc<dyn DirectoryRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub job_repo: Arc<dyn JobRepository>,
    pub mail_log_repo: Arc<dyn MailLogRepository>,
    pub email_service: Arc<dyn EmailService>,
    pub templates: Arc<Tera>,
    pub renderer: EmailRenderer,
    pub hub: Arc<NotificationHub>,
    pub realtime: Arc<RealtimeChannel>,
    pub notification_service: NotificationService,
    pub policy_service: Arc<PolicyService>,
    pub booking_service: Arc<BookingService>,
    pub cancellation_service: Arc<CancellationService>,
    pub email_dispatcher: Arc<EmailDispatcher>,
}

impl AppState {
    pub fn assemble(config: Config, repos: Repositories, email_service: Arc<dyn EmailService>, templates: Arc<Tera>) -> Self {
        let hub = Arc::new(NotificationHub::new());
        let realtime = RealtimeChannel::new(hub.clone(), config.realtime_debounce);
        let renderer = EmailRenderer::new(templates.clone());

        let notification_service = NotificationService::new(repos.notifications.clone(), hub.clone());
        let policy_service = Arc::new(PolicyService::new(
            repos.appointments.clone(),
            repos.businesses.clone(),
            config.default_max_monthly_cancellations,
        ));
        let booking_service = Arc::new(BookingService::new(
            repos.appointments.clone(),
            repos.businesses.clone(),
            repos.directory.clone(),
            repos.jobs.clone(),
            notification_service.clone(),
            policy_service.clone(),
        ));
        let cancellation_service = Arc::new(CancellationService::new(
            repos.appointments.clone(),
            repos.businesses.clone(),
            repos.jobs.clone(),
            notification_service.clone(),
        ));
        let email_dispatcher = Arc::new(EmailDispatcher::new(
            repos.appointments.clone(),
            repos.businesses.clone(),
            repos.directory.clone(),
            repos.mail_logs.clone(),
            email_service.clone(),
            renderer.clone(),
            config.frontend_url.clone(),
        ));

        Self {
            config,
            appointment_repo: repos.appointments,
            business_repo: repos.businesses,
            directory_repo: repos.directory,
            notification_repo: repos.notifications,
            job_repo: repos.jobs,
            mail_log_repo: repos.mail_logs,
            email_service,
            templates,
            renderer,
            hub,
            realtime,
            notification_service,
            policy_service,
            booking_service,
            cancellation_service,
            email_dispatcher,
        }
    }
}
