use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::ports::EmailService;
use crate::domain::services::templates::load_templates;
use crate::error::AppError;
use crate::state::{AppState, Repositories};
use crate::infra::email::http_email_service::HttpEmailService;
use crate::infra::repositories::{
    postgres_appointment_repo::PostgresAppointmentRepo, postgres_business_repo::PostgresBusinessRepo,
    postgres_directory_repo::PostgresDirectoryRepo, postgres_notification_repo::PostgresNotificationRepo,
    postgres_job_repo::PostgresJobRepo, postgres_mail_log_repo::PostgresMailLogRepo,
    sqlite_appointment_repo::SqliteAppointmentRepo, sqlite_business_repo::SqliteBusinessRepo,
    sqlite_directory_repo::SqliteDirectoryRepo, sqlite_notification_repo::SqliteNotificationRepo,
    sqlite_job_repo::SqliteJobRepo, sqlite_mail_log_repo::SqliteMailLogRepo,
};

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let email_service: Arc<dyn EmailService> = Arc::new(HttpEmailService::new(
        config.mail_service_url.clone(),
        config.mail_service_token.clone(),
    )?);
    let templates = Arc::new(load_templates()?);

    let database_url = &config.database_url;
    let repos = if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");
        let pool = connect_postgres(database_url).await?;
        run_postgres_migrations(&pool).await?;
        postgres_repositories(pool)
    } else {
        info!("Initializing SQLite connection with WAL Mode...");
        let pool = connect_sqlite(database_url).await?;
        run_sqlite_migrations(&pool).await?;
        sqlite_repositories(pool)
    };

    Ok(AppState::assemble(config.clone(), repos, email_service, templates))
}

pub fn sqlite_repositories(pool: SqlitePool) -> Repositories {
    Repositories {
        appointments: Arc::new(SqliteAppointmentRepo::new(pool.clone())),
        businesses: Arc::new(SqliteBusinessRepo::new(pool.clone())),
        directory: Arc::new(SqliteDirectoryRepo::new(pool.clone())),
        notifications: Arc::new(SqliteNotificationRepo::new(pool.clone())),
        jobs: Arc::new(SqliteJobRepo::new(pool.clone())),
        mail_logs: Arc::new(SqliteMailLogRepo::new(pool)),
    }
}

pub fn postgres_repositories(pool: PgPool) -> Repositories {
    Repositories {
        appointments: Arc::new(PostgresAppointmentRepo::new(pool.clone())),
        businesses: Arc::new(PostgresBusinessRepo::new(pool.clone())),
        directory: Arc::new(PostgresDirectoryRepo::new(pool.clone())),
        notifications: Arc::new(PostgresNotificationRepo::new(pool.clone())),
        jobs: Arc::new(PostgresJobRepo::new(pool.clone())),
        mail_logs: Arc::new(PostgresMailLogRepo::new(pool)),
    }
}

async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    let opts: PgConnectOptions = database_url.parse()
        .map_err(|e| AppError::Configuration(format!("Invalid Postgres URL: {}", e)))?;
    let opts = opts.log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    PgPoolOptions::new()
        .max_connections(10)
        .connect_with(opts)
        .await
        .map_err(AppError::Database)
}

pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Configuration(format!("Invalid SQLite connection string: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .map_err(AppError::Database)
}

async fn run_postgres_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Postgres migrations failed: {}", e)))
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("SQLite migrations failed: {}", e)))
}
