use std::env;
use std::time::Duration;
use crate::error::AppError;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub mail_service_url: String,
    pub mail_service_token: String,
    pub jwt_secret: String, // HS256 signing secret for bearer tokens
    pub frontend_url: String,
    pub realtime_debounce: Duration,
    pub worker_poll_interval: Duration,
    pub email_max_attempts: i32,
    pub default_max_monthly_cancellations: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parsed("PORT", 3000)?,
            mail_service_url: env::var("MAIL_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1/send".to_string()),
            mail_service_token: env::var("MAIL_SERVICE_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string()),
            realtime_debounce: Duration::from_millis(parsed("REALTIME_DEBOUNCE_MS", 100)?),
            worker_poll_interval: Duration::from_secs(parsed("WORKER_POLL_SECS", 5)?),
            email_max_attempts: parsed("EMAIL_MAX_ATTEMPTS", 3)?,
            default_max_monthly_cancellations: parsed("DEFAULT_MAX_MONTHLY_CANCELLATIONS", 3)?,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} must be set", key)))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| AppError::Configuration(format!("{} must be a number, got '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}
