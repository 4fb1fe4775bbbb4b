use appointment_backend::{
    api::{extractors::auth::issue_token, router::create_router},
    config::Config,
    domain::models::{
        actor::Actor,
        business::Business,
        directory::{Employee, Profile},
    },
    domain::ports::EmailService,
    domain::services::templates::load_templates,
    error::AppError,
    infra::factory::{connect_sqlite, run_sqlite_migrations, sqlite_repositories},
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Records every send; addresses in `failing` get a delivery error instead.
#[derive(Default)]
pub struct SpyEmailService {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
}

#[allow(dead_code)]
impl SpyEmailService {
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn heal(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl EmailService for SpyEmailService {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        if self.failing.lock().unwrap().contains(recipient) {
            return Err(AppError::EmailDelivery(format!("relay rejected {}", recipient)));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: recipient.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

/// A business with its owner, one employee and one registered client.
#[allow(dead_code)]
pub struct Seed {
    pub owner: Profile,
    pub client: Profile,
    pub business: Business,
    pub employee: Employee,
}

#[allow(dead_code)]
impl Seed {
    pub fn owner_actor(&self) -> Actor {
        Actor::BusinessOwner(self.owner.id.clone())
    }

    pub fn client_actor(&self) -> Actor {
        Actor::Client(self.client.id.clone())
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub mail: Arc<SpyEmailService>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let pool = connect_sqlite(&db_url).await.expect("Failed to connect to test db");
        run_sqlite_migrations(&pool).await.expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url,
            port: 0,
            mail_service_url: "http://localhost".to_string(),
            mail_service_token: "token".to_string(),
            jwt_secret: JWT_SECRET.to_string(),
            frontend_url: "https://app.test".to_string(),
            realtime_debounce: std::time::Duration::from_millis(10),
            worker_poll_interval: std::time::Duration::from_millis(50),
            email_max_attempts: 3,
            default_max_monthly_cancellations: 3,
        };

        let mail = Arc::new(SpyEmailService::default());
        let templates = Arc::new(load_templates().expect("Templates should load"));
        let state = Arc::new(AppState::assemble(
            config,
            sqlite_repositories(pool.clone()),
            mail.clone(),
            templates,
        ));
        let router = create_router(state.clone());

        Self { router, pool, db_filename, state, mail }
    }

    pub fn token(&self, actor: &Actor) -> String {
        issue_token(actor, JWT_SECRET, Duration::hours(1)).expect("Token should sign")
    }

    pub async fn seed(&self) -> Seed {
        self.seed_named("Barbería Tom", "owner@barberia.test", "cliente@correo.test").await
    }

    pub async fn seed_named(&self, business_name: &str, owner_email: &str, client_email: &str) -> Seed {
        let directory = &self.state.directory_repo;
        let owner = directory
            .create_profile(&Profile::new("Olga Dueña".into(), Some(owner_email.into()), Some("600000001".into())))
            .await
            .unwrap();
        let client = directory
            .create_profile(&Profile::new("Luis Pérez".into(), Some(client_email.into()), Some("600000002".into())))
            .await
            .unwrap();
        let business = self.state.policy_service
            .register_business(Business::new(owner.id.clone(), business_name.into(), "Europe/Madrid".into()))
            .await
            .unwrap();
        let employee = directory
            .create_employee(&Employee::new(business.id.clone(), "Marta Estilista".into()))
            .await
            .unwrap();

        Seed { owner, client, business, employee }
    }

    pub async fn add_client(&self, name: &str, email: Option<&str>) -> Profile {
        self.state.directory_repo
            .create_profile(&Profile::new(name.into(), email.map(str::to_string), None))
            .await
            .unwrap()
    }

    /// Sends a request through the router and decodes the JSON body (Null when empty).
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, parse_body(response).await)
    }

    /// Books through the API on the seeded employee; `extra` is merged into the body.
    pub async fn book(&self, actor: &Actor, seed: &Seed, date: NaiveDate, start: &str, end: &str, extra: Value) -> (StatusCode, Value) {
        let mut payload = serde_json::json!({
            "employee_id": seed.employee.id,
            "date": date.format("%Y-%m-%d").to_string(),
            "start_time": start,
            "end_time": end,
            "services": [{ "name": "Corte", "price_cents": 1500 }],
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut payload, extra) {
            target.extend(extra);
        }
        let token = self.token(actor);
        self.call(
            Method::POST,
            &format!("/api/v1/businesses/{}/appointments", seed.business.id),
            Some(&token),
            Some(payload),
        ).await
    }

    pub async fn job_statuses(&self, appointment_id: &str) -> Vec<(String, String)> {
        self.state.job_repo
            .list_for_appointment(appointment_id)
            .await
            .unwrap()
            .into_iter()
            .map(|j| (j.job_type, j.status))
            .collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}

pub async fn parse_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// A calendar day `days` from today.
#[allow(dead_code)]
pub fn days_ahead(days: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days)).date_naive()
}
