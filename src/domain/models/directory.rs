use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A registered user: client or business owner.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(full_name: String, email: Option<String>, phone: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            full_name,
            email,
            phone,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Employee {
    pub id: String,
    pub business_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(business_id: String, full_name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            full_name,
            email: None,
            created_at: Utc::now(),
        }
    }
}

/// Non-registered client recorded by the business; has no account and no email.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct WalkInClient {
    pub id: String,
    pub business_id: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalkInClient {
    pub fn new(business_id: String, full_name: String, phone: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            full_name,
            phone,
            created_at: Utc::now(),
        }
    }
}
