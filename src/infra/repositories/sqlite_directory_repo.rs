use crate::domain::models::directory::{Employee, Profile, WalkInClient};
use crate::domain::ports::DirectoryRepository;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteDirectoryRepo {
    pool: SqlitePool,
}

impl SqliteDirectoryRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[async_trait]
impl DirectoryRepository for SqliteDirectoryRepo {
    async fn create_profile(&self, p: &Profile) -> Result<Profile, AppError> {
        sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, full_name, email, phone, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&p.id).bind(&p.full_name).bind(&p.email).bind(&p.phone).bind(p.created_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn create_employee(&self, e: &Employee) -> Result<Employee, AppError> {
        sqlx::query_as::<_, Employee>(
            "INSERT INTO employees (id, business_id, full_name, email, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&e.id).bind(&e.business_id).bind(&e.full_name).bind(&e.email).bind(e.created_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_employee(&self, id: &str) -> Result<Option<Employee>, AppError> {
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn create_walk_in(&self, c: &WalkInClient) -> Result<WalkInClient, AppError> {
        sqlx::query_as::<_, WalkInClient>(
            "INSERT INTO walk_in_clients (id, business_id, full_name, phone, created_at) VALUES (?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&c.id).bind(&c.business_id).bind(&c.full_name).bind(&c.phone).bind(c.created_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_walk_in(&self, id: &str) -> Result<Option<WalkInClient>, AppError> {
        sqlx::query_as::<_, WalkInClient>("SELECT * FROM walk_in_clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }
}
