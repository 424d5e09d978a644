// ==============================================================================
// store.rs - User Record Storage
// ==============================================================================
// Description: User-record collaborator contract with in-memory and
//              PostgreSQL implementations
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Callers pass usernames already lowercased (models::normalize_username);
// both backends additionally lowercase on the way in so a direct caller
// cannot create case-variant duplicates.
//
// ==============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::StoreError;

/// Stored account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Account to insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Ok(None)` when no such user exists; `Err` only for storage faults
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// `Err(StoreError::Conflict)` if the username is taken
    async fn create_user(&self, user: NewUser) -> Result<Uuid, StoreError>;

    /// Cheap liveness probe for the readiness endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store for development and tests
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().get(&username.to_lowercase()).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<Uuid, StoreError> {
        let key = user.username.to_lowercase();
        let mut users = self.users.write();

        if users.contains_key(&key) {
            return Err(StoreError::Conflict);
        }

        users.insert(
            key.clone(),
            UserRecord {
                id: user.id,
                username: key,
                password_hash: user.password_hash,
                created_at: Utc::now(),
            },
        );

        Ok(user.id)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ==============================================================================
// POSTGRESQL
// ==============================================================================

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Connect and make sure the `users` table exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, password_hash, created_at)| UserRecord {
            id,
            username,
            password_hash,
            created_at,
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<Uuid, StoreError> {
        sqlx::query("INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(user.username.to_lowercase())
            .bind(&user.password_hash)
            .execute(&self.pool)
            .await?;

        Ok(user.id)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
