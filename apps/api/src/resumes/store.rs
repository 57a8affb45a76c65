//! Résumé persistence. Every operation is scoped to the owning user; a record that
//! exists under another user is indistinguishable from one that does not exist.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeData, ResumeRecord};

/// Partial update. `None` leaves the stored value as it is.
#[derive(Debug, Clone, Default)]
pub struct ResumeChanges {
    pub name: Option<String>,
    pub data: Option<ResumeData>,
}

pub fn copy_name(name: &str) -> String {
    format!("Copy of {name}")
}

/// Carried in `AppState` as `Arc<dyn ResumeStore>`.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Most recently updated first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, AppError>;

    async fn create(&self, user_id: Uuid, name: &str, data: &ResumeData) -> Result<ResumeRecord, AppError>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError>;

    async fn update(&self, user_id: Uuid, id: Uuid, changes: ResumeChanges) -> Result<Option<ResumeRecord>, AppError>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn duplicate(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        PgResumeStore { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRecord>(
            r#"
            SELECT id, user_id, name, data, created_at, updated_at
            FROM resumes
            WHERE user_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create(&self, user_id: Uuid, name: &str, data: &ResumeData) -> Result<ResumeRecord, AppError> {
        let record = sqlx::query_as::<_, ResumeRecord>(
            r#"
            INSERT INTO resumes (id, user_id, name, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, data, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(Json(data))
        .fetch_one(&self.pool)
        .await?;

        info!("Created resume {} for user {user_id}", record.id);
        Ok(record)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRecord>(
            r#"
            SELECT id, user_id, name, data, created_at, updated_at
            FROM resumes
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, changes: ResumeChanges) -> Result<Option<ResumeRecord>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRecord>(
            r#"
            UPDATE resumes
            SET name = COALESCE($3, name),
                data = COALESCE($4, data),
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, data, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(changes.name)
        .bind(changes.data.map(Json))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn duplicate(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        Ok(sqlx::query_as::<_, ResumeRecord>(
            r#"
            INSERT INTO resumes (id, user_id, name, data)
            SELECT $3, user_id, 'Copy of ' || name, data
            FROM resumes
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, data, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Uuid::new_v4())
        .fetch_optional(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryResumeStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<Uuid, (u64, ResumeRecord)>,
    // Breaks ties between writes landing on the same timestamp.
    clock: u64,
}

impl MemoryInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn owned(&self, user_id: Uuid, id: Uuid) -> Option<&ResumeRecord> {
        self.records
            .get(&id)
            .map(|(_, r)| r)
            .filter(|r| r.user_id == user_id)
    }

    fn insert(&mut self, user_id: Uuid, name: String, data: ResumeData) -> ResumeRecord {
        let now = Utc::now();
        let record = ResumeRecord {
            id: Uuid::new_v4(),
            user_id,
            name,
            data: Json(data),
            created_at: now,
            updated_at: now,
        };
        let seq = self.tick();
        self.records.insert(record.id, (seq, record.clone()));
        record
    }
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn list(&self, user_id: Uuid) -> Result<Vec<ResumeRecord>, AppError> {
        let inner = self.lock();
        let mut owned: Vec<&(u64, ResumeRecord)> = inner
            .records
            .values()
            .filter(|(_, r)| r.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| (b.1.updated_at, b.0).cmp(&(a.1.updated_at, a.0)));
        Ok(owned.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn create(&self, user_id: Uuid, name: &str, data: &ResumeData) -> Result<ResumeRecord, AppError> {
        Ok(self.lock().insert(user_id, name.to_string(), data.clone()))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        Ok(self.lock().owned(user_id, id).cloned())
    }

    async fn update(&self, user_id: Uuid, id: Uuid, changes: ResumeChanges) -> Result<Option<ResumeRecord>, AppError> {
        let mut inner = self.lock();
        if inner.owned(user_id, id).is_none() {
            return Ok(None);
        }
        let seq = inner.tick();
        let Some((slot_seq, record)) = inner.records.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            record.name = name;
        }
        if let Some(data) = changes.data {
            record.data = Json(data);
        }
        record.updated_at = Utc::now().max(record.updated_at);
        *slot_seq = seq;
        Ok(Some(record.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.lock();
        if inner.owned(user_id, id).is_none() {
            return Ok(false);
        }
        Ok(inner.records.remove(&id).is_some())
    }

    async fn duplicate(&self, user_id: Uuid, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        let mut inner = self.lock();
        let Some(source) = inner.owned(user_id, id).cloned() else {
            return Ok(None);
        };
        Ok(Some(inner.insert(user_id, copy_name(&source.name), source.data.0)))
    }
}
