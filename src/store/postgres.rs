//! # store::postgres — PostgreSQL Backend
//!
//! Uses `sqlx` against a single JSONB document table, so one generic
//! implementation serves all six entity types.
//!
//! ## Setup
//! 1. Create a database and set `DATABASE_URL` in `.env`
//! 2. Build with `--features postgres`; the migration runs on startup

use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::error::StoreError;
use crate::models::{Lookup, Record};
use crate::store::PersistenceBackend;

// ─── Pool Init ────────────────────────────────────────────────────────────────

/// Build the pool and apply the schema.
pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::query(include_str!("../../migrations/001_init.sql"))
        .execute(&pool)
        .await
        .context("Failed to run migration 001_init.sql")?;

    info!("PostgreSQL connected and migrations applied");
    Ok(pool)
}

// ─── Error Mapping ────────────────────────────────────────────────────────────

fn map_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Constraint(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Io(other.to_string()),
    }
}

fn decode<T: Record>(rows: Vec<(serde_json::Value,)>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|(body,)| serde_json::from_value(body).map_err(StoreError::from))
        .collect()
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// One entity type's view of the `records` table.
pub struct PgBackend<T> {
    pool: PgPool,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Record> PgBackend<T> {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, _kind: PhantomData }
    }
}

#[async_trait]
impl<T: Record> PersistenceBackend<T> for PgBackend<T> {
    async fn query(&self) -> Result<Vec<T>, StoreError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM records WHERE kind = $1 ORDER BY id",
        )
        .bind(T::KIND)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        decode(rows)
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT body FROM records WHERE kind = $1 AND id = $2",
        )
        .bind(T::KIND)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(|(body,)| serde_json::from_value(body).map_err(StoreError::from))
            .transpose()
    }

    async fn query_by(&self, lookup: &Lookup) -> Result<Vec<T>, StoreError> {
        let rows = match lookup {
            Lookup::Symbol(symbol) => {
                sqlx::query_as::<_, (serde_json::Value,)>(
                    "SELECT body FROM records WHERE kind = $1 AND body->>'symbol' = $2 ORDER BY id",
                )
                .bind(T::KIND)
                .bind(symbol)
                .fetch_all(&self.pool)
                .await
            }
            Lookup::Holding(holding_id) => {
                sqlx::query_as::<_, (serde_json::Value,)>(
                    "SELECT body FROM records WHERE kind = $1 AND body->>'holding_id' = $2 ORDER BY id",
                )
                .bind(T::KIND)
                .bind(holding_id)
                .fetch_all(&self.pool)
                .await
            }
            Lookup::Active => {
                sqlx::query_as::<_, (serde_json::Value,)>(
                    r#"
                    SELECT body FROM records
                    WHERE kind = $1
                      AND (body->>'enabled')::boolean
                      AND (body->'trigger_above' <> 'null'::jsonb
                           OR body->'trigger_below' <> 'null'::jsonb)
                    ORDER BY id
                    "#,
                )
                .bind(T::KIND)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_err)?;

        decode(rows)
    }

    async fn create(&self, record: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(record)?;
        sqlx::query("INSERT INTO records (kind, id, body) VALUES ($1, $2, $3)")
            .bind(T::KIND)
            .bind(record.id())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn update(&self, record: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(record)?;
        let result = sqlx::query(
            "UPDATE records SET body = $3, updated_at = now() WHERE kind = $1 AND id = $2",
        )
        .bind(T::KIND)
        .bind(record.id())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!(
                "{} {} does not exist",
                T::KIND,
                record.id()
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE kind = $1 AND id = $2")
            .bind(T::KIND)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }
}
