// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::{Document, RecordStore, StoreError, require_object};

/// Postgres-backed record store.
///
/// Every collection lives in one generic JSONB table (see
/// `migrations/0001_records.sql`). Keyed writes go through a single
/// `ON CONFLICT` upsert, so each (collection, id) write is atomic.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
    let id: String = row.try_get("id")?;
    let data: Value = row.try_get("data")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(Document {
        id,
        created_at,
        updated_at,
        data,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, data, created_at, updated_at FROM records \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, data, created_at, updated_at FROM records \
             WHERE collection = $1 AND data @> $2 \
             ORDER BY created_at, id",
        )
        .bind(collection)
        .bind(filter)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError> {
        require_object(&data)?;
        let id: i64 = sqlx::query_scalar("SELECT nextval('records_id_seq')")
            .fetch_one(&self.pool)
            .await?;
        let id = id.to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO records (collection, id, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4)",
        )
        .bind(collection)
        .bind(&id)
        .bind(&data)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Document {
            id,
            created_at: now,
            updated_at: now,
            data,
        })
    }

    async fn put(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        require_object(&data)?;
        let now = Utc::now();

        let row = sqlx::query(
            "INSERT INTO records (collection, id, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (collection, id) \
             DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at \
             RETURNING created_at, updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Document {
            id: id.to_string(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            data,
        })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        require_object(&patch)?;

        // JSONB || merges top-level keys, which is exactly patch semantics.
        let row = sqlx::query(
            "UPDATE records SET data = data || $3, updated_at = $4 \
             WHERE collection = $1 AND id = $2 \
             RETURNING id, data, created_at, updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&patch)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
