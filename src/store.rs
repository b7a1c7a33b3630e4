use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::{info, instrument};

use crate::env::database_url;
use crate::error::AppError;

/// One row per record. Collections share a single table so the store stays
/// a plain key-value surface over whatever SQLite file backs it.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    PRIMARY KEY (collection, key)
);

CREATE INDEX IF NOT EXISTS idx_records_owner ON records (collection, owner_id);
"#;

/// The persisted collections, namespaced with the fixed `codequest-` prefix
/// the UI has always used for its storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    CurrentUser,
    Progress,
    Sessions,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::CurrentUser,
        Collection::Progress,
        Collection::Sessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "codequest-users",
            Collection::CurrentUser => "codequest-user",
            Collection::Progress => "codequest-progress",
            Collection::Sessions => "codequest-sessions",
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    data: String,
}

/// Durable key-value store over an embedded SQLite database. Constructed
/// explicitly and handed to each component; there is no process-wide
/// instance.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: Pool<Sqlite>,
}

impl RecordStore {
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        info!("Connecting record store");

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn connect_from_env() -> Result<Self, AppError> {
        Self::connect(&database_url()).await
    }

    /// In-memory store for tests and throwaway sessions. A single
    /// connection, since every new in-memory connection is a fresh
    /// database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        let row: Option<RecordRow> =
            sqlx::query_as("SELECT data FROM records WHERE collection = ? AND key = ?")
                .bind(collection.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.data)?)),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self, record))]
    pub async fn put<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        owner_id: &str,
        record: &T,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(record)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO records (collection, key, owner_id, data, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (collection, key) DO UPDATE SET
                 owner_id = excluded.owner_id,
                 data = excluded.data,
                 updated_at = excluded.updated_at",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(owner_id)
        .bind(data)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM records WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All records an owner holds in a collection, in insertion order.
    /// An owner with no records is an empty list, not an error.
    #[instrument(skip(self))]
    pub async fn list_by_owner<T: DeserializeOwned>(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<T>, AppError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT data FROM records WHERE collection = ? AND owner_id = ? ORDER BY rowid",
        )
        .bind(collection.as_str())
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| serde_json::from_str(&row.data).map_err(AppError::from))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, AppError> {
        let rows: Vec<RecordRow> =
            sqlx::query_as("SELECT data FROM records WHERE collection = ? ORDER BY rowid")
                .bind(collection.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| serde_json::from_str(&row.data).map_err(AppError::from))
            .collect()
    }

    /// Wipes every namespaced collection. For tests and explicit resets.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(), AppError> {
        info!("Clearing all record collections");

        for collection in Collection::ALL {
            sqlx::query("DELETE FROM records WHERE collection = ?")
                .bind(collection.as_str())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}
