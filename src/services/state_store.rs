//! StateStore: the last observed record of every managed bucket and user,
//! kept in SQLite as canonical JSON.

use crate::models::{bucket::Bucket, user::User};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;

const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum StateError {
    #[error("tracked record `{key}` in {table} is unreadable: {source}")]
    Record {
        table: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StateResult<T> = Result<T, StateError>;

/// One table of tracked records, keyed by the entity's identifier.
#[derive(Clone, Copy)]
struct Table {
    name: &'static str,
    key: &'static str,
}

const BUCKETS: Table = Table {
    name: "tracked_buckets",
    key: "name",
};

const USERS: Table = Table {
    name: "tracked_users",
    key: "id",
};

#[derive(Clone)]
pub struct StateStore {
    db: Arc<SqlitePool>,
}

impl StateStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> StateResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(Arc::new(pool));
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the embedded schema; every statement is idempotent.
    pub async fn migrate(&self) -> StateResult<usize> {
        let statements = MIGRATION
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    pub async fn put_bucket(&self, bucket: &Bucket) -> StateResult<()> {
        self.put(BUCKETS, &bucket.name, bucket).await
    }

    pub async fn get_bucket(&self, name: &str) -> StateResult<Option<Bucket>> {
        self.get(BUCKETS, name).await
    }

    pub async fn list_buckets(&self) -> StateResult<Vec<Bucket>> {
        self.list(BUCKETS).await
    }

    /// Returns whether a record was removed.
    pub async fn remove_bucket(&self, name: &str) -> StateResult<bool> {
        self.remove(BUCKETS, name).await
    }

    pub async fn put_user(&self, user: &User) -> StateResult<()> {
        self.put(USERS, &user.id, user).await
    }

    pub async fn get_user(&self, id: &str) -> StateResult<Option<User>> {
        self.get(USERS, id).await
    }

    pub async fn list_users(&self) -> StateResult<Vec<User>> {
        self.list(USERS).await
    }

    pub async fn remove_user(&self, id: &str) -> StateResult<bool> {
        self.remove(USERS, id).await
    }

    async fn put<T: Serialize>(&self, table: Table, key: &str, record: &T) -> StateResult<()> {
        let json = serde_json::to_string(record).map_err(|source| StateError::Record {
            table: table.name,
            key: key.to_string(),
            source,
        })?;

        let sql = format!(
            "INSERT INTO {t} ({k}, record, updated_at) VALUES (?, ?, ?)
             ON CONFLICT({k}) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
            t = table.name,
            k = table.key,
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(json)
            .bind(Utc::now())
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let sql = format!("SELECT record FROM {} WHERE {} = ?", table.name, table.key);
        let raw = sqlx::query_scalar::<_, String>(&sql)
            .bind(key)
            .fetch_optional(&*self.db)
            .await?;

        raw.map(|raw| decode(table, key, &raw)).transpose()
    }

    async fn list<T: DeserializeOwned>(&self, table: Table) -> StateResult<Vec<T>> {
        let sql = format!("SELECT {k}, record FROM {t} ORDER BY {k}", t = table.name, k = table.key);
        let rows = sqlx::query_as::<_, (String, String)>(&sql)
            .fetch_all(&*self.db)
            .await?;

        rows.iter()
            .map(|(key, raw)| decode(table, key, raw))
            .collect()
    }

    async fn remove(&self, table: Table, key: &str) -> StateResult<bool> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", table.name, table.key);
        let result = sqlx::query(&sql).bind(key).execute(&*self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn decode<T: DeserializeOwned>(table: Table, key: &str, raw: &str) -> StateResult<T> {
    serde_json::from_str(raw).map_err(|source| StateError::Record {
        table: table.name,
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
impl StateStore {
    /// Private in-memory database; one connection so every query sees it.
    pub(crate) async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Self::new(Arc::new(pool));
        store.migrate().await.unwrap();
        store
    }
}
