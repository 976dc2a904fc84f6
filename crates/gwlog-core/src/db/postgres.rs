//! PostgreSQL sink.

use super::{AccessLogSink, PersistedAccessLog};
use async_trait::async_trait;
use gwlog_common::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Column definitions, in insert order.
const COLUMNS: [(&str, &str); 24] = [
    ("request_id", "UUID NOT NULL"),
    ("api_key", "TEXT NOT NULL"),
    ("api_key_id", "TEXT NOT NULL"),
    ("request_time", "TIMESTAMPTZ NOT NULL"),
    ("request_time_epoch", "BIGINT NOT NULL"),
    ("api_id", "TEXT NOT NULL"),
    ("stage", "TEXT NOT NULL"),
    ("http_method", "TEXT NOT NULL"),
    ("protocol", "TEXT NOT NULL"),
    ("domain_name", "TEXT NOT NULL"),
    ("path", "TEXT NOT NULL"),
    ("resource_path", "TEXT NOT NULL"),
    ("user_agent", "TEXT NOT NULL"),
    ("status", "INTEGER NOT NULL"),
    ("response_latency", "BIGINT NOT NULL"),
    ("error_message", "TEXT NOT NULL"),
    ("response_type", "TEXT NOT NULL"),
    ("response_length", "BIGINT NOT NULL"),
    ("integration_status", "INTEGER NOT NULL"),
    ("integration_latency", "BIGINT NOT NULL"),
    ("integration_error", "TEXT NOT NULL"),
    ("ip", "TEXT NOT NULL"),
    ("caller", "TEXT NOT NULL"),
    ("\"user\"", "TEXT NOT NULL"),
];

/// Access-log table behind a connection pool.
///
/// `table` must be a plain SQL identifier; `IngestConfig::validate` checks
/// this before a store is built.
#[derive(Debug, Clone)]
pub struct PgAccessLogStore {
    pool: PgPool,
    table: String,
    insert_sql: String,
}

impl PgAccessLogStore {
    pub async fn connect(database_url: &str, max_connections: u32, table: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool, table))
    }

    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            insert_sql: insert_sql(table),
            table: table.to_string(),
            pool,
        }
    }

    /// Create the table if it does not exist. Existing tables are left alone.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        info!(table = %self.table, "table ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AccessLogSink for PgAccessLogStore {
    async fn insert(&self, row: &PersistedAccessLog) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(&self.insert_sql)
            .bind(row.request_id)
            .bind(&row.api_key)
            .bind(&row.api_key_id)
            .bind(row.request_time)
            .bind(row.request_time_epoch)
            .bind(&row.api_id)
            .bind(&row.stage)
            .bind(&row.http_method)
            .bind(&row.protocol)
            .bind(&row.domain_name)
            .bind(&row.path)
            .bind(&row.resource_path)
            .bind(&row.user_agent)
            .bind(row.status)
            .bind(row.response_latency)
            .bind(&row.error_message)
            .bind(&row.response_type)
            .bind(row.response_length)
            .bind(row.integration_status)
            .bind(row.integration_latency)
            .bind(&row.integration_error)
            .bind(&row.ip)
            .bind(&row.caller)
            .bind(&row.user)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

fn db_error(err: sqlx::Error) -> Error {
    Error::Database(err.to_string())
}

fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|(name, ty)| format!("    {name} {ty}"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    id BIGSERIAL PRIMARY KEY,\n{}\n)",
        columns.join(",\n")
    )
}

fn insert_sql(table: &str) -> String {
    let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
    let params: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        params.join(", ")
    )
}
