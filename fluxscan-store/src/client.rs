//! The HTTP client for the columnar analytics store.

use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// A store-layer failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The HTTP request could not be completed.
    #[error("store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with an error status and body.
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// A row failed to encode or a result row failed to decode.
    #[error("store row encoding failed: {0}")]
    Row(#[from] serde_json::Error),
}

/// How an insert waits for visibility.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertMode {
    /// Hand off to the store's asynchronous ingest; no visibility wait.
    /// Used through historical sync.
    Async,
    /// Commit and wait so immediate queries return the new rows. Used
    /// within a few blocks of the chain tip.
    Sync,
}

/// Timing of one insert, fed back to the sync loop for backpressure.
#[derive(Copy, Clone, Debug)]
pub struct InsertStats {
    pub rows: usize,
    pub elapsed: Duration,
}

/// Connection settings for [`StoreClient`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Store endpoint, e.g. `http://127.0.0.1:8123`.
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: "http://127.0.0.1:8123".to_string(),
            database: "fluxscan".to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// An HTTP client for the analytics store.
///
/// The store's contract: async and synchronous row inserts, DDL and bulk
/// `ALTER ... UPDATE` execution, waiting on mutations, and JSON row
/// queries. Durability past the ingest hand-off is the store's concern.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    config: StoreConfig,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("url", &self.config.url)
            .field("database", &self.config.database)
            .finish()
    }
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(StoreClient { http, config })
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    fn request(&self, settings: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut request = self.http.post(&self.config.url).query(settings);
        if let Some(user) = &self.config.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.config.password {
            request = request.header("X-ClickHouse-Key", password);
        }
        request
    }

    async fn send(
        &self,
        settings: &[(&str, &str)],
        body: String,
    ) -> Result<(), StoreError> {
        let response = self.request(settings).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Execute a statement (DDL or bulk mutation).
    pub async fn execute(&self, sql: &str) -> Result<(), StoreError> {
        debug!(sql = sql.lines().next().unwrap_or(""), "store execute");
        self.send(&[], sql.to_string()).await
    }

    /// Execute a bulk `ALTER ... UPDATE`, waiting until the mutation has
    /// been applied on all parts before returning.
    pub async fn execute_mutation(&self, sql: &str) -> Result<(), StoreError> {
        debug!(sql = sql.lines().next().unwrap_or(""), "store mutation");
        self.send(&[("mutations_sync", "2")], sql.to_string()).await
    }

    /// Insert rows into `table` as JSONEachRow.
    pub async fn insert_rows<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        if rows.is_empty() {
            return Ok(InsertStats {
                rows: 0,
                elapsed: Duration::ZERO,
            });
        }

        let mut body = format!(
            "INSERT INTO {}.{} FORMAT JSONEachRow\n",
            self.config.database, table
        );
        for row in rows {
            body.push_str(&serde_json::to_string(row)?);
            body.push('\n');
        }

        let settings: &[(&str, &str)] = match mode {
            InsertMode::Async => &[("async_insert", "1"), ("wait_for_async_insert", "0")],
            InsertMode::Sync => &[("async_insert", "0")],
        };

        let started = Instant::now();
        self.send(settings, body).await?;
        let elapsed = started.elapsed();

        metrics::counter!("store.rows.inserted", rows.len() as u64, "table" => table.to_string());
        if elapsed > Duration::from_secs(5) {
            warn!(table, rows = rows.len(), ?elapsed, "slow store insert");
        }

        Ok(InsertStats {
            rows: rows.len(),
            elapsed,
        })
    }

    /// Run a query and decode its JSONEachRow output.
    pub async fn query_json<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, StoreError> {
        let body = format!("{sql} FORMAT JSONEachRow");
        let response = self.request(&[]).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}
