//! Remote data provider boundary
//!
//! The backing store behind the bound sheets. The core only relies on the
//! trait; [`StubRemoteProvider`] is an in-process stand-in with optional
//! latency and failure injection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::{Column, ColumnOrigin, ColumnSpec};
use crate::common::id_generator::{generate_unique_id, EntityPrefix};
use crate::common::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Table not found: {0}")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl From<ProviderError> for CoreError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(id) => CoreError::NotFound(format!("table {}", id)),
            ProviderError::Transport(msg) => CoreError::Transport(msg),
        }
    }
}

/// Schema of a table as the remote side knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTable {
    pub id: String,
    pub source_locator: String,
    pub columns: Vec<Column>,
}

#[async_trait]
pub trait RemoteDataProvider: Send + Sync {
    async fn create_remote_table(
        &self,
        columns: &[ColumnSpec],
        source_locator: &str,
    ) -> Result<RemoteTable, ProviderError>;

    async fn list_remote_tables(&self) -> Result<Vec<RemoteTable>, ProviderError>;

    async fn fetch_remote_table(&self, table_id: &str) -> Result<RemoteTable, ProviderError>;

    async fn add_remote_column(
        &self,
        table_id: &str,
        column: &ColumnSpec,
    ) -> Result<Column, ProviderError>;
}

#[derive(Debug, Default)]
pub struct StubRemoteProvider {
    tables: RwLock<Vec<RemoteTable>>,
    latency: Duration,
    offline: AtomicBool,
    failures_pending: AtomicUsize,
}

impl StubRemoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// While offline every call fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next `count` calls fail with a transport error
    pub fn fail_next(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Simulate the sheet gaining a column upstream, outside this client
    pub async fn push_upstream_column(
        &self,
        table_id: &str,
        column: &ColumnSpec,
    ) -> Result<Column, ProviderError> {
        self.insert_column(table_id, column, ColumnOrigin::External)
            .await
    }

    async fn round_trip(&self, op: &'static str) -> Result<(), ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            warn!(op = op, "Remote provider offline");
            return Err(ProviderError::Transport(format!("{}: provider offline", op)));
        }

        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!(op = op, "Injected remote provider failure");
            return Err(ProviderError::Transport(format!("{}: connection reset", op)));
        }

        Ok(())
    }

    async fn insert_column(
        &self,
        table_id: &str,
        spec: &ColumnSpec,
        origin: ColumnOrigin,
    ) -> Result<Column, ProviderError> {
        let mut tables = self.tables.write().await;
        let table = tables
            .iter_mut()
            .find(|t| t.id == table_id)
            .ok_or_else(|| ProviderError::NotFound(table_id.to_string()))?;

        let id = generate_unique_id(EntityPrefix::Column, |candidate| {
            table.columns.iter().any(|c| c.id == candidate)
        });
        let column = Column {
            id,
            name: spec.name.clone(),
            data_type: spec.data_type,
            origin,
        };
        table.columns.push(column.clone());
        Ok(column)
    }
}

#[async_trait]
impl RemoteDataProvider for StubRemoteProvider {
    async fn create_remote_table(
        &self,
        columns: &[ColumnSpec],
        source_locator: &str,
    ) -> Result<RemoteTable, ProviderError> {
        self.round_trip("create_remote_table").await?;

        let mut tables = self.tables.write().await;
        let table_id = generate_unique_id(EntityPrefix::Table, |candidate| {
            tables.iter().any(|t| t.id == candidate)
        });

        let mut remote_columns: Vec<Column> = Vec::with_capacity(columns.len());
        for spec in columns {
            let id = generate_unique_id(EntityPrefix::Column, |candidate| {
                remote_columns.iter().any(|c| c.id == candidate)
            });
            remote_columns.push(Column {
                id,
                name: spec.name.clone(),
                data_type: spec.data_type,
                origin: ColumnOrigin::External,
            });
        }

        let table = RemoteTable {
            id: table_id,
            source_locator: source_locator.to_string(),
            columns: remote_columns,
        };
        tables.push(table.clone());

        debug!(table_id = %table.id, columns = table.columns.len(), "Remote table created");
        Ok(table)
    }

    async fn list_remote_tables(&self) -> Result<Vec<RemoteTable>, ProviderError> {
        self.round_trip("list_remote_tables").await?;
        Ok(self.tables.read().await.clone())
    }

    async fn fetch_remote_table(&self, table_id: &str) -> Result<RemoteTable, ProviderError> {
        self.round_trip("fetch_remote_table").await?;
        self.tables
            .read()
            .await
            .iter()
            .find(|t| t.id == table_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(table_id.to_string()))
    }

    async fn add_remote_column(
        &self,
        table_id: &str,
        column: &ColumnSpec,
    ) -> Result<Column, ProviderError> {
        self.round_trip("add_remote_column").await?;
        let column = self.insert_column(table_id, column, ColumnOrigin::Local).await?;
        debug!(table_id = %table_id, column_id = %column.id, "Remote column added");
        Ok(column)
    }
}
