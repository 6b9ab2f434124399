//! Table registry: the single owner of every table

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::{ColumnOrigin, ColumnSpec, CreateTableRequest, Table};
use super::policy::RowGenerationPolicy;
use super::provider::RemoteDataProvider;
use crate::common::{CoreError, Validator};
use crate::services::Clock;

pub struct TableRegistry {
    tables: RwLock<Vec<Table>>,
    provider: Arc<dyn RemoteDataProvider>,
    policy: Arc<dyn RowGenerationPolicy>,
    clock: Arc<dyn Clock>,
    seed_row_count: usize,
}

impl TableRegistry {
    pub fn new(
        provider: Arc<dyn RemoteDataProvider>,
        policy: Arc<dyn RowGenerationPolicy>,
        clock: Arc<dyn Clock>,
        seed_row_count: usize,
    ) -> Self {
        Self {
            tables: RwLock::new(Vec::new()),
            provider,
            policy,
            clock,
            seed_row_count,
        }
    }

    /// Create a table bound to `source_locator` with `columns` as its
    /// external schema, seeded with an initial batch of rows.
    ///
    /// Either the table is fully registered or nothing is: validation runs
    /// before the remote call, and the local insert happens only after the
    /// remote side accepted the table.
    pub async fn create(
        &self,
        columns: Vec<ColumnSpec>,
        source_locator: &str,
    ) -> Result<Table, CoreError> {
        let request = CreateTableRequest {
            columns,
            source_locator: source_locator.trim().to_string(),
        };

        let validation = request.validate(&request);
        if !validation.is_valid {
            warn!(errors = %validation.summary(), "Table creation rejected");
            return Err(CoreError::InvalidSchema(validation.summary()));
        }

        let remote = self
            .provider
            .create_remote_table(&request.columns, &request.source_locator)
            .await?;

        let columns = remote
            .columns
            .into_iter()
            .map(|mut column| {
                column.origin = ColumnOrigin::External;
                column
            })
            .collect();

        let today = self.clock.today();
        let mut tables = self.tables.write().await;

        let mut table = Table::new(
            remote.id,
            format!("Table {}", tables.len() + 1),
            request.source_locator,
            columns,
        );
        for _ in 0..self.seed_row_count {
            let row = self.policy.generate_row(table.columns(), today);
            table.push_row(row);
        }

        tables.push(table.clone());

        info!(
            table_id = %table.id,
            name = %table.name,
            columns = table.columns().len(),
            rows = table.rows().len(),
            "📋 Table created"
        );
        Ok(table)
    }

    /// Snapshot of every table, in creation order
    pub async fn list(&self) -> Vec<Table> {
        self.tables.read().await.clone()
    }

    /// Snapshot of one table
    pub async fn get(&self, table_id: &str) -> Result<Table, CoreError> {
        self.tables
            .read()
            .await
            .iter()
            .find(|t| t.id == table_id)
            .cloned()
            .ok_or_else(|| {
                debug!(table_id = %table_id, "Table lookup missed");
                CoreError::NotFound(format!("table {}", table_id))
            })
    }

    pub async fn contains(&self, table_id: &str) -> bool {
        self.tables.read().await.iter().any(|t| t.id == table_id)
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }

    /// Apply `mutate` to one table under the registry write lock.
    ///
    /// This is the only way a table changes after creation, so readers see
    /// either the state before `mutate` or after it. If `mutate` fails the
    /// table is left as it was.
    pub(crate) async fn update<F, R>(&self, table_id: &str, mutate: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Table) -> Result<R, CoreError>,
    {
        let mut tables = self.tables.write().await;
        let table = tables
            .iter_mut()
            .find(|t| t.id == table_id)
            .ok_or_else(|| CoreError::NotFound(format!("table {}", table_id)))?;

        let mut draft = table.clone();
        let result = mutate(&mut draft)?;
        *table = draft;
        Ok(result)
    }
}
