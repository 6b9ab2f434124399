//! Schema/row synchronization
//!
//! Merges locally-added columns with the columns the bound sheet provides,
//! appends newly observed upstream rows, and formats cells for display.
//! Existing rows are never rewritten or reordered here.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{Column, ColumnOrigin, ColumnSpec, ColumnType, SyncOutcome};
use super::policy::{RowGenerationPolicy, ISO_DATE_FORMAT};
use super::provider::RemoteDataProvider;
use super::registry::TableRegistry;
use crate::common::{CoreError, Validator};
use crate::services::{spawn_periodic, Clock, FirstRun, Notifier, TaskHandle};

/// Decides, per tick, whether a polling loop may sync
pub type SyncGate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Long display form, e.g. "Jan 5, 2024"
pub const DISPLAY_DATE_FORMAT: &str = "%b %-d, %Y";

/// Formats accepted for date cells besides ISO dates
const FALLBACK_DATE_FORMATS: [&str; 3] = ["%Y/%m/%d", "%m/%d/%Y", "%d %b %Y"];

/// Render a raw cell value for display.
///
/// Empty input renders empty. Date cells that do not parse are shown as-is.
pub fn format_cell(raw: &str, data_type: ColumnType) -> String {
    if raw.is_empty() {
        return String::new();
    }

    match data_type {
        ColumnType::Text => raw.to_string(),
        ColumnType::Date => match parse_date(raw) {
            Some(date) => date.format(DISPLAY_DATE_FORMAT).to_string(),
            None => raw.to_string(),
        },
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

#[derive(Clone)]
pub struct Synchronizer {
    registry: Arc<TableRegistry>,
    provider: Arc<dyn RemoteDataProvider>,
    policy: Arc<dyn RowGenerationPolicy>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Synchronizer {
    pub fn new(
        registry: Arc<TableRegistry>,
        provider: Arc<dyn RemoteDataProvider>,
        policy: Arc<dyn RowGenerationPolicy>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            provider,
            policy,
            clock,
            notifier,
        }
    }

    /// Append a local column to the table and backfill an empty value for
    /// it in every existing row.
    pub async fn add_column(&self, table_id: &str, spec: ColumnSpec) -> Result<Column, CoreError> {
        let validation = spec.validate(&spec);
        if !validation.is_valid {
            warn!(table_id = %table_id, errors = %validation.summary(), "Column rejected");
            return Err(CoreError::from(validation));
        }

        // Unknown tables fail before anything reaches the remote side
        if !self.registry.contains(table_id).await {
            return Err(CoreError::NotFound(format!("table {}", table_id)));
        }

        let mut column = self.provider.add_remote_column(table_id, &spec).await?;
        column.origin = ColumnOrigin::Local;

        let appended = column.clone();
        let rows = self
            .registry
            .update(table_id, move |table| {
                // A concurrent sync tick may already have merged it from upstream
                if !table.has_column(&appended.id) {
                    table.push_column(appended)?;
                }
                Ok(table.rows().len())
            })
            .await?;

        info!(
            table_id = %table_id,
            column_id = %column.id,
            name = %column.name,
            data_type = %column.data_type,
            backfilled_rows = rows,
            "➕ Column added"
        );
        Ok(column)
    }

    /// One reconciliation tick against the bound source.
    ///
    /// Columns the source knows and the table does not are appended (and
    /// backfilled empty). Then, if the row policy reports a new upstream
    /// row, one row built from the table's current columns is appended.
    pub async fn synchronize(&self, table_id: &str) -> Result<SyncOutcome, CoreError> {
        let remote = self.provider.fetch_remote_table(table_id).await?;
        let today = self.clock.today();
        let policy = self.policy.clone();

        let outcome = self
            .registry
            .update(table_id, move |table| {
                let mut columns_added = Vec::new();
                for column in remote.columns {
                    if !table.has_column(&column.id) {
                        table.push_column(column.clone())?;
                        columns_added.push(column);
                    }
                }

                let row_appended = policy.should_append();
                if row_appended {
                    let row = policy.generate_row(table.columns(), today);
                    table.push_row(row);
                }

                Ok(SyncOutcome {
                    columns_added,
                    row_appended,
                    row_count: table.rows().len(),
                })
            })
            .await?;

        if outcome.is_unchanged() {
            debug!(table_id = %table_id, rows = outcome.row_count, "Sync tick: no upstream changes");
        } else {
            info!(
                table_id = %table_id,
                columns_added = outcome.columns_added.len(),
                row_appended = outcome.row_appended,
                rows = outcome.row_count,
                "🔄 Table synchronized"
            );
        }
        Ok(outcome)
    }

    /// Formatted grid of the table, one `Vec` per row in column order
    pub async fn render(&self, table_id: &str) -> Result<Vec<Vec<String>>, CoreError> {
        let table = self.registry.get(table_id).await?;
        Ok(table
            .rows()
            .iter()
            .map(|row| {
                table
                    .columns()
                    .iter()
                    .map(|column| format_cell(row.get(&column.id).unwrap_or_default(), column.data_type))
                    .collect()
            })
            .collect())
    }

    /// Start the per-table polling loop. The first tick runs immediately.
    ///
    /// A failed tick produces one error notification and the loop carries
    /// on with the next tick.
    pub fn start_sync(&self, table_id: &str, interval: Duration) -> TaskHandle {
        self.start_sync_while(table_id, interval, Arc::new(|| true))
    }

    /// Like [`start_sync`](Self::start_sync), but a tick only talks to the
    /// sheet while `active` holds. Skipped ticks are silent.
    pub fn start_sync_while(
        &self,
        table_id: &str,
        interval: Duration,
        active: SyncGate,
    ) -> TaskHandle {
        let sync = self.clone();
        let table_id = table_id.to_string();

        spawn_periodic(
            format!("table-sync:{}", table_id),
            interval,
            FirstRun::Immediately,
            move || {
                let sync = sync.clone();
                let table_id = table_id.clone();
                let active = active.clone();
                async move {
                    if !active() {
                        debug!(table_id = %table_id, "Sync tick skipped, gate closed");
                        return;
                    }
                    if let Err(e) = sync.synchronize(&table_id).await {
                        warn!(table_id = %table_id, code = e.code(), error = %e, "Sync tick failed");
                        sync.notifier.error("Failed to refresh table data");
                    }
                }
            },
        )
    }
}
