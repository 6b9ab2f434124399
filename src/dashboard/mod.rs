//! # Dashboard Module
//!
//! The surface a front end drives: gates table work behind a valid session,
//! turns each user action into exactly one notification and tells the
//! caller where to navigate. It never navigates itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{AuthedUser, SessionManager, SessionState};
use crate::common::{AppState, CoreError};
use crate::services::{Notifier, TaskHandle};
use crate::tables::{
    Column, ColumnSpec, SyncGate, SyncOutcome, Synchronizer, Table, TableRegistry,
};

#[cfg(test)]
mod tests;

pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

/// Where the caller should take the user next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationIntent {
    Login,
    Dashboard,
}

/// Navigation implied by a failed operation, if any
pub fn redirect_for(err: &CoreError) -> Option<NavigationIntent> {
    match err {
        CoreError::Unauthorized(_) => Some(NavigationIntent::Login),
        _ => None,
    }
}

type TableWatches = Arc<Mutex<HashMap<String, TaskHandle>>>;

fn stop_table_watches(watches: &TableWatches) -> usize {
    let drained: Vec<TaskHandle> = watches
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .drain()
        .map(|(_, handle)| handle)
        .collect();
    for handle in &drained {
        handle.cancel();
    }
    drained.len()
}

pub struct Dashboard {
    session: SessionManager,
    registry: Arc<TableRegistry>,
    synchronizer: Synchronizer,
    notifier: Arc<dyn Notifier>,
    sync_interval: Duration,
    expiry_check_interval: Duration,
    auth_refresh_interval: Duration,
    table_watches: TableWatches,
    session_tasks: Mutex<Vec<TaskHandle>>,
}

impl Dashboard {
    pub fn new(state: &AppState) -> Self {
        Self {
            session: state.session.clone(),
            registry: state.registry.clone(),
            synchronizer: state.synchronizer.clone(),
            notifier: state.notifier.clone(),
            sync_interval: state.config.sync_interval(),
            expiry_check_interval: state.config.expiry_check_interval(),
            auth_refresh_interval: state.config.auth_refresh_interval(),
            table_watches: Arc::new(Mutex::new(HashMap::new())),
            session_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Where a freshly opened client should land
    pub async fn landing(&self) -> NavigationIntent {
        if self.session.is_authenticated().await {
            NavigationIntent::Dashboard
        } else {
            NavigationIntent::Login
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<NavigationIntent, CoreError> {
        match self.session.login(email, password).await {
            Ok(_) => {
                self.notifier.success("Logged in successfully!");
                Ok(NavigationIntent::Dashboard)
            }
            Err(e) => {
                self.notifier.error(if e.is_validation() {
                    "Please fill all fields"
                } else {
                    "Authentication failed. Please try again."
                });
                Err(e)
            }
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<NavigationIntent, CoreError> {
        match self.session.register(email, password, name).await {
            Ok(_) => {
                self.notifier.success("Account created successfully!");
                Ok(NavigationIntent::Dashboard)
            }
            Err(e) => {
                self.notifier.error(if e.is_validation() {
                    "Please fill all fields"
                } else {
                    "Authentication failed. Please try again."
                });
                Err(e)
            }
        }
    }

    /// End the session and stop every table watch
    pub async fn logout(&self) -> NavigationIntent {
        let stopped = stop_table_watches(&self.table_watches);
        self.session.logout().await;
        debug!(stopped_watches = stopped, "Table watches stopped on logout");
        self.notifier.success("Logged out successfully");
        NavigationIntent::Login
    }

    async fn require_session(&self) -> Result<AuthedUser, CoreError> {
        AuthedUser::from_session(&self.session).await
    }

    pub async fn create_table(
        &self,
        columns: Vec<ColumnSpec>,
        source_locator: &str,
    ) -> Result<Table, CoreError> {
        let user = self.require_session().await?;

        match self.registry.create(columns, source_locator).await {
            Ok(table) => {
                info!(user_id = %user.id, table_id = %table.id, "Dashboard table created");
                self.notifier.success("Table created successfully");
                Ok(table)
            }
            Err(e) => {
                self.notifier.error(if e.is_validation() {
                    "Failed to create table"
                } else {
                    "Failed to create table. Please try again."
                });
                Err(if e.is_validation() { e } else { e.logged() })
            }
        }
    }

    pub async fn tables(&self) -> Result<Vec<Table>, CoreError> {
        self.require_session().await?;
        Ok(self.registry.list().await)
    }

    pub async fn open_table(&self, table_id: &str) -> Result<Table, CoreError> {
        self.require_session().await?;
        self.registry.get(table_id).await.map_err(|e| {
            self.notifier.error("Failed to load table data");
            e
        })
    }

    pub async fn add_column(&self, table_id: &str, spec: ColumnSpec) -> Result<Column, CoreError> {
        self.require_session().await?;

        match self.synchronizer.add_column(table_id, spec).await {
            Ok(column) => {
                self.notifier.success(&format!("Added {} column", column.name));
                Ok(column)
            }
            Err(e) => {
                self.notifier.error(if e.is_validation() {
                    "Please enter a column name"
                } else {
                    "Failed to add column"
                });
                Err(if e.is_validation() { e } else { e.logged() })
            }
        }
    }

    /// One synchronization pass outside the polling loop
    pub async fn refresh_table(&self, table_id: &str) -> Result<SyncOutcome, CoreError> {
        self.require_session().await?;
        self.synchronizer.synchronize(table_id).await.map_err(|e| {
            self.notifier.error("Failed to refresh table data");
            e.logged()
        })
    }

    /// Formatted rows of a table, ready for display
    pub async fn render_table(&self, table_id: &str) -> Result<Vec<Vec<String>>, CoreError> {
        self.require_session().await?;
        self.synchronizer.render(table_id).await
    }

    /// Start polling a table. Watching it again restarts its loop.
    ///
    /// Ticks are skipped while the session is anonymous, so a loop outliving
    /// its session never reaches the sheet.
    pub async fn watch_table(&self, table_id: &str) -> Result<(), CoreError> {
        self.require_session().await?;
        self.registry.get(table_id).await?;

        let session = self.session.clone();
        let gate: SyncGate = Arc::new(move || session.state() == SessionState::Authenticated);
        let handle = self
            .synchronizer
            .start_sync_while(table_id, self.sync_interval, gate);
        let previous = self
            .table_watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table_id.to_string(), handle);
        if let Some(previous) = previous {
            previous.cancel();
        }

        info!(table_id = %table_id, interval_secs = self.sync_interval.as_secs(), "👀 Watching table");
        Ok(())
    }

    /// Stop polling a table; false when it was not being watched
    pub fn unwatch_table(&self, table_id: &str) -> bool {
        let removed = self
            .table_watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(table_id);
        match removed {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn watched_tables(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .table_watches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Start the session expiry watch and the auth-state refresh.
    ///
    /// On expiry every table watch stops, one notification goes out and
    /// `on_navigate` receives the login intent.
    pub fn start_session_watch<F>(&self, on_navigate: F)
    where
        F: Fn(NavigationIntent) + Send + Sync + 'static,
    {
        let notifier = self.notifier.clone();
        let watches = self.table_watches.clone();

        let expiry = self.session.start_expiry_watch(
            move || {
                let stopped = stop_table_watches(&watches);
                warn!(stopped_watches = stopped, "Session expired, returning to login");
                notifier.error(SESSION_EXPIRED_NOTICE);
                on_navigate(NavigationIntent::Login);
            },
            self.expiry_check_interval,
        );
        let refresh = self.session.start_state_refresh(self.auth_refresh_interval);

        let mut tasks = self.session_tasks.lock().unwrap_or_else(|e| e.into_inner());
        // Restarting replaces the previous pair
        for task in tasks.drain(..) {
            task.cancel();
        }
        tasks.push(expiry);
        tasks.push(refresh);
    }

    /// Cancel every recurring task this dashboard started
    pub fn shutdown(&self) {
        let stopped = stop_table_watches(&self.table_watches);
        let mut tasks = self.session_tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.cancel();
        }
        info!(stopped_watches = stopped, "Dashboard shut down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        stop_table_watches(&self.table_watches);
    }
}
