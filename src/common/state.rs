// Application state shared across all modules

use std::sync::Arc;
use tracing::info;

use crate::auth::{
    CredentialStore, JsonFileStore, KeyValueStore, LocalAuthProvider, MemoryStore, SessionManager,
};
use crate::common::config::AppConfig;
use crate::common::CoreError;
use crate::services::{Clock, Notifier, SystemClock};
use crate::tables::{
    RandomRowPolicy, RemoteDataProvider, RowGenerationPolicy, StubRemoteProvider, Synchronizer,
    TableRegistry,
};

/// Application state containing configuration and the wired-up services
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub session: SessionManager,
    pub provider: Arc<dyn RemoteDataProvider>,
    pub registry: Arc<TableRegistry>,
    pub synchronizer: Synchronizer,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Wire every service from `config`, on the system clock and the stub
    /// remote collaborators.
    pub async fn build(config: AppConfig, notifier: Arc<dyn Notifier>) -> Result<Self, CoreError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let kv: Arc<dyn KeyValueStore> = match &config.session_store_path {
            Some(path) => {
                info!(path = %path.display(), "Persisting sessions to file");
                Arc::new(JsonFileStore::open(path).await?)
            }
            None => Arc::new(MemoryStore::new()),
        };

        let auth_provider = LocalAuthProvider::new(
            config.jwt_secret.clone(),
            config.token_ttl(),
            clock.clone(),
        )
        .with_latency(config.simulated_latency());

        let provider: Arc<dyn RemoteDataProvider> =
            Arc::new(StubRemoteProvider::new().with_latency(config.simulated_latency()));
        let policy: Arc<dyn RowGenerationPolicy> = Arc::new(RandomRowPolicy::new(
            config.new_row_probability,
            config.date_window_days,
        ));

        let session = SessionManager::new(
            Arc::new(CredentialStore::new(kv)),
            Arc::new(auth_provider),
            clock.clone(),
            config.token_ttl(),
        );

        Ok(Self::assemble(config, session, provider, policy, clock, notifier))
    }

    /// Put an already-built session manager and remote provider together
    /// with a fresh registry and synchronizer.
    pub fn assemble(
        config: AppConfig,
        session: SessionManager,
        provider: Arc<dyn RemoteDataProvider>,
        policy: Arc<dyn RowGenerationPolicy>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = Arc::new(TableRegistry::new(
            provider.clone(),
            policy.clone(),
            clock.clone(),
            config.seed_row_count,
        ));
        let synchronizer = Synchronizer::new(
            registry.clone(),
            provider.clone(),
            policy,
            clock,
            notifier.clone(),
        );

        Self {
            config,
            session,
            provider,
            registry,
            synchronizer,
            notifier,
        }
    }
}
