//! Session lifecycle: login, registration, logout and expiry detection
//!
//! Two states, `Authenticated` and `Anonymous`. Only a successful login or
//! registration moves to `Authenticated`; logout, a failed validity check or
//! the expiry watch move back to `Anonymous`. The current state is published
//! on a watch channel for anything that renders it.

use chrono::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::models::{
    AuthResponse, Credential, LoginRequest, RegisterRequest, SessionState, User,
};
use super::provider::AuthProvider;
use super::store::{CredentialStore, Lookup};
use crate::common::{safe_email_log, CoreError, Validator};
use crate::services::{spawn_periodic, Clock, FirstRun, TaskHandle};

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<CredentialStore>,
    provider: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
    state_tx: Arc<watch::Sender<SessionState>>,
    // Serializes "mutate store, then publish state" so the published state
    // always matches the last store write
    transition: Arc<Mutex<()>>,
    // Bumped whenever any path clears an expired credential
    expirations: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(
        store: Arc<CredentialStore>,
        provider: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        token_ttl: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            store,
            provider,
            clock,
            token_ttl,
            state_tx: Arc::new(state_tx),
            transition: Arc::new(Mutex::new(())),
            expirations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pick up a session persisted by an earlier run. Call once after
    /// construction.
    pub async fn init(&self) -> SessionState {
        let state = self.refresh_state().await;
        if let Some(user) = self.current_user().await {
            info!(user_id = %user.id, email = %safe_email_log(&user.email), "Restored persisted session");
        }
        state
    }

    /// Log in with email and password. Both must be non-empty.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential, CoreError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let validation = request.validate(&request);
        if !validation.is_valid {
            warn!(
                email = %safe_email_log(email),
                errors = %validation.summary(),
                "Login rejected: missing fields"
            );
            return Err(CoreError::InvalidCredentials);
        }

        let response = self.provider.login(&request).await?;
        self.establish(response).await
    }

    /// Register a new account and log straight into it
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Credential, CoreError> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };

        let validation = request.validate(&request);
        if !validation.is_valid {
            warn!(
                email = %safe_email_log(email),
                errors = %validation.summary(),
                "Registration rejected: missing fields"
            );
            return Err(CoreError::InvalidRegistration);
        }

        let response = self.provider.register(&request).await?;
        self.establish(response).await
    }

    async fn establish(&self, response: AuthResponse) -> Result<Credential, CoreError> {
        let credential =
            Credential::issue(response.user, response.token, self.clock.now(), self.token_ttl)?;
        {
            let _transition = self.transition.lock().await;
            self.store.save(&credential).await?;
            self.publish(SessionState::Authenticated);
        }

        info!(
            user_id = %credential.subject_id,
            email = %safe_email_log(&credential.email),
            expires_at = %credential.expires_at,
            "🔐 Session established"
        );
        Ok(credential)
    }

    /// Drop the session. Always succeeds.
    pub async fn logout(&self) {
        {
            let _transition = self.transition.lock().await;
            self.store.clear().await;
            self.publish(SessionState::Anonymous);
        }
        info!("Session cleared by logout");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current_credential().await.is_some()
    }

    /// The valid credential, if any. Observing an expired one clears it
    /// and counts as an expiry for every running expiry watch.
    pub async fn current_credential(&self) -> Option<Credential> {
        let _transition = self.transition.lock().await;
        let credential = match self.store.lookup(self.clock.now()).await {
            Lookup::Valid(credential) => Some(credential),
            Lookup::Expired(expired) => {
                self.record_expiry(&expired);
                None
            }
            Lookup::Absent => None,
        };
        self.publish(if credential.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        });
        credential
    }

    pub async fn current_user(&self) -> Option<User> {
        self.store.load().await.map(|c| c.user())
    }

    pub async fn token(&self) -> Option<String> {
        self.store.load().await.map(|c| c.token)
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Start a recurring expiry check. `on_expired` runs once on the first
    /// tick after a credential expired and was cleared, whether this watch
    /// cleared it or another caller observed the expiry first.
    ///
    /// Expiries seen since the previous tick are reported together. If a
    /// fresh login already replaced the expired credential by the time of
    /// the tick, nothing is reported.
    ///
    /// Watches are independent: each one reports every expiry it sees.
    pub fn start_expiry_watch<F>(&self, on_expired: F, interval: std::time::Duration) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let session = self.clone();
        let on_expired = Arc::new(on_expired);
        let seen = Arc::new(AtomicU64::new(self.expirations.load(Ordering::SeqCst)));

        spawn_periodic(
            "session-expiry-watch",
            interval,
            FirstRun::AfterPeriod,
            move || {
                let session = session.clone();
                let on_expired = on_expired.clone();
                let seen = seen.clone();
                async move {
                    let report = {
                        let _transition = session.transition.lock().await;
                        let now = session.clock.now();
                        if let Some(expired) = session.store.clear_if_expired(now).await {
                            session.record_expiry(&expired);
                            session.publish(SessionState::Anonymous);
                        }

                        let total = session.expirations.load(Ordering::SeqCst);
                        let pending = total.saturating_sub(seen.swap(total, Ordering::SeqCst));
                        let active = session
                            .store
                            .load()
                            .await
                            .map_or(false, |c| c.is_valid_at(now));
                        pending > 0 && !active
                    };
                    if report {
                        on_expired();
                    }
                }
            },
        )
    }

    /// Start the recurring authentication-state refresh that keeps
    /// [`subscribe`](Self::subscribe) receivers current.
    pub fn start_state_refresh(&self, interval: std::time::Duration) -> TaskHandle {
        let session = self.clone();
        spawn_periodic(
            "session-state-refresh",
            interval,
            FirstRun::Immediately,
            move || {
                let session = session.clone();
                async move {
                    session.refresh_state().await;
                }
            },
        )
    }

    // Observes only: clearing an expired credential is left to the expiry
    // watch so it can still report the expiry
    async fn refresh_state(&self) -> SessionState {
        let _transition = self.transition.lock().await;
        let state = match self.store.load().await {
            Some(credential) if credential.is_valid_at(self.clock.now()) => {
                SessionState::Authenticated
            }
            _ => SessionState::Anonymous,
        };
        self.publish(state);
        state
    }

    fn record_expiry(&self, expired: &Credential) {
        self.expirations.fetch_add(1, Ordering::SeqCst);
        warn!(
            user_id = %expired.subject_id,
            expired_at = %expired.expires_at,
            "⏰ Session expired"
        );
    }

    fn publish(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }
}
