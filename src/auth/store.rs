//! Credential persistence
//!
//! The credential lives under three independent keys of a [`KeyValueStore`]:
//! the token, the JSON identity payload and the expiry instant as an
//! epoch-millisecond string. Missing or unparsable state reads as "no
//! session" rather than an error.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::models::{Credential, StoredIdentity};
use crate::common::helpers::safe_token_log;
use crate::common::CoreError;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "auth_user";
pub const EXPIRY_KEY: &str = "auth_token_expiry";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

/// Persistence boundary: string keys to string values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store; state is lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, so a session survives
/// restarts.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// or malformed one is logged and also starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Session file is malformed, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(entries)?;
        // Write-then-rename keeps the file whole if we die mid-write
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

/// What a credential read at some instant found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Valid(Credential),
    /// Expired, and cleared by this read
    Expired(Credential),
    Absent,
}

/// Credential store over a [`KeyValueStore`].
///
/// Multi-key writes happen under one write lock, so a reader sees either the
/// whole previous credential or the whole new one.
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    lock: RwLock<()>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: RwLock::new(()),
        }
    }

    /// Persist `credential`, replacing any previous one
    pub async fn save(&self, credential: &Credential) -> Result<(), CoreError> {
        let _guard = self.lock.write().await;

        let identity = StoredIdentity {
            id: credential.subject_id.clone(),
            name: credential.display_name.clone(),
            email: credential.email.clone(),
            issued_at: credential.issued_at.timestamp_millis(),
        };
        let identity_json = serde_json::to_string(&identity).map_err(StoreError::from)?;
        let expiry = credential.expires_at.timestamp_millis().to_string();

        let written = async {
            self.kv.set(TOKEN_KEY, &credential.token).await?;
            self.kv.set(USER_KEY, &identity_json).await?;
            self.kv.set(EXPIRY_KEY, &expiry).await
        }
        .await;

        if let Err(e) = written {
            error!(error = %e, "Failed to persist credential, rolling back");
            self.clear_unlocked().await;
            return Err(e.into());
        }

        debug!(
            token = %safe_token_log(&credential.token),
            expires_at = %credential.expires_at,
            "Credential saved"
        );
        Ok(())
    }

    /// The stored credential, if present and well-formed
    pub async fn load(&self) -> Option<Credential> {
        let _guard = self.lock.read().await;
        self.load_unlocked().await
    }

    /// Remove all credential keys. Idempotent; storage failures are logged.
    pub async fn clear(&self) {
        let _guard = self.lock.write().await;
        self.clear_unlocked().await;
    }

    /// Read the credential at `now`. An expired credential is cleared on
    /// the way and handed back as [`Lookup::Expired`].
    pub async fn lookup(&self, now: DateTime<Utc>) -> Lookup {
        let _guard = self.lock.write().await;
        match self.load_unlocked().await {
            Some(credential) if credential.is_valid_at(now) => Lookup::Valid(credential),
            Some(credential) => {
                debug!(expires_at = %credential.expires_at, "Credential expired, clearing");
                self.clear_unlocked().await;
                Lookup::Expired(credential)
            }
            None => Lookup::Absent,
        }
    }

    /// The stored credential if it is still valid at `now`. An expired
    /// credential is cleared on the way.
    pub async fn current(&self, now: DateTime<Utc>) -> Option<Credential> {
        match self.lookup(now).await {
            Lookup::Valid(credential) => Some(credential),
            Lookup::Expired(_) | Lookup::Absent => None,
        }
    }

    pub async fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.current(now).await.is_some()
    }

    /// Clear the stored credential only if it is expired at `now`, returning
    /// what was cleared. A credential saved concurrently that is still valid
    /// is left in place.
    pub async fn clear_if_expired(&self, now: DateTime<Utc>) -> Option<Credential> {
        let _guard = self.lock.write().await;
        match self.load_unlocked().await {
            Some(credential) if !credential.is_valid_at(now) => {
                self.clear_unlocked().await;
                Some(credential)
            }
            _ => None,
        }
    }

    async fn load_unlocked(&self) -> Option<Credential> {
        let read = async {
            Ok::<_, StoreError>((
                self.kv.get(TOKEN_KEY).await?,
                self.kv.get(USER_KEY).await?,
                self.kv.get(EXPIRY_KEY).await?,
            ))
        }
        .await;

        let (token, identity_json, expiry) = match read {
            Ok((Some(token), Some(identity), Some(expiry))) => (token, identity, expiry),
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read credential, treating as logged out");
                return None;
            }
        };

        let identity: StoredIdentity = match serde_json::from_str(&identity_json) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Stored identity is malformed, treating as logged out");
                return None;
            }
        };

        let expires_at = expiry
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        let issued_at = Utc.timestamp_millis_opt(identity.issued_at).single();

        match (issued_at, expires_at) {
            (Some(issued_at), Some(expires_at)) if expires_at > issued_at => Some(Credential {
                subject_id: identity.id,
                display_name: identity.name,
                email: identity.email,
                token,
                issued_at,
                expires_at,
            }),
            _ => {
                warn!(expiry = %expiry, "Stored credential times are invalid, treating as logged out");
                None
            }
        }
    }

    async fn clear_unlocked(&self) {
        for key in [TOKEN_KEY, USER_KEY, EXPIRY_KEY] {
            if let Err(e) = self.kv.remove(key).await {
                error!(key = %key, error = %e, "Failed to remove credential key");
            }
        }
    }
}
