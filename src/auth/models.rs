//! Authentication data models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::common::CoreError;

/// JWT claims carried by the session token
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub jti: String,
}

/// Identity of the session holder
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Locally held proof of an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential valid for `ttl` starting at `issued_at`.
    ///
    /// A non-positive `ttl` would violate `expires_at > issued_at` and is
    /// rejected.
    pub fn issue(
        user: User,
        token: String,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, CoreError> {
        if ttl <= Duration::zero() {
            return Err(CoreError::Validation(
                "credential lifetime must be positive".to_string(),
            ));
        }

        Ok(Self {
            subject_id: user.id,
            display_name: user.name,
            email: user.email,
            token,
            issued_at,
            expires_at: issued_at + ttl,
        })
    }

    /// A credential is valid strictly before its expiry instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn user(&self) -> User {
        User {
            id: self.subject_id.clone(),
            name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Identity payload as persisted under the user key
#[derive(Serialize, Deserialize, Debug)]
pub struct StoredIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Epoch milliseconds
    pub issued_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Token plus identity handed back by an [`AuthProvider`](super::provider::AuthProvider)
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Anonymous,
}
