//! Authentication provider boundary
//!
//! The session manager never decides who a user is; it asks an
//! [`AuthProvider`] and persists whatever credential comes back.

use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::models::{AuthResponse, Claims, LoginRequest, RegisterRequest, User};
use crate::common::{generate_token_id, generate_user_id, safe_email_log, CoreError, Validator};
use crate::services::Clock;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a token and identity
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, CoreError>;

    /// Create an account and return its token and identity
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, CoreError>;
}

/// Self-contained provider: accepts any non-empty input and signs an HS256
/// token locally. Stands in for the remote auth backend.
pub struct LocalAuthProvider {
    jwt_secret: String,
    token_ttl: Duration,
    latency: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl LocalAuthProvider {
    pub fn new(jwt_secret: impl Into<String>, token_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl,
            latency: std::time::Duration::ZERO,
            clock,
        }
    }

    /// Delay every call by `latency` to mimic a network round trip
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn issue(&self, user: User) -> Result<AuthResponse, CoreError> {
        let exp = (self.clock.now() + self.token_ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: user.id.clone(),
            exp,
            jti: generate_token_id(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign session token");
            CoreError::Transport("failed to issue session token".to_string())
        })?;

        debug!(user_id = %user.id, jti = %claims.jti, "Issued session token");
        Ok(AuthResponse { user, token })
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, CoreError> {
        self.simulate_round_trip().await;

        if !request.validate(request).is_valid {
            warn!(email = %safe_email_log(&request.email), "Login rejected by auth provider");
            return Err(CoreError::InvalidCredentials);
        }

        // Display name defaults to the local part of the address
        let name = request
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();

        self.issue(User {
            id: generate_user_id(),
            name,
            email: request.email.clone(),
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, CoreError> {
        self.simulate_round_trip().await;

        if !request.validate(request).is_valid {
            warn!(email = %safe_email_log(&request.email), "Registration rejected by auth provider");
            return Err(CoreError::InvalidRegistration);
        }

        self.issue(User {
            id: generate_user_id(),
            name: request.name.clone(),
            email: request.email.clone(),
        })
    }
}
