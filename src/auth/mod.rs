//! # Auth Module
//!
//! This module handles the session side of the dashboard:
//! - Credential persistence with expiry-driven invalidation
//! - Login, registration and logout through an auth provider
//! - The background session-expiry watch
//! - AuthedUser gate for privileged operations

pub mod extractors;
pub mod models;
pub mod provider;
pub mod session;
pub mod store;
pub mod validators;


pub use extractors::AuthedUser;
pub use models::{Credential, SessionState, User};
pub use provider::{AuthProvider, LocalAuthProvider};
pub use session::SessionManager;
pub use store::{CredentialStore, JsonFileStore, KeyValueStore, Lookup, MemoryStore};
