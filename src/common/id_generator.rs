// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Generates human-readable, prefixed IDs using Crockford Base32 encoding.
//! Format: PREFIX_XXXXXX (e.g., T_K7NP3X for tables)
//!
//! Benefits:
//! - No ambiguous characters (excludes I, L, O, U)
//! - Case-insensitive
//! - ~1 billion combinations per entity type (32^6)
//! - Easy to read in logs and copy out of a terminal

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// User / credential subject (U_)
    User,
    /// Table bound to an external sheet (T_)
    Table,
    /// Column of a table (COL_)
    Column,
    /// Session token id, carried as the JWT `jti` (K_) - K for Key
    Token,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Table => "T",
            EntityPrefix::Column => "COL",
            EntityPrefix::Token => "K",
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID using Crockford Base32 encoding
///
/// # Example
/// ```
/// use sheetdash::common::id_generator::{generate_id, EntityPrefix};
///
/// let table_id = generate_id(EntityPrefix::Table);
/// assert!(table_id.starts_with("T_"));
/// ```
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(6))
}

/// Generate an ID that does not collide with any id accepted by `is_taken`.
///
/// 32^6 leaves a small but real collision chance once a table carries many
/// columns, so callers that need uniqueness within a scope go through here.
pub fn generate_unique_id<F>(prefix: EntityPrefix, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let candidate = generate_id(prefix);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

// ============================================================================
// Convenience functions for each entity type
// ============================================================================

/// Generate a User ID (U_XXXXXX)
pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

/// Generate a Token ID (K_XXXXXX)
pub fn generate_token_id() -> String {
    generate_id(EntityPrefix::Token)
}
