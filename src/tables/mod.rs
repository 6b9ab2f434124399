//! # Tables Module
//!
//! This module handles the sheet-bound tables:
//! - Table registry (create, lookup, listing)
//! - Local columns merged with the columns of the external sheet
//! - Append-only row synchronization against the remote provider
//! - Column-typed cell formatting

pub mod models;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod sync;
pub mod validators;


pub use models::{Column, ColumnOrigin, ColumnSpec, ColumnType, Row, SyncOutcome, Table};
pub use policy::{FixedRowPolicy, RandomRowPolicy, RowGenerationPolicy};
pub use provider::{ProviderError, RemoteDataProvider, RemoteTable, StubRemoteProvider};
pub use registry::TableRegistry;
pub use sync::{format_cell, SyncGate, Synchronizer};
