// src/lib.rs
//! Core of a spreadsheet-backed dashboard: session lifecycle over a
//! persisted credential, a registry of sheet-bound tables, and the
//! synchronizer that keeps their rows current.

pub mod auth;
pub mod common;
pub mod dashboard;
pub mod services;
pub mod tables;
