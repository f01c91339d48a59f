//! Bulk record import and deduplication engine.
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod import;
pub mod input;
pub mod logging;
pub mod store;
pub mod types;
