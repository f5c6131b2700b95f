//! Mailstub Common - Shared types and utilities
//!
//! This crate provides configuration, error types, and server counters
//! shared across the Mailstub components.

pub mod config;
pub mod error;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use stats::ServerStats;
