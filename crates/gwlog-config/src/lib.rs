//! gwlog configuration loading and validation.
//!
//! This crate provides:
//! - The typed [`IngestConfig`] shared by the fetch and load phases
//! - Config resolution (CLI → env → JSON file → defaults)
//! - Semantic validation

pub mod ingest;
pub mod resolve;

pub use ingest::{ConfigError, IngestConfig, ValidationPolicy};
pub use resolve::{resolve_config, resolve_config_with, ConfigOverrides};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
