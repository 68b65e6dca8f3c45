//! Parsing and validation of `ember.toml` configuration files.
//!
//! This crate reads the optional configuration file and produces a strongly-typed
//! [`EmberConfig`] holding the simulation and lowering settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_dir, load_config_from_str};
pub use types::*;
