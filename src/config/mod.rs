//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and TOML loading
//! - [`validation`]: startup checks that report every problem at once

pub mod types;
pub mod validation;

pub use types::{Config, ConfigError};
