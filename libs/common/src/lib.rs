//! ASA manager common library
//!
//! Provides bootstrap functions shared by the library crates and the
//! service binary, including:
//! - logging initialization
//! - layered configuration loading
//! - pooled Redis client
//! - shutdown signal handling

#[cfg(feature = "redis")]
pub mod redis;

pub mod config_loader;
pub mod logging;
pub mod shutdown;

pub use config_loader::{get_string_config, load_layered};
pub use logging::LogConfig;
