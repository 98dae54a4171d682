//! Configuration management for Surge.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file (`surge.toml`
//! in the working directory, `./config`, or the user config directory), then environment
//! variables. The binary applies command-line overrides on top.
//!
//! # Environment
//!
//! | Variable | Key |
//! |---|---|
//! | `KAFKA_BROKERS` | `broker.brokers` (comma-separated) |
//! | `KAFKA_TOPIC` | `broker.topic` |
//! | `SCENARIO` | `run.scenario` |
//! | `SURGE_<SECTION>__<KEY>` | `<section>.<key>` |
//!
//! # Examples
//!
//! ```rust,no_run
//! use surge_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! println!("producing to {} on {}", config.broker.topic, config.broker.brokers);
//! # Ok::<(), surge_core::Error>(())
//! ```

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::*;

use crate::Result;
use std::path::Path;

/// Load configuration from the default search paths and the process environment.
pub fn load_default() -> Result<LoadGenConfig> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file plus the process environment.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoadGenConfig> {
    ConfigLoader::new().with_file(path).load()
}
