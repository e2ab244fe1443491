//! Configuration Module
//!
//! Handles loading table configuration from environment variables.

use std::env;
use std::time::Duration;

use serde::Serialize;

/// Name given to tables created without explicit configuration.
pub const DEFAULT_TABLE_NAME: &str = "default";

/// Lifespan in seconds used by `Table::add_default` when nothing is configured.
pub const DEFAULT_LIFESPAN_SECS: u64 = 300;

/// Cache table configuration parameters.
///
/// Loader, logger and callbacks are not part of this struct: they are
/// closures and are installed on the table itself at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableConfig {
    /// Table name, used as context in log messages
    pub name: String,
    /// Lifespan applied by `Table::add_default`
    pub default_lifespan: Duration,
}

impl TableConfig {
    /// Creates a config with the given name and the default lifespan.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a new TableConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TABLE_NAME` - Table name (default: "default")
    /// - `CACHE_DEFAULT_LIFESPAN_SECS` - Default lifespan in seconds (default: 300)
    pub fn from_env() -> Self {
        Self {
            name: env::var("CACHE_TABLE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            default_lifespan: Duration::from_secs(
                env::var("CACHE_DEFAULT_LIFESPAN_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_LIFESPAN_SECS),
            ),
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            default_lifespan: Duration::from_secs(DEFAULT_LIFESPAN_SECS),
        }
    }
}
