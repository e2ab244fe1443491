//! Expiry Table - an in-process cache table
//!
//! Items carry their own sliding lifespans. The table wakes exactly when the
//! next item is due instead of polling, loads missing keys on demand and
//! notifies observers on insertion, deletion and expiry.

pub mod cache;
pub mod config;
pub mod error;
pub mod logger;
pub mod tasks;

pub use cache::{CacheStats, Item, Table};
pub use config::TableConfig;
pub use error::{CacheError, Result};
pub use logger::{Logger, TracingLogger};
pub use tasks::{ManualTimer, Timer, TokioTimer};
