//! Cache Module
//!
//! Provides an in-memory cache table with per-item sliding expiration,
//! get-or-load on miss and lifecycle callbacks.

mod callbacks;
mod item;
mod scheduler;
mod stats;
mod table;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use callbacks::{Callback, Callbacks};
pub use item::Item;
pub use stats::CacheStats;
pub use table::{Loader, Table};
