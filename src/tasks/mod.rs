//! Background Tasks Module
//!
//! Contains the timer that drives a table's expiry checks.
//!
//! # Timers
//! - `TokioTimer`: one-shot wake-up spawned on a Tokio runtime
//! - `ManualTimer`: fires on demand, for deterministic tests

mod timer;

pub use timer::{ManualTimer, Timer, TimerTask, TokioTimer};
