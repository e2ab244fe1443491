//! Callback Chains
//!
//! Ordered callback sequences with explicit replace/append semantics.

use std::fmt;
use std::sync::Arc;

/// A single observer in a chain.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

// == Callback Chain ==
/// Ordered list of observers invoked front to back.
///
/// `set` clears the chain and installs one callback, `add` appends. Cloning
/// is cheap and yields a snapshot that can be fired without holding the lock
/// that guards the chain.
pub struct Callbacks<T: ?Sized> {
    chain: Vec<Callback<T>>,
}

impl<T: ?Sized> Callbacks<T> {
    pub fn new() -> Self {
        Self { chain: Vec::new() }
    }

    /// Replaces every registered callback with `f`.
    pub fn set(&mut self, f: Callback<T>) {
        self.chain.clear();
        self.chain.push(f);
    }

    /// Appends `f` after the existing callbacks.
    pub fn add(&mut self, f: Callback<T>) {
        self.chain.push(f);
    }

    pub fn clear(&mut self) {
        self.chain.clear();
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Invokes every callback in registration order.
    pub fn fire(&self, arg: &T) {
        for callback in &self.chain {
            callback(arg);
        }
    }
}

impl<T: ?Sized> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
        }
    }
}

impl<T: ?Sized> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("len", &self.chain.len())
            .finish()
    }
}
