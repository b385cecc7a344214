//! Per-line "mutation in flight" tracking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CartError, LineItemKey};

/// Keys of cart lines with a quantity update or removal in flight.
///
/// Cheaply cloneable; clones share the same set. A key is held by a
/// [`LoadingGuard`] and released when the guard drops, on success, error
/// or early return alike.
#[derive(Debug, Clone, Default)]
pub struct LoadingSet {
    inner: Arc<Mutex<HashSet<LineItemKey>>>,
}

impl LoadingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<LineItemKey>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `key` as loading.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::MutationInFlight`] if the key is already loading.
    pub fn try_begin(&self, key: LineItemKey) -> Result<LoadingGuard, CartError> {
        if !self.keys().insert(key.clone()) {
            return Err(CartError::MutationInFlight(key));
        }
        Ok(LoadingGuard {
            set: self.clone(),
            key,
        })
    }

    #[must_use]
    pub fn is_loading(&self, key: &LineItemKey) -> bool {
        self.keys().contains(key)
    }

    /// Copy of the keys currently loading.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<LineItemKey> {
        self.keys().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

/// Releases its key from the [`LoadingSet`] on drop.
#[derive(Debug)]
#[must_use = "the key stops loading as soon as the guard is dropped"]
pub struct LoadingGuard {
    set: LoadingSet,
    key: LineItemKey,
}

impl LoadingGuard {
    #[must_use]
    pub const fn key(&self) -> &LineItemKey {
        &self.key
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.set.keys().remove(&self.key);
    }
}
