//! Per-city-count memo of subset collections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use super::{SubsetCollection, SubsetEnumerator};
use crate::error::Result;

/// Shares one [`SubsetCollection`] between models of the same city count.
#[derive(Debug, Default)]
pub struct SubsetCache {
    collections: Mutex<HashMap<usize, Arc<SubsetCollection>>>,
}

impl SubsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached collection for the enumerator's city count,
    /// enumerating it on first use.
    ///
    /// Limits are re-checked on every call so a cache hit never bypasses a
    /// stricter `max_subsets` than the one that filled the entry.
    pub fn get_or_enumerate(&self, enumerator: &SubsetEnumerator) -> Result<Arc<SubsetCollection>> {
        enumerator.check_limits()?;
        let n = enumerator.city_count();

        if let Some(hit) = self.lock().get(&n) {
            trace!(city_count = n, "Subset cache hit");
            return Ok(Arc::clone(hit));
        }

        // Enumerate outside the lock; a concurrent miss for the same size
        // produces an identical collection.
        let collection = Arc::new(enumerator.enumerate()?);
        let entry = Arc::clone(self.lock().entry(n).or_insert(collection));
        Ok(entry)
    }

    /// Number of cached city counts.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Arc<SubsetCollection>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
