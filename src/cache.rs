//! Name-keyed store of tracked objects, reclaimed by liveness sweep.

use std::any::Any;
use std::fmt;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::error::CacheError;
use crate::object::{Obs, Own};

/// String-keyed cache that owns its entries and reclaims the ones no longer
/// externally observed.
///
/// Names are unique while an entry exists. An entry becomes eligible for
/// reclamation exactly when no observer of it remains; [`clean`](Self::clean)
/// sweeps those out. Dropping the cache cleans first and reports any entry a
/// consumer is still observing as a leak.
pub struct NamedCache<T: ?Sized> {
    objects: IndexMap<String, Own<T>>,
}

impl<T: Any> NamedCache<T> {
    /// Constructs a new tracked object under `name` and returns an observer.
    ///
    /// Fails with [`CacheError::DuplicateName`] when the name is taken.
    pub fn create(&mut self, name: impl Into<String>, value: T) -> Result<Obs<T>, CacheError> {
        self.create_own(name, Own::new(value))
    }
}

impl<T: ?Sized> NamedCache<T> {
    pub fn new() -> NamedCache<T> {
        NamedCache {
            objects: IndexMap::new(),
        }
    }

    /// Stores a pre-built owner (possibly erased or carrying a custom
    /// destructor) under `name`.
    pub fn create_own(
        &mut self,
        name: impl Into<String>,
        own: Own<T>,
    ) -> Result<Obs<T>, CacheError> {
        match self.objects.entry(name.into()) {
            Entry::Occupied(entry) => Err(CacheError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                let obs = own.observe();
                entry.insert(own);
                Ok(obs)
            }
        }
    }

    /// Returns an observer for the named entry, or `None` when absent.
    /// A missing name is not an error.
    pub fn get(&self, name: &str) -> Option<Obs<T>> {
        self.objects.get(name).map(Own::observe)
    }

    pub fn has(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Removes and destroys every entry with zero outstanding observers;
    /// entries still observed are kept. Returns the number reclaimed.
    pub fn clean(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|name, own| {
            let keep = own.observers() > 0;
            if !keep {
                debug!("reclaiming unobserved cache entry '{name}'");
            }
            keep
        });
        before - self.objects.len()
    }

    /// Names of all currently stored entries, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<T: ?Sized> Default for NamedCache<T> {
    fn default() -> NamedCache<T> {
        NamedCache::new()
    }
}

impl<T: ?Sized> fmt::Debug for NamedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCache")
            .field("names", &self.names())
            .finish()
    }
}

impl<T: ?Sized> Drop for NamedCache<T> {
    fn drop(&mut self) {
        self.clean();
        if !self.objects.is_empty() {
            // a consumer held observers past the cache's own lifetime; the
            // entries are destroyed anyway and those observers dangle safely
            warn!(
                "named cache dropped with {} still-observed entries: {:?}",
                self.objects.len(),
                self.names()
            );
        }
    }
}
