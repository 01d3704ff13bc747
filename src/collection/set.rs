use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::object::{Obs, Own};

/// Unordered collection of owning references with deferred erasure.
///
/// Elements are keyed by identity, so membership checks and erase marks are
/// O(1); iteration runs in insertion order. Same two-phase removal discipline
/// as [`OwnList`](crate::OwnList).
pub struct OwnSet<T: ?Sized> {
    items: IndexMap<usize, Own<T>>,
    erase_queue: RefCell<AHashSet<usize>>,
}

impl<T: Any> OwnSet<T> {
    /// Constructs a new tracked object in the set and returns an observer.
    pub fn insert(&mut self, value: T) -> Obs<T> {
        self.insert_own(Own::new(value))
    }
}

impl<T: ?Sized> OwnSet<T> {
    pub fn new() -> OwnSet<T> {
        OwnSet {
            items: IndexMap::new(),
            erase_queue: RefCell::new(AHashSet::new()),
        }
    }

    /// Stores a pre-built owner (possibly erased or carrying a custom
    /// destructor).
    pub fn insert_own(&mut self, own: Own<T>) -> Obs<T> {
        let obs = own.observe();
        self.items.insert(own.key(), own);
        obs
    }

    /// True iff the element aliased by `obs` is in the set, queued for erase
    /// or not.
    pub fn contains(&self, obs: &Obs<T>) -> bool {
        self.items.contains_key(&obs.key())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over observers of the current storage in insertion order,
    /// including elements already queued for erase.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Obs<T>> + ExactSizeIterator + '_ {
        self.items.values().map(Own::observe)
    }

    /// Marks the element aliased by `obs` as pending removal; no storage
    /// mutation, safe mid-iteration. Null or unknown references are ignored.
    pub fn queue_for_erase(&self, obs: &Obs<T>) {
        let key = obs.key();
        // Only member keys go in the queue; a freed foreign counter's address
        // could be reused by a later element. Member keys stay pinned by the
        // stored owner until the flush.
        if key != 0 && self.items.contains_key(&key) {
            self.erase_queue.borrow_mut().insert(key);
        }
    }

    /// Marks every current element as pending removal.
    pub fn queue_all_for_erase(&self) {
        let mut queue = self.erase_queue.borrow_mut();
        queue.extend(self.items.keys().copied());
    }

    pub fn erase_queue_is_empty(&self) -> bool {
        self.erase_queue.borrow().is_empty()
    }

    /// Removes and destroys every marked element exactly once, clears the
    /// queue and returns the number removed. Cannot run mid-iteration.
    pub fn process_erase_queue(&mut self) -> usize {
        let queue = std::mem::take(self.erase_queue.get_mut());
        if queue.is_empty() {
            return 0;
        }
        let before = self.items.len();
        self.items.retain(|key, _| !queue.contains(key));
        before - self.items.len()
    }
}

impl<T: ?Sized> Default for OwnSet<T> {
    fn default() -> OwnSet<T> {
        OwnSet::new()
    }
}

impl<T: ?Sized> fmt::Debug for OwnSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnSet")
            .field("len", &self.items.len())
            .field("queued", &self.erase_queue.borrow().len())
            .finish()
    }
}

impl<T: ?Sized> Drop for OwnSet<T> {
    fn drop(&mut self) {
        let observed = self
            .items
            .values()
            .filter(|own| own.observers() > 0)
            .count();
        if observed > 0 {
            warn!("dropping OwnSet with {observed} still-observed elements");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut set = OwnSet::new();
        let a = set.insert(1u32);
        let b = set.insert(2u32);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
        assert!(set.contains(&b));
        assert!(!set.contains(&Obs::null()));

        let foreign = Own::new(3u32);
        assert!(!set.contains(&foreign.observe()));
    }

    #[test]
    fn deferred_erase() {
        let mut set = OwnSet::new();
        let a = set.insert(1u32);
        let b = set.insert(2u32);
        set.queue_for_erase(&a);
        set.queue_for_erase(&a);
        // marked element still visible and still a member
        assert!(set.contains(&a));
        assert_eq!(set.iter().count(), 2);
        assert_eq!(set.process_erase_queue(), 1);
        assert!(!set.contains(&a));
        assert!(a.get().is_err());
        assert_eq!(*b.get().unwrap(), 2);
    }

    #[test]
    fn queue_all_then_flush() {
        let mut set = OwnSet::new();
        for i in 0..4u8 {
            set.insert(i);
        }
        set.queue_all_for_erase();
        assert!(!set.erase_queue_is_empty());
        assert_eq!(set.process_erase_queue(), 4);
        assert!(set.is_empty());
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut set = OwnSet::new();
        for i in [3u32, 1, 2] {
            set.insert(i);
        }
        let seen: Vec<u32> = set.iter().map(|obs| *obs.get().unwrap()).collect();
        assert_eq!(seen, [3, 1, 2]);
        let reversed: Vec<u32> = set.iter().rev().map(|obs| *obs.get().unwrap()).collect();
        assert_eq!(reversed, [2, 1, 3]);
    }

    #[test]
    fn stale_foreign_key_cannot_hit_later_element() {
        let mut set = OwnSet::new();
        set.insert(1u32);

        let foreign = Own::new(2u32);
        set.queue_for_erase(&foreign.observe());
        drop(foreign);

        let fresh = set.insert(3u32);
        assert_eq!(set.process_erase_queue(), 0);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&fresh));
    }

    #[test]
    fn mark_during_iteration() {
        let mut set = OwnSet::new();
        for i in 0..5u32 {
            set.insert(i);
        }
        for obs in set.iter() {
            if *obs.get().unwrap() > 2 {
                set.queue_for_erase(&obs);
            }
        }
        assert_eq!(set.process_erase_queue(), 2);
        assert_eq!(set.len(), 3);
    }
}
