use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use ahash::AHashSet;

use crate::object::{Obs, Own};

/// Ordered collection of owning references with deferred erasure.
///
/// The list owns its elements and hands out observers. Removal is two-phase:
/// [`queue_for_erase`](OwnList::queue_for_erase) marks an element without
/// touching storage (legal mid-iteration), and
/// [`process_erase_queue`](OwnList::process_erase_queue) later removes and
/// destroys everything marked.
pub struct OwnList<T: ?Sized> {
    items: Vec<Own<T>>,
    // Marked counter keys. Behind a RefCell so marking is an `&self`
    // operation and callable while an iteration borrow is active.
    erase_queue: RefCell<AHashSet<usize>>,
}

impl<T: Any> OwnList<T> {
    /// Constructs a new tracked object at the end of the list and returns an
    /// observer for it.
    pub fn append(&mut self, value: T) -> Obs<T> {
        self.append_own(Own::new(value))
    }

    /// Constructs a new tracked object before `index`.
    pub fn insert(&mut self, index: usize, value: T) -> Obs<T> {
        self.insert_own(index, Own::new(value))
    }
}

impl<T: ?Sized> OwnList<T> {
    pub fn new() -> OwnList<T> {
        OwnList {
            items: Vec::new(),
            erase_queue: RefCell::new(AHashSet::new()),
        }
    }

    /// Stores a pre-built owner (possibly erased or carrying a custom
    /// destructor) at the end of the list.
    pub fn append_own(&mut self, own: Own<T>) -> Obs<T> {
        let obs = own.observe();
        self.items.push(own);
        obs
    }

    /// Stores a pre-built owner before `index`.
    pub fn insert_own(&mut self, index: usize, own: Own<T>) -> Obs<T> {
        let obs = own.observe();
        self.items.insert(index, own);
        obs
    }

    pub fn get(&self, index: usize) -> Option<Obs<T>> {
        self.items.get(index).map(Own::observe)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over observers of the current storage, front to back; reverse
    /// with `.rev()`. Elements already queued for erase are still visited
    /// until the queue is processed.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Obs<T>> + ExactSizeIterator + '_ {
        self.items.iter().map(Own::observe)
    }

    /// Marks the element aliased by `obs` as pending removal. No storage
    /// mutation happens and nothing is destroyed yet; safe to call during
    /// iteration. Null or unknown references are ignored.
    pub fn queue_for_erase(&self, obs: &Obs<T>) {
        let key = obs.key();
        // Only member keys go in the queue. A foreign key could outlive its
        // counter and collide with a later element's freshly allocated one;
        // member keys are pinned by the stored owner until the flush.
        if key != 0 && self.items.iter().any(|own| own.key() == key) {
            self.erase_queue.borrow_mut().insert(key);
        }
    }

    /// Marks every current element as pending removal.
    pub fn queue_all_for_erase(&self) {
        let mut queue = self.erase_queue.borrow_mut();
        queue.extend(self.items.iter().map(Own::key));
    }

    pub fn erase_queue_is_empty(&self) -> bool {
        self.erase_queue.borrow().is_empty()
    }

    /// Removes and destroys every element marked since the last call, then
    /// clears the queue. Each marked element is removed exactly once no
    /// matter how often it was queued. Returns the number removed.
    ///
    /// Takes `&mut self`, so it cannot run while an iteration is in progress.
    pub fn process_erase_queue(&mut self) -> usize {
        let queue = std::mem::take(self.erase_queue.get_mut());
        if queue.is_empty() {
            return 0;
        }
        let before = self.items.len();
        self.items.retain(|own| !queue.contains(&own.key()));
        before - self.items.len()
    }
}

impl<T: ?Sized> Default for OwnList<T> {
    fn default() -> OwnList<T> {
        OwnList::new()
    }
}

impl<T: ?Sized> fmt::Debug for OwnList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnList")
            .field("len", &self.items.len())
            .field("queued", &self.erase_queue.borrow().len())
            .finish()
    }
}

impl<T: ?Sized> Drop for OwnList<T> {
    fn drop(&mut self) {
        let observed = self.items.iter().filter(|own| own.observers() > 0).count();
        if observed > 0 {
            warn!("dropping OwnList with {observed} still-observed elements");
        }
    }
}
