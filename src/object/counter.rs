//! The counter record shared by every reference that aliases one tracked
//! object, and the destruction protocol that runs over it.
//!
//! A counter moves through three states:
//!
//! | state     | meaning |
//! | --------- | ------- |
//! | LIVE      | object constructed, destruction callback not yet run |
//! | DESTROYED | callback run, object slot nulled, aliases may remain |
//! | FREED     | alias count reached zero, record deallocated |
//!
//! LIVE to DESTROYED happens exactly once, triggered only by the owning
//! reference going away. FREED is governed purely by the alias count and is
//! independent of whether the object is still alive: an owner with no
//! observers frees the record in the same step that destroys the object.

use std::any::TypeId;
use std::cell::Cell;
use std::ptr::NonNull;

use crate::object::drop_object::DestroyFn;

thread_local! {
    /// Counter records currently allocated on this thread.
    static LIVE_COUNTERS: Cell<usize> = Cell::new(0);
}

/// Number of counter records currently allocated on this thread.
///
/// One record exists per tracked object from the owner's creation until the
/// last reference of any kind goes away. Meant for leak checks in tests and
/// diagnostics; a program that releases everything it creates ends at the
/// count it started with.
pub fn live_counter_count() -> usize {
    LIVE_COUNTERS.with(|c| c.get())
}

pub(crate) struct Counter {
    /// Total alias count, owning plus observing.
    aliases: Cell<usize>,
    /// Active borrow guards handed out by observers.
    borrows: Cell<usize>,
    /// Erased address of the tracked object; null once destroyed.
    object: Cell<*mut ()>,
    /// Dynamic type captured at creation, so downcasts stay answerable even
    /// after the object itself is gone.
    type_id: TypeId,
    destroy: DestroyFn,
    destroy_hook: *const (),
}

impl Counter {
    /// Allocates a fresh record for `object` with alias count 1.
    pub(crate) fn allocate<T: 'static>(
        object: *mut T,
        destroy: DestroyFn,
        destroy_hook: *const (),
    ) -> NonNull<Counter> {
        let counter = Box::new(Counter {
            aliases: Cell::new(1),
            borrows: Cell::new(0),
            object: Cell::new(object.cast()),
            type_id: TypeId::of::<T>(),
            destroy,
            destroy_hook,
        });
        LIVE_COUNTERS.with(|c| c.set(c.get() + 1));
        NonNull::from(Box::leak(counter))
    }

    /// Alias count += 1.
    pub(crate) fn inc(&self) {
        self.aliases.set(self.aliases.get() + 1);
    }

    pub(crate) fn alias_count(&self) -> usize {
        self.aliases.get()
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.object.get().is_null()
    }

    /// Address of the tracked object, or 0 once destroyed. Used as the public
    /// identity value; never dereferenced by callers.
    pub(crate) fn object_addr(&self) -> usize {
        self.object.get() as usize
    }

    pub(crate) fn is_type(&self, id: TypeId) -> bool {
        self.type_id == id
    }

    pub(crate) fn begin_borrow(&self) {
        self.borrows.set(self.borrows.get() + 1);
    }

    pub(crate) fn end_borrow(&self) {
        self.borrows.set(self.borrows.get() - 1);
    }

    /// Runs the destruction callback exactly once and nulls the object slot.
    ///
    /// Idempotent from the counter's perspective; observers that remain start
    /// failing on access instead of reading freed memory.
    fn destroy(&self) {
        if !self.is_live() {
            return;
        }
        assert_eq!(
            self.borrows.get(),
            0,
            "tracked object destroyed while a live borrow is outstanding"
        );
        let object = self.object.replace(std::ptr::null_mut());
        unsafe { (self.destroy)(object, self.destroy_hook) };
    }

    /// Drops one alias, destroying first when it is the owning one, and frees
    /// the record when the alias count reaches zero.
    ///
    /// # Safety
    /// `counter` must have been produced by [`Counter::allocate`] and the
    /// caller must actually hold the alias being released.
    pub(crate) unsafe fn release(counter: NonNull<Counter>, owning: bool) {
        let remaining = {
            let c = counter.as_ref();
            if owning {
                c.destroy();
            }
            let remaining = c.aliases.get() - 1;
            c.aliases.set(remaining);
            remaining
        };
        if remaining == 0 {
            drop(Box::from_raw(counter.as_ptr()));
            LIVE_COUNTERS.with(|c| c.set(c.get() - 1));
        }
    }
}
