//! The two reference kinds built on the counter record.
//!
//! [`Own`] is the move-only owning reference: the one handle allowed to
//! trigger destruction of its tracked object, which it does when dropped.
//! [`Obs`] is the copyable observing reference: it aliases the same counter
//! but can neither extend nor block the object's lifetime. Once the owner is
//! gone every observer dangles, and access through it fails with
//! [`DanglingRef`] instead of touching freed memory.
//!
//! The policy is destroy-now-dangle-safely: dropping the owner always runs
//! the destruction callback, no matter how many observers remain. The only
//! thing that stops destruction is an active [`Live`] borrow guard, which
//! panics the destroying drop; letting it proceed would free memory that a
//! `&T` still points at.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::error::DanglingRef;
use crate::object::counter::Counter;
use crate::object::drop_object::destroy_boxed;

/// Move-only owning reference to a tracked object.
///
/// At most one `Own` exists per counter; the type has no `Clone`, so the
/// compiler enforces it. Dropping the owner destroys the object immediately
/// and frees the counter record once the last observer is gone too.
pub struct Own<T: ?Sized> {
    ptr: NonNull<T>,
    counter: NonNull<Counter>,
    _marker: PhantomData<Box<T>>,
}

/// Copyable observing reference to a tracked object.
///
/// Observers alias the counter without ever owning the object. They may be
/// null ([`Obs::null`]), and they outlive destruction gracefully: access goes
/// through [`Obs::get`], which reports [`DanglingRef`] once the owner is gone.
pub struct Obs<T: ?Sized> {
    // Both fields are Some or both are None. `ptr` may dangle once the object
    // is destroyed and is never dereferenced without checking the counter.
    ptr: Option<NonNull<T>>,
    counter: Option<NonNull<Counter>>,
}

static_assertions::assert_not_impl_any!(Own<u8>: Clone, Copy, Send, Sync);
static_assertions::assert_not_impl_any!(Obs<u8>: Send, Sync);

impl<T: Any> Own<T> {
    /// Allocates `value` as a new tracked object and returns its owner.
    ///
    /// The alias count starts at 1.
    pub fn new(value: T) -> Own<T> {
        Own::from_box(Box::new(value), None)
    }

    /// Like [`Own::new`], with a destruction callback that replaces the plain
    /// drop. The callback is captured in the counter and runs exactly once,
    /// when the owner goes away, receiving the boxed object.
    pub fn with_destructor(value: T, destructor: fn(Box<T>)) -> Own<T> {
        Own::from_box(Box::new(value), Some(destructor))
    }

    fn from_box(value: Box<T>, hook: Option<fn(Box<T>)>) -> Own<T> {
        let ptr = NonNull::from(Box::leak(value));
        let hook = hook.map_or(std::ptr::null(), |f| f as *const ());
        let counter = Counter::allocate::<T>(ptr.as_ptr(), destroy_boxed::<T>, hook);
        Own {
            ptr,
            counter,
            _marker: PhantomData,
        }
    }

    /// Erases the compile-time type. The counter keeps the dynamic type, so
    /// the erased handle can still be [downcast](Own::downcast).
    pub fn erased(self) -> Own<dyn Any> {
        let this = ManuallyDrop::new(self);
        Own {
            ptr: this.ptr,
            counter: this.counter,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Own<T> {
    /// Hands out a new observing reference. Alias count += 1.
    pub fn observe(&self) -> Obs<T> {
        unsafe { self.counter.as_ref() }.inc();
        Obs {
            ptr: Some(self.ptr),
            counter: Some(self.counter),
        }
    }

    /// Number of observing references currently aliasing this object.
    pub fn observers(&self) -> usize {
        unsafe { self.counter.as_ref() }.alias_count() - 1
    }

    /// Stable identity value: the object's address. See [`Obs::id`].
    pub fn id(&self) -> usize {
        unsafe { self.counter.as_ref() }.object_addr()
    }

    /// Identity of the counter record itself, unique per tracked object and
    /// unaffected by destruction. Collections key elements by this.
    pub(crate) fn key(&self) -> usize {
        self.counter.as_ptr() as usize
    }

    /// Attempts a runtime-checked conversion of the owner to concrete type
    /// `Y`, consuming it. On mismatch the owner is handed back unchanged, so
    /// uniqueness is preserved either way.
    pub fn downcast<Y: Any>(self) -> Result<Own<Y>, Own<T>> {
        if unsafe { self.counter.as_ref() }.is_type(TypeId::of::<Y>()) {
            let this = ManuallyDrop::new(self);
            Ok(Own {
                ptr: this.ptr.cast::<Y>(),
                counter: this.counter,
                _marker: PhantomData,
            })
        } else {
            Err(self)
        }
    }
}

impl<T: ?Sized> Deref for Own<T> {
    type Target = T;

    /// Infallible: while the owner exists the object cannot have been
    /// destroyed, since destruction is triggered only by the owner's drop.
    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> Drop for Own<T> {
    fn drop(&mut self) {
        // Runs the destruction callback, then releases the owning alias; the
        // counter record is freed here if no observers remain.
        unsafe { Counter::release(self.counter, true) };
    }
}

impl<T: ?Sized> Obs<T> {
    /// The null observing reference. Reports invalid and fails all access.
    pub const fn null() -> Obs<T> {
        Obs {
            ptr: None,
            counter: None,
        }
    }

    /// True iff this aliases a counter record, destroyed or not. A dangling
    /// observer is still valid; use [`Obs::is_live`] for object liveness.
    pub fn is_valid(&self) -> bool {
        self.counter.is_some()
    }

    /// True iff the tracked object has not been destroyed.
    pub fn is_live(&self) -> bool {
        self.counter
            .map(|c| unsafe { c.as_ref() }.is_live())
            .unwrap_or(false)
    }

    /// Borrows the tracked object, or reports [`DanglingRef`] when this is
    /// null or the object was destroyed.
    ///
    /// The returned guard keeps a borrow flag raised in the counter; an owner
    /// dropped while guards are outstanding panics rather than freeing
    /// borrowed memory.
    pub fn get(&self) -> Result<Live<'_, T>, DanglingRef> {
        let (ptr, counter) = match (self.ptr, self.counter) {
            (Some(ptr), Some(counter)) => (ptr, counter),
            _ => return Err(DanglingRef),
        };
        let counter = unsafe { counter.as_ref() };
        if !counter.is_live() {
            return Err(DanglingRef);
        }
        counter.begin_borrow();
        Ok(Live { ptr, counter })
    }

    /// Stable identity value usable for equality, ordering and hashing: the
    /// object's address while it is alive, 0 once destroyed or for the null
    /// reference. Comparable at any time; never dereferenced.
    pub fn id(&self) -> usize {
        self.counter
            .map(|c| unsafe { c.as_ref() }.object_addr())
            .unwrap_or(0)
    }

    pub(crate) fn key(&self) -> usize {
        self.counter.map(|c| c.as_ptr() as usize).unwrap_or(0)
    }

    /// Attempts a runtime-checked conversion to concrete type `Y`.
    ///
    /// On success the result shares this counter (alias count += 1). On
    /// mismatch the result is the null reference and holds no alias; callers
    /// check validity before use.
    pub fn downcast<Y: Any>(&self) -> Obs<Y> {
        match self.counter {
            Some(counter) if unsafe { counter.as_ref() }.is_type(TypeId::of::<Y>()) => {
                unsafe { counter.as_ref() }.inc();
                Obs {
                    ptr: self.ptr.map(|p| p.cast::<Y>()),
                    counter: Some(counter),
                }
            }
            _ => Obs::null(),
        }
    }
}

impl<T: Any> Obs<T> {
    /// Erases the compile-time type, sharing the counter. Alias count += 1.
    pub fn erased(&self) -> Obs<dyn Any> {
        match (self.ptr, self.counter) {
            (Some(ptr), Some(counter)) => {
                unsafe { counter.as_ref() }.inc();
                let ptr: NonNull<dyn Any> = ptr;
                Obs {
                    ptr: Some(ptr),
                    counter: Some(counter),
                }
            }
            _ => Obs::null(),
        }
    }
}

impl<T: ?Sized> Clone for Obs<T> {
    fn clone(&self) -> Obs<T> {
        if let Some(counter) = self.counter {
            unsafe { counter.as_ref() }.inc();
        }
        Obs {
            ptr: self.ptr,
            counter: self.counter,
        }
    }
}

impl<T: ?Sized> Drop for Obs<T> {
    fn drop(&mut self) {
        if let Some(counter) = self.counter {
            unsafe { Counter::release(counter, false) };
        }
    }
}

impl<T: ?Sized> Default for Obs<T> {
    fn default() -> Obs<T> {
        Obs::null()
    }
}

impl<T: ?Sized> From<&Own<T>> for Obs<T> {
    fn from(own: &Own<T>) -> Obs<T> {
        own.observe()
    }
}

/// Borrow guard proving the tracked object is alive for the borrow's
/// duration. Returned by [`Obs::get`].
pub struct Live<'a, T: ?Sized> {
    ptr: NonNull<T>,
    counter: &'a Counter,
}

impl<T: ?Sized> Deref for Live<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // The borrow flag raised in the counter keeps destruction out while
        // this guard exists.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> Drop for Live<'_, T> {
    fn drop(&mut self) {
        self.counter.end_borrow();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Live<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// Identity-based comparisons, so references can serve as keys themselves.

impl<T: ?Sized> PartialEq for Obs<T> {
    fn eq(&self, other: &Obs<T>) -> bool {
        self.id() == other.id()
    }
}

impl<T: ?Sized> Eq for Obs<T> {}

impl<T: ?Sized> PartialOrd for Obs<T> {
    fn partial_cmp(&self, other: &Obs<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Obs<T> {
    fn cmp(&self, other: &Obs<T>) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl<T: ?Sized> Hash for Obs<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T: ?Sized> PartialEq for Own<T> {
    fn eq(&self, other: &Own<T>) -> bool {
        self.id() == other.id()
    }
}

impl<T: ?Sized> Eq for Own<T> {}

impl<T: ?Sized> PartialOrd for Own<T> {
    fn partial_cmp(&self, other: &Own<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Own<T> {
    fn cmp(&self, other: &Own<T>) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl<T: ?Sized> Hash for Own<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Own<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Own")
            .field("id", &self.id())
            .field("value", &&**self)
            .finish()
    }
}

impl<T: ?Sized> fmt::Debug for Obs<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obs")
            .field("id", &self.id())
            .field("live", &self.is_live())
            .finish()
    }
}
