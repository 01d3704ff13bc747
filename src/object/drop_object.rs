//! Erased destruction for tracked objects.
//!
//! The counter record stores an untyped object address, so destruction goes
//! through a trampoline monomorphized at creation time. This is what makes the
//! correct destructor run for the concrete type even after the handle has been
//! erased to `dyn Any`, and it is where a user-supplied destruction callback
//! gets spliced in instead of the plain drop.

/// Signature stored in the counter: erased object address plus the optional
/// user hook captured at creation (null when none was given).
pub(crate) type DestroyFn = unsafe fn(*mut (), *const ());

/// Reboxes the object behind `object` and destroys it.
///
/// # Safety
/// `object` must be the address originally produced by `Box::into_raw` for a
/// value of type `T`, not yet destroyed. `hook` must be null or a
/// `fn(Box<T>)` cast to a raw pointer.
pub(crate) unsafe fn destroy_boxed<T: 'static>(object: *mut (), hook: *const ()) {
    let boxed = Box::from_raw(object.cast::<T>());
    if hook.is_null() {
        drop(boxed);
    } else {
        let hook = std::mem::transmute::<*const (), fn(Box<T>)>(hook);
        hook(boxed);
    }
}
