//! Single-threaded ownership tracking.
//!
//! The core of the crate is one pair of reference types over a shared
//! counter record:
//!
//! - [`Own<T>`] is the move-only owning reference. Creating one allocates the
//!   tracked object and its counter; dropping it destroys the object,
//!   unconditionally.
//! - [`Obs<T>`] is the copyable observing reference. Any number may alias the
//!   same object, and none of them extends or blocks its lifetime. After the
//!   owner is gone an observer dangles: access through [`Obs::get`] fails
//!   with [`DanglingRef`] instead of reading freed memory.
//!
//! On top of the pair sit two collections with deferred erasure
//! ([`OwnList`], [`OwnSet`]), which let iterating code mark elements for
//! removal mid-loop and sweep them later, and a [`NamedCache`] that reclaims
//! entries once nothing outside the cache observes them.
//!
//! Everything here is deliberately single-threaded: the counter record has no
//! internal locking, and the handle types are `!Send`/`!Sync`. All mutation
//! of a given object, collection or cache is expected to happen from one
//! logical thread of control, e.g. one frame-update pass. There is no
//! garbage collection and no cycle detection; the model assumes a tree or
//! DAG of ownership.
//!
//! ```
//! use tether::NamedCache;
//!
//! let mut cache = NamedCache::new();
//! let obs = cache.create("answer", 42u32).unwrap();
//! assert_eq!(*obs.get().unwrap(), 42);
//!
//! cache.clean(); // still observed, entry survives
//! assert!(cache.has("answer"));
//!
//! drop(obs);
//! cache.clean(); // unobserved now, entry reclaimed
//! assert!(cache.get("answer").is_none());
//! ```

#[macro_use]
extern crate log;

mod cache;
mod collection;
mod error;
mod object;

pub use cache::NamedCache;
pub use collection::{OwnList, OwnSet};
pub use error::{CacheError, DanglingRef};
pub use object::{live_counter_count, Live, Obs, Own};
