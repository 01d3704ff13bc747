//! Collections of owning references with deferred, two-phase erasure.
//!
//! Removal is split into an explicit mark ("queue for erase") and an explicit
//! sweep ("process the erase queue"). Marking never mutates storage, so code
//! iterating a collection may request removals mid-loop without invalidating
//! the iteration; the sweep happens later, outside any iteration, and
//! destroys each marked element exactly once.

mod list;
mod set;

pub use self::list::OwnList;
pub use self::set::OwnSet;
