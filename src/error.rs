use thiserror::Error;

/// Access through an observing reference whose object is gone.
///
/// Returned by [`Obs::get`](crate::Obs::get) when the reference is null or the
/// tracked object has already been destroyed by its owner. The referenced
/// memory is never touched on this path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dangling reference: the tracked object was already destroyed")]
pub struct DanglingRef;

/// Errors reported by [`NamedCache`](crate::NamedCache).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// `create` was called with a name that is already present.
    #[error("'{0}' is already in the cache")]
    DuplicateName(String),
}
