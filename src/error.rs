//! Error types for `PooledVec` operations.

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by `PooledVec` and its adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An index was outside `0..len` (or `0..=len` for insertion).
    #[error("index {index} is out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// An argument failed validation. Nothing was modified.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// A pooled buffer was asked to grow past its declared maximum.
    #[error("cannot add more items: maximum segment capacity {max_capacity} reached")]
    CapacityExceeded { max_capacity: usize },

    /// The collection changed structurally while a cursor was walking it.
    #[error("collection was modified during enumeration")]
    Modified,

    /// The operation needs at least one element.
    #[error("collection is empty")]
    Empty,
}

impl Error {
    pub(crate) fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}
