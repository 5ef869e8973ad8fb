//! Error taxonomy shared by the engines, the views and the concurrent wrapper.
//!
//! Every variant is programmer-facing: it reports an invalid request or the
//! misuse of a protected handle. None of them leaves a table half-built or
//! inconsistent.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A table was requested with a negative initial capacity.
    #[error("invalid capacity {0}: capacity must not be negative")]
    NegativeCapacity(i64),

    /// A table was requested with more capacity than the largest table can hold.
    #[error("capacity {requested} exceeds the maximum of {max} elements")]
    CapacityOverflow { requested: u64, max: usize },

    /// The view does not allow this operation (mutation or an escaping iterator).
    #[error("`{0}` is not supported by this view")]
    Unsupported(&'static str),

    /// A scoped delegate or iterator was used after its lock scope ended.
    #[error("scoped handle used after its lock scope ended")]
    StaleHandle,

    /// A scoped delegate was used from inside one of its own accessors.
    #[error("scoped handle re-entered while already in use")]
    Reentrant,
}
