use crate::identifier::Identifier;

/// Errors a [`CounterStore`] can report.
///
/// [`CounterStore`]: crate::CounterStore
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// `allocate_next` was called before the counter was created.
    #[error("no counter exists for `{identifier}`")]
    CounterMissing { identifier: Identifier },

    /// Advancing the counter would overflow its value range.
    #[error("counter `{identifier}` cannot advance past {last_allocated} by {step}")]
    Exhausted {
        identifier: Identifier,
        last_allocated: u64,
        step: u64,
    },

    /// A counter was rejected before creation (zero step, or a start value
    /// that cannot be expressed).
    #[error("invalid counter `{identifier}`: {reason}")]
    InvalidCounter {
        identifier: Identifier,
        reason: String,
    },

    /// The operation failed because a store lock was poisoned.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, locks do not poison, so this variant
    /// is not available.
    #[cfg(not(feature = "parking-lot"))]
    #[error("counter store lock poisoned")]
    LockPoisoned,

    /// The backing store could not be reached. Nothing was allocated.
    #[error("counter store unavailable: {reason}")]
    Unavailable { reason: String },
}

// Collapse every poisoned guard into `LockPoisoned`.
#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
