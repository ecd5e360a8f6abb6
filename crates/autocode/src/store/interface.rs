use std::sync::Arc;

use crate::{
    identifier::Identifier,
    store::{SequenceCounter, StoreError},
};

/// Storage for sequence counters with exactly-once allocation.
///
/// Implementations must make [`insert_if_absent`] and [`allocate_next`]
/// atomic at the storage layer: callers may live in different threads or
/// different processes, and no client-side locking is assumed.
///
/// [`insert_if_absent`]: CounterStore::insert_if_absent
/// [`allocate_next`]: CounterStore::allocate_next
pub trait CounterStore: Send + Sync {
    /// Creates `counter` unless a counter with the same identifier exists.
    ///
    /// Returns `true` if this call created the counter. When several callers
    /// race on the same identifier exactly one of them gets `true`, and the
    /// existing counter is never modified.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCounter`] if `counter` has a zero step
    /// - any store-level failure, which must leave either no counter or one
    ///   complete counter behind
    fn insert_if_absent(&self, counter: SequenceCounter) -> Result<bool, StoreError>;

    /// Returns whether a counter exists for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn contains(&self, identifier: &Identifier) -> Result<bool, StoreError>;

    /// Advances the counter by its step and returns the new value.
    ///
    /// Concurrent calls for the same identifier never return the same value
    /// and never lose an increment.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CounterMissing`] if no counter exists for `identifier`
    /// - [`StoreError::Exhausted`] if the counter would overflow
    /// - any store-level failure, in which case nothing was allocated
    fn allocate_next(&self, identifier: &Identifier) -> Result<u64, StoreError>;

    /// Returns a snapshot of the counter for `identifier`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn get(&self, identifier: &Identifier) -> Result<Option<SequenceCounter>, StoreError>;

    /// Returns a snapshot of every counter, ordered by identifier.
    ///
    /// The result can be persisted and handed back to a store's
    /// `from_counters` to resume allocation where it stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError>;

    /// Makes sure a counter exists for `identifier`.
    ///
    /// If none exists, one is created with step 1 whose first allocation
    /// yields `start`. If one exists, it is left untouched, whatever its
    /// current value or step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCounter`] if `start` is zero, or any
    /// store-level failure.
    fn ensure_exists(
        &self,
        identifier: &Identifier,
        start: u64,
        description: &str,
    ) -> Result<(), StoreError> {
        if self.contains(identifier)? {
            return Ok(());
        }
        // Losing the creation race is fine: the winner's counter is the one
        // every caller will allocate from.
        let counter = SequenceCounter::starting_at(identifier.clone(), start, 1, description)?;
        self.insert_if_absent(counter)?;
        Ok(())
    }
}

impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    fn insert_if_absent(&self, counter: SequenceCounter) -> Result<bool, StoreError> {
        (**self).insert_if_absent(counter)
    }

    fn contains(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        (**self).contains(identifier)
    }

    fn allocate_next(&self, identifier: &Identifier) -> Result<u64, StoreError> {
        (**self).allocate_next(identifier)
    }

    fn get(&self, identifier: &Identifier) -> Result<Option<SequenceCounter>, StoreError> {
        (**self).get(identifier)
    }

    fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        (**self).snapshot()
    }

    fn ensure_exists(
        &self,
        identifier: &Identifier,
        start: u64,
        description: &str,
    ) -> Result<(), StoreError> {
        (**self).ensure_exists(identifier, start, description)
    }
}

impl<S: CounterStore + ?Sized> CounterStore for &S {
    fn insert_if_absent(&self, counter: SequenceCounter) -> Result<bool, StoreError> {
        (**self).insert_if_absent(counter)
    }

    fn contains(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        (**self).contains(identifier)
    }

    fn allocate_next(&self, identifier: &Identifier) -> Result<u64, StoreError> {
        (**self).allocate_next(identifier)
    }

    fn get(&self, identifier: &Identifier) -> Result<Option<SequenceCounter>, StoreError> {
        (**self).get(identifier)
    }

    fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        (**self).snapshot()
    }

    fn ensure_exists(
        &self,
        identifier: &Identifier,
        start: u64,
        description: &str,
    ) -> Result<(), StoreError> {
        (**self).ensure_exists(identifier, start, description)
    }
}
