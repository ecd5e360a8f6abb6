use std::collections::HashMap;

#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{
    identifier::Identifier,
    store::{CounterStore, SequenceCounter, StoreError, sync::Mutex},
};

/// A counter store that keeps every counter behind a single mutex.
///
/// Creation and allocation are both performed while holding the lock, which
/// makes each operation trivially linearizable at the cost of serializing
/// allocations across unrelated identifiers.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Fair access across threads
/// - ❌ Shared across processes
///
/// ## Recommended When
/// - Allocation volume is modest
/// - Your target doesn't support 64-bit atomics
///
/// ## See Also
/// - [`AtomicCounterStore`]
///
/// [`AtomicCounterStore`]: crate::AtomicCounterStore
#[derive(Default)]
pub struct LockCounterStore {
    counters: Mutex<HashMap<Identifier, SequenceCounter>>,
}

impl LockCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with previously persisted counters.
    ///
    /// If `counters` repeats an identifier, the first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCounter`] for the first counter whose
    /// step is zero.
    pub fn from_counters(
        counters: impl IntoIterator<Item = SequenceCounter>,
    ) -> Result<Self, StoreError> {
        let mut map = HashMap::new();
        for counter in counters {
            counter.validate()?;
            map.entry(counter.identifier.clone()).or_insert(counter);
        }
        Ok(Self {
            counters: Mutex::new(map),
        })
    }
}

impl CounterStore for LockCounterStore {
    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self)))]
    fn insert_if_absent(&self, counter: SequenceCounter) -> Result<bool, StoreError> {
        counter.validate()?;
        let mut counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.lock()?
            }
        };
        if counters.contains_key(&counter.identifier) {
            return Ok(false);
        }
        counters.insert(counter.identifier.clone(), counter);
        Ok(true)
    }

    fn contains(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        let counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.lock()?
            }
        };
        Ok(counters.contains_key(identifier))
    }

    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self)))]
    fn allocate_next(&self, identifier: &Identifier) -> Result<u64, StoreError> {
        let mut counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.lock()?
            }
        };
        counters
            .get_mut(identifier)
            .ok_or_else(|| StoreError::CounterMissing {
                identifier: identifier.clone(),
            })?
            .advance()
    }

    fn get(&self, identifier: &Identifier) -> Result<Option<SequenceCounter>, StoreError> {
        let counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.lock()?
            }
        };
        Ok(counters.get(identifier).cloned())
    }

    fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        let counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.lock()?
            }
        };
        let mut snapshot: Vec<_> = counters.values().cloned().collect();
        snapshot.sort_unstable_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(snapshot)
    }
}
