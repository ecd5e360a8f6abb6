use std::{collections::HashMap, sync::Arc};

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{
    identifier::Identifier,
    store::{CounterStore, SequenceCounter, StoreError, sync::RwLock},
};

struct CounterCell {
    #[cfg(feature = "cache-padded")]
    last_allocated: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    last_allocated: AtomicU64,
    step: u64,
    description: String,
}

impl CounterCell {
    fn new(counter: &SequenceCounter) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            last_allocated: crossbeam_utils::CachePadded::new(AtomicU64::new(
                counter.last_allocated,
            )),
            #[cfg(not(feature = "cache-padded"))]
            last_allocated: AtomicU64::new(counter.last_allocated),
            step: counter.step,
            description: counter.description.clone(),
        }
    }
}

/// A counter store whose counters are individual atomic cells.
///
/// The identifier map is guarded by a read-write lock that is only taken for
/// writing when a counter is created. Allocation takes the read lock to find
/// the cell, then advances it with a compare-and-swap loop, so allocations on
/// different identifiers never block each other.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Lock-free allocation once a counter exists
/// - ❌ Shared across processes
///
/// ## Recommended When
/// - Many identifiers are allocated from concurrently
/// - A single process owns the counters
///
/// ## See Also
/// - [`LockCounterStore`]
///
/// [`LockCounterStore`]: crate::LockCounterStore
#[derive(Default)]
pub struct AtomicCounterStore {
    counters: RwLock<HashMap<Identifier, Arc<CounterCell>>>,
}

impl AtomicCounterStore {
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
            map.entry(counter.identifier.clone())
                .or_insert_with(|| Arc::new(CounterCell::new(&counter)));
        }
        Ok(Self {
            counters: RwLock::new(map),
        })
    }

    fn snapshot_of(identifier: &Identifier, cell: &CounterCell) -> SequenceCounter {
        SequenceCounter {
            identifier: identifier.clone(),
            last_allocated: cell.last_allocated.load(Ordering::Acquire),
            step: cell.step,
            description: cell.description.clone(),
        }
    }

    fn cell(&self, identifier: &Identifier) -> Result<Option<Arc<CounterCell>>, StoreError> {
        let counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.read()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.read()?
            }
        };
        Ok(counters.get(identifier).cloned())
    }
}

impl CounterStore for AtomicCounterStore {
    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self)))]
    fn insert_if_absent(&self, counter: SequenceCounter) -> Result<bool, StoreError> {
        counter.validate()?;
        let mut counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.write()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.write()?
            }
        };
        if counters.contains_key(&counter.identifier) {
            return Ok(false);
        }
        let cell = Arc::new(CounterCell::new(&counter));
        counters.insert(counter.identifier, cell);
        Ok(true)
    }

    fn contains(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        Ok(self.cell(identifier)?.is_some())
    }

    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self)))]
    fn allocate_next(&self, identifier: &Identifier) -> Result<u64, StoreError> {
        let cell = self
            .cell(identifier)?
            .ok_or_else(|| StoreError::CounterMissing {
                identifier: identifier.clone(),
            })?;
        let step = cell.step;

        match cell
            .last_allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                last.checked_add(step)
            }) {
            // `fetch_update` hands back the value it replaced.
            Ok(previous) => Ok(previous + step),
            Err(last_allocated) => Err(StoreError::Exhausted {
                identifier: identifier.clone(),
                last_allocated,
                step,
            }),
        }
    }

    fn get(&self, identifier: &Identifier) -> Result<Option<SequenceCounter>, StoreError> {
        Ok(self
            .cell(identifier)?
            .map(|cell| Self::snapshot_of(identifier, &cell)))
    }

    fn snapshot(&self) -> Result<Vec<SequenceCounter>, StoreError> {
        let counters = {
            #[cfg(feature = "parking-lot")]
            {
                self.counters.read()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.counters.read()?
            }
        };
        let mut snapshot: Vec<_> = counters
            .iter()
            .map(|(identifier, cell)| Self::snapshot_of(identifier, cell))
            .collect();
        snapshot.sort_unstable_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(snapshot)
    }
}
