use serde::{Deserialize, Serialize};

use crate::{identifier::Identifier, store::StoreError};

/// The persisted state of one sequence counter.
///
/// `last_allocated` is the value most recently handed out. A counter created
/// for a starting value `start` begins at `start - step`, so its first
/// allocation yields `start`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub identifier: Identifier,
    pub last_allocated: u64,
    pub step: u64,
    pub description: String,
}

impl SequenceCounter {
    /// Builds a counter whose first allocation returns `start`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCounter`] if `step` is zero or `start` is
    /// smaller than `step`.
    ///
    /// # Example
    ///
    /// ```
    /// use autocode::{Identifier, SequenceCounter};
    ///
    /// let id = Identifier::new("invoice", "code", "").unwrap();
    /// let counter = SequenceCounter::starting_at(id, 100, 1, "imported").unwrap();
    /// assert_eq!(counter.last_allocated, 99);
    /// ```
    pub fn starting_at(
        identifier: Identifier,
        start: u64,
        step: u64,
        description: impl Into<String>,
    ) -> Result<Self, StoreError> {
        if step == 0 {
            return Err(StoreError::InvalidCounter {
                identifier,
                reason: "step must be at least 1".to_owned(),
            });
        }
        let Some(last_allocated) = start.checked_sub(step) else {
            return Err(StoreError::InvalidCounter {
                identifier,
                reason: format!("start {start} is below step {step}"),
            });
        };
        Ok(Self {
            identifier,
            last_allocated,
            step,
            description: description.into(),
        })
    }

    /// Checks that the counter can hand out distinct values.
    ///
    /// Counters reach a store from persisted records as well as from
    /// [`starting_at`], so every store runs this before accepting one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCounter`] if `step` is zero.
    ///
    /// [`starting_at`]: Self::starting_at
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.step == 0 {
            return Err(StoreError::InvalidCounter {
                identifier: self.identifier.clone(),
                reason: "step must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// Advances the counter in place and returns the allocated value.
    pub(crate) fn advance(&mut self) -> Result<u64, StoreError> {
        let next = self
            .last_allocated
            .checked_add(self.step)
            .ok_or_else(|| StoreError::Exhausted {
                identifier: self.identifier.clone(),
                last_allocated: self.last_allocated,
                step: self.step,
            })?;
        self.last_allocated = next;
        Ok(next)
    }
}
