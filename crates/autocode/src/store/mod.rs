//! Sequence counter storage.
//!
//! A counter store owns one [`SequenceCounter`] per [`Identifier`] and hands
//! out strictly increasing values from it. Two primitives carry the whole
//! concurrency contract:
//!
//! - [`CounterStore::insert_if_absent`] creates a counter only if no counter
//!   exists for its identifier. Racing creators agree on a single winner.
//! - [`CounterStore::allocate_next`] advances a counter by its step in one
//!   atomic read-modify-write and returns the new value.
//!
//! Two in-process implementations are provided:
//!
//! - [`AtomicCounterStore`] - each counter is an atomic cell; allocations on
//!   distinct identifiers never contend.
//! - [`LockCounterStore`] - every counter sits behind one mutex.
//!
//! Stores shared by several processes implement the same trait on top of a
//! uniqueness constraint and a conditional update.
//!
//! [`Identifier`]: crate::Identifier

mod atomic;
mod counter;
mod error;
mod interface;
mod lock;
pub(crate) mod sync;

pub use atomic::*;
pub use counter::*;
pub use error::*;
pub use interface::*;
pub use lock::*;
