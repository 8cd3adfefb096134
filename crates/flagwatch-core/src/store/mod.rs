//! Watermark persistence.
//!
//! A [`WatermarkStore`] remembers the newest watermark seen per category
//! across polling cycles, and for [`FileStore`] across process restarts.

pub mod errors;
mod file;
mod memory;

use std::collections::BTreeMap;

use crate::types::{Category, Watermark};

pub use errors::StoreError;
pub use file::{FileStore, WatermarkRecord};
pub use memory::MemoryStore;

/// Whether a store refuses writes that would move a watermark backward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Monotonicity {
    /// Overwrite unconditionally.
    #[default]
    Unchecked,
    /// Reject older watermarks; equal ones are accepted as no-ops.
    Enforce,
}

impl From<bool> for Monotonicity {
    fn from(enforce: bool) -> Self {
        if enforce {
            Monotonicity::Enforce
        } else {
            Monotonicity::Unchecked
        }
    }
}

/// Result of [`WatermarkStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    /// The monotonic guard kept the newer stored value.
    Rejected { current: Watermark },
}

/// Persistent watermark per category.
///
/// Methods are synchronous and the poller calls `get` and `set` directly on
/// its async task, once per category per cycle. Implementations must stay
/// fast: in-memory state or small local file writes like [`FileStore`]. A
/// store backed by a network or a slow disk should do its I/O on its own
/// thread and keep these methods non-blocking.
pub trait WatermarkStore: Send + Sync {
    fn get(&self, category: &Category) -> Result<Option<Watermark>, StoreError>;

    fn set(&self, category: &Category, watermark: Watermark) -> Result<SetOutcome, StoreError>;

    /// Returns `true` if a watermark was present.
    fn remove(&self, category: &Category) -> Result<bool, StoreError>;

    fn snapshot(&self) -> Result<BTreeMap<Category, Watermark>, StoreError>;
}

/// Apply the monotonic guard. `Some` means the write must not happen.
fn guard(
    monotonicity: Monotonicity,
    current: Option<Watermark>,
    next: Watermark,
) -> Option<SetOutcome> {
    match (monotonicity, current) {
        (Monotonicity::Enforce, Some(current)) if next < current => {
            Some(SetOutcome::Rejected { current })
        }
        _ => None,
    }
}
