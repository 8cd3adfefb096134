use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::error;

use super::{Monotonicity, SetOutcome, StoreError, WatermarkStore, guard};
use crate::types::{Category, Watermark};

/// In-process store. Watermarks are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    watermarks: Mutex<BTreeMap<Category, Watermark>>,
    monotonicity: Monotonicity,
}

impl MemoryStore {
    pub fn new(monotonicity: Monotonicity) -> Self {
        Self {
            watermarks: Mutex::new(BTreeMap::new()),
            monotonicity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Category, Watermark>> {
        match self.watermarks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(event = "core.store.memory_lock_poisoned");
                poisoned.into_inner()
            }
        }
    }
}

impl WatermarkStore for MemoryStore {
    fn get(&self, category: &Category) -> Result<Option<Watermark>, StoreError> {
        Ok(self.lock().get(category).copied())
    }

    fn set(&self, category: &Category, watermark: Watermark) -> Result<SetOutcome, StoreError> {
        let mut watermarks = self.lock();
        if let Some(rejected) = guard(
            self.monotonicity,
            watermarks.get(category).copied(),
            watermark,
        ) {
            return Ok(rejected);
        }
        watermarks.insert(category.clone(), watermark);
        Ok(SetOutcome::Stored)
    }

    fn remove(&self, category: &Category) -> Result<bool, StoreError> {
        Ok(self.lock().remove(category).is_some())
    }

    fn snapshot(&self) -> Result<BTreeMap<Category, Watermark>, StoreError> {
        Ok(self.lock().clone())
    }
}
