use super::device::Device;
use super::models::{BatchModel, Calculator};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Which kind of model a cache entry holds. Part of the key, so a lookup for
/// one kind can never return a handle of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    SingleStructure,
    Batched,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub model_name: String,
    pub device: Device,
    pub backend: BackendKind,
}

impl ModelKey {
    pub fn new(model_name: &str, device: Device, backend: BackendKind) -> Self {
        Self {
            model_name: model_name.to_string(),
            device,
            backend,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({:?})", self.model_name, self.device, self.backend)
    }
}

type Slot<H> = Arc<Mutex<Option<H>>>;

/// Memoizes loaded model handles for the lifetime of the cache.
///
/// Each key owns its own slot lock: callers racing on the same uncached key
/// are serialized and the loader runs at most once, while callers for
/// different keys only share the brief lookup of the slot itself. A failed
/// load caches nothing and its slot is dropped, so the next caller retries.
/// Loaded entries are never evicted.
pub struct ModelCache<H> {
    slots: Mutex<HashMap<ModelKey, Slot<H>>>,
}

impl<H> Default for ModelCache<H> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

fn recover<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl<H: Clone> ModelCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<E, F>(&self, key: &ModelKey, loader: F) -> Result<H, E>
    where
        F: FnOnce() -> Result<H, E>,
    {
        let slot = {
            let mut slots = recover(self.slots.lock());
            slots.entry(key.clone()).or_default().clone()
        };

        let mut entry = recover(slot.lock());
        if let Some(handle) = entry.as_ref() {
            debug!(key = %key, "Model cache hit.");
            return Ok(handle.clone());
        }

        debug!(key = %key, "Model cache miss, loading.");
        let handle = match loader() {
            Ok(handle) => handle,
            Err(e) => {
                drop(entry);
                self.discard_empty_slot(key, &slot);
                return Err(e);
            }
        };
        *entry = Some(handle.clone());
        Ok(handle)
    }

    /// Removes the slot left behind by a failed load, unless another caller
    /// already holds it and will retry through it.
    fn discard_empty_slot(&self, key: &ModelKey, slot: &Slot<H>) {
        let mut slots = recover(self.slots.lock());
        let unshared = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unshared && recover(slot.lock()).is_none() {
            slots.remove(key);
        }
    }

    pub fn get(&self, key: &ModelKey) -> Option<H> {
        let slot = recover(self.slots.lock()).get(key).cloned()?;
        recover(slot.lock()).clone()
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of successfully loaded entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<H>> = recover(self.slots.lock()).values().cloned().collect();
        slots
            .iter()
            .filter(|slot| recover(slot.lock()).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Intended for tests and explicit teardown.
    pub fn clear(&self) {
        recover(self.slots.lock()).clear();
    }
}

pub type CalculatorCache = ModelCache<Arc<dyn Calculator>>;
pub type BatchModelCache = ModelCache<Arc<dyn BatchModel>>;

static CALCULATORS: Lazy<Arc<CalculatorCache>> = Lazy::new(|| Arc::new(ModelCache::new()));
static BATCH_MODELS: Lazy<Arc<BatchModelCache>> = Lazy::new(|| Arc::new(ModelCache::new()));

/// The process-wide cache of single-structure calculators.
pub fn global_calculators() -> Arc<CalculatorCache> {
    Arc::clone(&CALCULATORS)
}

/// The process-wide cache of batched models.
pub fn global_batch_models() -> Arc<BatchModelCache> {
    Arc::clone(&BATCH_MODELS)
}

/// Empties both process-wide caches.
pub fn reset_global_caches() {
    CALCULATORS.clear();
    BATCH_MODELS.clear();
}
