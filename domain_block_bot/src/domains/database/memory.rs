//! In-memory storage for tests, with switches to make it fail.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use super::{StorageBackend, StorageError, StoredState};
use crate::domains::types::Domain;

#[derive(Default)]
pub struct MemoryStorage {
    stored: Mutex<StoredState>,
    saved: Mutex<Option<StoredState>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn with_domains(names: &[&str]) -> Self {
        let storage = Self::default();
        storage.set_stored(StoredState {
            domains: names.iter().filter_map(|name| Domain::new(name)).collect(),
            alerted: Default::default(),
        });
        storage
    }

    /// Pretend someone changed the storage from outside.
    pub fn set_stored(&self, state: StoredState) {
        *self.stored.lock().unwrap() = state;
    }

    /// The last successfully saved state, if anything was saved.
    pub fn saved(&self) -> Option<StoredState> {
        self.saved.lock().unwrap().clone()
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn broken() -> StorageError {
        StorageError::Io(std::io::Error::other("storage is broken on purpose"))
    }
}

impl StorageBackend for MemoryStorage {
    async fn load(&self) -> Result<StoredState, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, state: &StoredState) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        *self.stored.lock().unwrap() = state.clone();
        *self.saved.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}
