mod json_file;
mod sheet;
mod text_file;

#[cfg(test)]
pub mod memory;

pub use json_file::JsonFileStorage;
pub use sheet::SheetStorage;
pub use text_file::TextFileStorage;

#[cfg(test)]
pub use sheet::testing::write_credentials as write_test_sheet_credentials;

use std::{collections::BTreeSet, future::Future, io::Write, path::Path};

use tokio::sync::Mutex;

use super::types::Domain;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("couldn't authenticate with the service account: {0}")]
    Auth(#[from] gcp_auth::Error),
    #[error("failed to move the written file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Everything that gets persisted.
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    /// Monitored domains, in the order they were added.
    pub domains: Vec<Domain>,
    /// Lowercased names of domains that were alerted about as blocked
    /// and haven't been seen unblocked since.
    pub alerted: BTreeSet<String>,
}

impl StoredState {
    pub fn is_alerted(&self, domain: &Domain) -> bool {
        self.alerted.contains(&domain.key())
    }

    /// Drop alerted entries for domains that are not in the list anymore.
    /// Returns `true` if anything was dropped.
    pub fn prune_alerted(&mut self) -> bool {
        let monitored: BTreeSet<String> = self.domains.iter().map(Domain::key).collect();
        let before = self.alerted.len();
        self.alerted.retain(|key| monitored.contains(key));
        self.alerted.len() != before
    }
}

/// A place to keep [`StoredState`] in between restarts.
///
/// Implementations return an empty state if there's nothing stored yet,
/// and an error only if something is stored but can't be read.
pub trait StorageBackend: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<StoredState, StorageError>> + Send;
    fn save(&self, state: &StoredState) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// One of the supported storage backends, picked by configuration.
pub enum Storage {
    TextFile(TextFileStorage),
    JsonFile(JsonFileStorage),
    Sheet(SheetStorage),
}

impl StorageBackend for Storage {
    async fn load(&self) -> Result<StoredState, StorageError> {
        match self {
            Storage::TextFile(storage) => storage.load().await,
            Storage::JsonFile(storage) => storage.load().await,
            Storage::Sheet(storage) => storage.load().await,
        }
    }

    async fn save(&self, state: &StoredState) -> Result<(), StorageError> {
        match self {
            Storage::TextFile(storage) => storage.save(state).await,
            Storage::JsonFile(storage) => storage.save(state).await,
            Storage::Sheet(storage) => storage.save(state).await,
        }
    }
}

/// Result of [`DomainStore::replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    /// The domain to be replaced is not in the list.
    NotFound,
    /// The new domain is already in the list as some other entry.
    Duplicate,
}

struct Inner {
    stored: StoredState,
    /// Set when the last save failed, meaning memory is ahead of storage.
    dirty: bool,
}

/// The list of monitored domains and the alerted set, kept in memory
/// and written through to a [`StorageBackend`] on every change.
///
/// Every read-modify-write goes through one lock, so a scan committing its
/// results and a `/replace` can't interleave.
pub struct DomainStore<S> {
    backend: S,
    inner: Mutex<Inner>,
}

impl<S: StorageBackend> DomainStore<S> {
    /// Load the state from `backend`. If that fails, start out empty:
    /// nothing is monitored until storage becomes readable again.
    pub async fn open(backend: S) -> Self {
        let stored = match backend.load().await {
            Ok(stored) => {
                log::info!(
                    "Loaded {} domains, {} of them alerted.",
                    stored.domains.len(),
                    stored.alerted.len()
                );
                stored
            }
            Err(e) => {
                log::warn!("Failed to load stored domains, starting empty: {e}");
                StoredState::default()
            }
        };

        Self {
            backend,
            inner: Mutex::new(Inner {
                stored,
                dirty: false,
            }),
        }
    }

    /// Pick up changes made to the storage from outside, like someone
    /// editing the list file by hand.
    ///
    /// If reading fails, the in-memory state is kept. If the previous save
    /// failed, this retries it instead of overwriting memory with stale data.
    pub async fn refresh(&self) {
        let mut inner = self.inner.lock().await;

        if inner.dirty {
            log::info!("Retrying to save the domain list...");
            self.persist(&mut inner).await;
            return;
        }

        match self.backend.load().await {
            Ok(stored) => inner.stored = stored,
            Err(e) => log::warn!("Failed to reload stored domains, keeping what's in memory: {e}"),
        }
    }

    /// Get the last `limit` domains in the list, or all of them,
    /// along with how many domains there are in total.
    pub async fn list(&self, limit: Option<usize>) -> (Vec<Domain>, usize) {
        let inner = self.inner.lock().await;
        let domains = &inner.stored.domains;
        let skip = match limit {
            Some(limit) => domains.len().saturating_sub(limit),
            None => 0,
        };
        (domains[skip..].to_vec(), domains.len())
    }

    /// Copy of the whole current state.
    pub async fn snapshot(&self) -> StoredState {
        self.inner.lock().await.stored.clone()
    }

    /// Replace the domain `old` (case-insensitively) with `new` in place.
    ///
    /// The alert for `old`, if any, is dropped, as it's not monitored anymore.
    pub async fn replace(&self, old: &str, new: Domain) -> ReplaceOutcome {
        let mut inner = self.inner.lock().await;
        let domains = &mut inner.stored.domains;

        let Some(index) = domains.iter().position(|domain| domain.is_same(old)) else {
            return ReplaceOutcome::NotFound;
        };

        if domains
            .iter()
            .enumerate()
            .any(|(i, domain)| i != index && *domain == new)
        {
            return ReplaceOutcome::Duplicate;
        }

        log::info!("Replacing {} with {}", domains[index], new);
        domains[index] = new;
        inner.stored.prune_alerted();

        self.persist(&mut inner).await;
        ReplaceOutcome::Replaced
    }

    /// Apply `change` to the state under the lock. If it returns `true`,
    /// meaning it changed something, the state is saved.
    pub async fn modify(&self, change: impl FnOnce(&mut StoredState) -> bool) {
        let mut inner = self.inner.lock().await;
        if change(&mut inner.stored) {
            self.persist(&mut inner).await;
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    async fn persist(&self, inner: &mut Inner) {
        match self.backend.save(&inner.stored).await {
            Ok(()) => inner.dirty = false,
            Err(e) => {
                log::error!("Failed to save the domain list: {e}");
                inner.dirty = true;
            }
        }
    }
}

/// Write `contents` to a temporary file next to `path`, then move it over `path`,
/// so nobody reading `path` ever sees it half-written.
async fn write_atomically(path: &Path, contents: Vec<u8>) -> Result<(), StorageError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(directory)?;
        file.write_all(&contents)?;
        file.as_file().sync_all()?;
        file.persist(&path)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Read a file to a string, treating a missing file as an empty one.
async fn read_if_exists(path: &Path) -> Result<String, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}
