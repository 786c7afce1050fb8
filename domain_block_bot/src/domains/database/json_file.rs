use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{read_if_exists, write_atomically, StorageBackend, StorageError, StoredState};
use crate::domains::types::Domain;

/// On-disk shape of the JSON storage.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    domain_list: Vec<String>,
    #[serde(default)]
    notified_blocked: Vec<String>,
}

/// Storage in a single JSON document:
/// `{"domainList": [...], "notifiedBlocked": [...]}`.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for JsonFileStorage {
    async fn load(&self) -> Result<StoredState, StorageError> {
        let text = read_if_exists(&self.path).await?;
        if text.trim().is_empty() {
            return Ok(StoredState::default());
        }

        let document: Document = serde_json::from_str(&text)?;

        Ok(StoredState {
            domains: document
                .domain_list
                .iter()
                .filter_map(|name| Domain::new(name))
                .collect(),
            alerted: document
                .notified_blocked
                .iter()
                .map(|name| name.trim().to_lowercase())
                .collect(),
        })
    }

    async fn save(&self, state: &StoredState) -> Result<(), StorageError> {
        let document = Document {
            domain_list: state.domains.iter().map(Domain::to_string).collect(),
            notified_blocked: state.alerted.iter().cloned().collect(),
        };

        let mut contents = serde_json::to_vec_pretty(&document)?;
        contents.push(b'\n');
        write_atomically(&self.path, contents).await
    }
}
