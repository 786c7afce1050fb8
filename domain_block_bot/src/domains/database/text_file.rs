use std::path::{Path, PathBuf};

use super::{read_if_exists, write_atomically, StorageBackend, StorageError, StoredState};
use crate::domains::types::Domain;

/// Plain text storage: one domain per line in the list file, so it can be
/// edited by hand. The alerted set goes into a second file next to it,
/// named like the list file with `.alerted` appended.
pub struct TextFileStorage {
    path: PathBuf,
    alerted_path: PathBuf,
}

impl TextFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut alerted_path = path.clone().into_os_string();
        alerted_path.push(".alerted");

        Self {
            path,
            alerted_path: alerted_path.into(),
        }
    }
}

/// Non-blank lines of a file, trimmed. Missing file means no lines.
async fn read_lines(path: &Path) -> Result<Vec<String>, StorageError> {
    let text = read_if_exists(path).await?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn to_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<u8> {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text.into_bytes()
}

impl StorageBackend for TextFileStorage {
    async fn load(&self) -> Result<StoredState, StorageError> {
        let domains = read_lines(&self.path)
            .await?
            .iter()
            .filter_map(|line| Domain::new(line))
            .collect();

        let alerted = read_lines(&self.alerted_path)
            .await?
            .into_iter()
            .map(|line| line.to_lowercase())
            .collect();

        Ok(StoredState { domains, alerted })
    }

    async fn save(&self, state: &StoredState) -> Result<(), StorageError> {
        let list = to_lines(state.domains.iter().map(Domain::as_str));
        let alerted = to_lines(state.alerted.iter().map(String::as_str));

        write_atomically(&self.path, list).await?;
        write_atomically(&self.alerted_path, alerted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TextFileStorage::new(dir.path().join("list.txt"));

        let state = StoredState {
            domains: ["b.com", "A.com", "c.co.id"]
                .iter()
                .filter_map(|name| Domain::new(name))
                .collect(),
            alerted: ["a.com".to_string()].into(),
        };
        storage.save(&state).await.unwrap();

        let loaded = storage.load().await.unwrap();
        let names: Vec<_> = loaded.domains.iter().map(Domain::as_str).collect();
        assert_eq!(names, ["b.com", "A.com", "c.co.id"]);
        assert_eq!(loaded.alerted, state.alerted);

        assert_eq!(
            std::fs::read_to_string(dir.path().join("list.txt.alerted")).unwrap(),
            "a.com\n"
        );
    }

    #[tokio::test]
    async fn hand_edited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "  one.com\r\n\n\ntwo.com  \n").unwrap();

        let loaded = TextFileStorage::new(&path).load().await.unwrap();
        let names: Vec<_> = loaded.domains.iter().map(Domain::as_str).collect();
        assert_eq!(names, ["one.com", "two.com"]);
        assert!(loaded.alerted.is_empty());
    }

    #[tokio::test]
    async fn missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = TextFileStorage::new(dir.path().join("nope.txt"))
            .load()
            .await
            .unwrap();
        assert!(loaded.domains.is_empty());
        assert!(loaded.alerted.is_empty());
    }
}
