use std::io::Write;
use std::path::Path;

use mal_types::{Commit, LeafRecord, ProofEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Serializable copy of an [`InMemoryRecordStore`](crate::InMemoryRecordStore).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<LeafRecord>,
    pub commits: Vec<Commit>,
    pub proofs: Vec<ProofEntry>,
}

impl StoreSnapshot {
    /// Read a snapshot written by [`save`](Self::save).
    ///
    /// A row that cannot be decoded (for example a proof row without its side
    /// tag) is reported as [`StoreError::CorruptRecord`].
    pub fn load(path: &Path) -> StoreResult<Self> {
        let snapshot: Self = read_json(path)?;
        debug!(
            path = %path.display(),
            records = snapshot.records.len(),
            commits = snapshot.commits.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json_atomic(path, self)
    }
}

/// Deserialize a JSON file; undecodable content is `CorruptRecord`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::CorruptRecord(format!("{}: {e}", path.display())))
}

/// Serialize `value` to `path` through a temporary file in the same
/// directory, so readers never observe a partial write.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "json written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mal_types::{Digest, LeafId, Side};

    fn sample() -> StoreSnapshot {
        let id = LeafId::from_bytes([0xab; 32]);
        StoreSnapshot {
            records: vec![LeafRecord::new(id, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())],
            commits: vec![],
            proofs: vec![ProofEntry {
                commit_label: 1,
                leaf_id: id,
                index: 0,
                sibling: Digest::from_hash([0xcd; 32]),
                side: Some(Side::Right),
            }],
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let snapshot = sample();
        snapshot.save(&path).unwrap();
        assert_eq!(StoreSnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        sample().save(&path).unwrap();
        StoreSnapshot::default().save(&path).unwrap();
        assert!(StoreSnapshot::load(&path).unwrap().records.is_empty());
    }

    #[test]
    fn missing_side_tag_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut value = serde_json::to_value(sample()).unwrap();
        value["proofs"][0].as_object_mut().unwrap().remove("side");
        std::fs::write(&path, value.to_string()).unwrap();

        let loaded = StoreSnapshot::load(&path).unwrap();
        assert_eq!(loaded.proofs[0].side, None);
        assert_eq!(loaded.records, sample().records);
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"records": ["#).unwrap();
        assert!(matches!(
            StoreSnapshot::load(&path),
            Err(StoreError::CorruptRecord(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StoreSnapshot::load(&dir.path().join("absent.json")),
            Err(StoreError::Io(_))
        ));
    }
}
