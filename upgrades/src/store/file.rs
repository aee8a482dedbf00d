//! File-backed record store.
//!
//! Each record is stored as `{deployments_dir}/{logical_name}.json`.
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use super::{validate_name, RecordStore};
use crate::{record::DeploymentRecord, Error, Result};

const EXTENSION: &str = "json";

/// [`RecordStore`] keeping one pretty-printed JSON document per logical
/// name.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never observes a torn record.
#[derive(Debug)]
pub struct FileRecordStore {
    deployments_dir: PathBuf,
    writes: AtomicU64,
}

impl FileRecordStore {
    /// Opens the store at `deployments_dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// * [`Error::Storage`] - If the directory cannot be created.
    pub async fn open(deployments_dir: impl Into<PathBuf>) -> Result<Self> {
        let deployments_dir = deployments_dir.into();
        tokio::fs::create_dir_all(&deployments_dir).await.map_err(|e| {
            Error::Storage(format!(
                "failed to create {}: {e}",
                deployments_dir.display()
            ))
        })?;
        Ok(Self { deployments_dir, writes: AtomicU64::new(0) })
    }

    /// Directory the records live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.deployments_dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.deployments_dir.join(format!("{name}.{EXTENSION}")))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        self.deployments_dir
            .join(format!(".{name}.{}.{n}.tmp", std::process::id()))
    }
}

async fn read_record(path: &Path) -> Result<DeploymentRecord> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Storage(format!("failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Storage(format!("failed to parse {}: {e}", path.display()))
    })
}

impl RecordStore for FileRecordStore {
    async fn put(&self, name: &str, record: &DeploymentRecord) -> Result<()> {
        let path = self.record_path(name)?;
        let content = serde_json::to_string_pretty(record).map_err(|e| {
            Error::Storage(format!("failed to serialize record: {e}"))
        })?;

        let temp = self.temp_path(name);
        tokio::fs::write(&temp, content).await.map_err(|e| {
            Error::Storage(format!("failed to write {}: {e}", temp.display()))
        })?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::Storage(format!(
                "failed to move record into {}: {e}",
                path.display()
            )));
        }

        tracing::debug!(
            name,
            path = %path.display(),
            "stored deployment record"
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<DeploymentRecord> {
        let path = self.record_path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => read_record(&path).await,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound { name: name.to_owned() })
            }
            Err(e) => Err(Error::Storage(format!(
                "failed to inspect {}: {e}",
                path.display()
            ))),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.record_path(name)?;
        tokio::fs::try_exists(&path).await.map_err(|e| {
            Error::Storage(format!("failed to inspect {}: {e}", path.display()))
        })
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        let mut entries =
            tokio::fs::read_dir(&self.deployments_dir).await.map_err(|e| {
                Error::Storage(format!(
                    "failed to read {}: {e}",
                    self.deployments_dir.display()
                ))
            })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            Error::Storage(format!("failed to read directory entry: {e}"))
        })? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == EXTENSION)
                && path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .is_some_and(|stem| validate_name(stem).is_ok());
            if is_record {
                records.push(read_record(&path).await?);
            }
        }

        records.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use alloy_json_abi::JsonAbi;
    use alloy_primitives::{Address, B256};

    use super::*;
    use crate::record::ProxyKind;

    fn record(name: &str, implementation: u8) -> DeploymentRecord {
        DeploymentRecord {
            logical_name: name.to_owned(),
            proxy: Address::with_last_byte(0x01),
            implementation: Address::with_last_byte(implementation),
            interface: JsonAbi::parse(["function value() returns (uint256)"])
                .expect("should parse interface"),
            kind: ProxyKind::AdminManaged,
            admin: Some(Address::with_last_byte(0xad)),
            version: B256::with_last_byte(implementation),
        }
    }

    #[tokio::test]
    async fn records_survive_reopening() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store =
            FileRecordStore::open(dir.path()).await.expect("should open");
        store
            .put("NftAuction", &record("NftAuction", 2))
            .await
            .expect("should put");
        drop(store);

        let store =
            FileRecordStore::open(dir.path()).await.expect("should reopen");
        assert!(store.exists("NftAuction").await.expect("should check"));
        let loaded = store.get("NftAuction").await.expect("should get");
        assert_eq!(loaded, record("NftAuction", 2));
        assert!(dir.path().join("NftAuction.json").is_file());
    }

    #[tokio::test]
    async fn put_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store =
            FileRecordStore::open(dir.path()).await.expect("should open");
        store
            .put("NftAuction", &record("NftAuction", 2))
            .await
            .expect("should put");
        store
            .put("NftAuction", &record("NftAuction", 3))
            .await
            .expect("should put");

        let loaded = store.get("NftAuction").await.expect("should get");
        assert_eq!(loaded.implementation, Address::with_last_byte(3));

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .expect("should read dir")
            .map(|entry| entry.expect("should read entry").file_name())
            .collect();
        assert_eq!(files, ["NftAuction.json"]);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store =
            FileRecordStore::open(dir.path()).await.expect("should open");

        assert!(!store.exists("NftAuction").await.expect("should check"));
        let err = store.get("NftAuction").await.expect_err("should be missing");
        assert!(
            matches!(err, Error::NotFound { name } if name == "NftAuction")
        );
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = FileRecordStore::open(dir.path().join("records"))
            .await
            .expect("should open");

        let err = store
            .put("../escape", &record("../escape", 2))
            .await
            .expect_err("should reject");
        assert!(matches!(err, Error::InvalidName(_)));
        assert!(!dir.path().join("escape.json").exists());
        for err in [
            store.get("../escape").await.map(|_| ()),
            store.exists("../escape").await.map(|_| ()),
        ] {
            assert!(matches!(err, Err(Error::InvalidName(_))));
        }
    }

    #[tokio::test]
    async fn lists_records_sorted_by_name() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store =
            FileRecordStore::open(dir.path()).await.expect("should open");
        store
            .put("NftAuctionV2", &record("NftAuctionV2", 3))
            .await
            .expect("should put");
        store
            .put("NftAuction", &record("NftAuction", 2))
            .await
            .expect("should put");
        std::fs::write(dir.path().join("notes.txt"), "ignored")
            .expect("should write");

        let names: Vec<_> = store
            .list()
            .await
            .expect("should list")
            .into_iter()
            .map(|record| record.logical_name)
            .collect();
        assert_eq!(names, ["NftAuction", "NftAuctionV2"]);
    }
}
