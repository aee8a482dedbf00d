use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use super::{validate_name, RecordStore};
use crate::{record::DeploymentRecord, Error, Result};

/// Process-local [`RecordStore`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, DeploymentRecord>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn records(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<String, DeploymentRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryRecordStore {
    async fn put(&self, name: &str, record: &DeploymentRecord) -> Result<()> {
        validate_name(name)?;
        self.records().insert(name.to_owned(), record.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<DeploymentRecord> {
        validate_name(name)?;
        self.records()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound { name: name.to_owned() })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.records().contains_key(name))
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        Ok(self.records().values().cloned().collect())
    }
}
