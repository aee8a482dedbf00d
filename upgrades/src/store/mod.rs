//! Persistence of deployment records, keyed by logical name.
use std::future::Future;

use crate::{record::DeploymentRecord, Error, Result};

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

/// Durable map from logical name to [`DeploymentRecord`].
///
/// Writers are expected to serialize per lineage; the store itself only
/// guarantees that a single `put` is never observed half-written.
pub trait RecordStore: Send + Sync {
    /// Creates or overwrites the record under `name`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidName`] - If `name` is not a valid logical name.
    /// * [`Error::Storage`] - If the record cannot be written.
    fn put(
        &self,
        name: &str,
        record: &DeploymentRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The record under `name`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidName`] - If `name` is not a valid logical name.
    /// * [`Error::NotFound`] - If no record exists under `name`.
    /// * [`Error::Storage`] - If the record cannot be read.
    fn get(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DeploymentRecord>> + Send;

    /// Whether a record exists under `name`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidName`] - If `name` is not a valid logical name.
    /// * [`Error::Storage`] - If the store cannot be inspected.
    fn exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Every record, sorted by logical name.
    ///
    /// # Errors
    ///
    /// * [`Error::Storage`] - If the store cannot be read.
    fn list(
        &self,
    ) -> impl Future<Output = Result<Vec<DeploymentRecord>>> + Send;
}

/// Checks that `name` can be used as a logical name: one or more of
/// `[A-Za-z0-9_.-]`, and neither `.` nor `..`.
///
/// # Errors
///
/// * [`Error::InvalidName`] - Otherwise.
pub fn validate_name(name: &str) -> Result<()> {
    let allowed = |b: u8| b.is_ascii_alphanumeric() || b"_.-".contains(&b);
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name.bytes().all(allowed);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_owned()))
    }
}
