//! Optimistic concurrency for versioned records.
//!
//! A writer reads a record, mutates its in-memory copy and then issues one
//! conditional write keyed on `(id, version it read)`. Storage bumps the
//! version by exactly one when the key still matches; otherwise nothing is
//! written and the caller gets [`StoreError::EditConflict`]. No lock is held
//! between the read and the write and nothing is retried here: a retry has to
//! start over from a fresh read.

use async_trait::async_trait;

use crate::database::StoreError;

/// A record carrying a row id and an integer version stamp
pub trait Versioned {
    fn id(&self) -> i64;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalWrite {
    Applied { version: i32 },
    NoRowsMatched,
}

/// Storage contract for versioned records
#[async_trait]
pub trait VersionedStore<T>: Send + Sync
where
    T: Versioned + Send + Sync + 'static,
{
    /// Current copy of the record; `StoreError::NotFound` if it never existed or was removed
    async fn fetch(&self, id: i64) -> Result<T, StoreError>;

    /// Write every mutable field and set `version = record.version() + 1`,
    /// but only where the stored version still equals `record.version()`.
    async fn write_if_version(&self, record: &T) -> Result<ConditionalWrite, StoreError>;
}

/// Issue the conditional write for `record` and adopt the new version on success.
pub async fn commit<T, S>(store: &S, record: &mut T) -> Result<i32, StoreError>
where
    T: Versioned + Send + Sync + 'static,
    S: VersionedStore<T> + ?Sized,
{
    let expected = record.version();
    match store.write_if_version(record).await? {
        ConditionalWrite::Applied { version } => {
            record.set_version(version);
            Ok(version)
        }
        ConditionalWrite::NoRowsMatched => {
            tracing::debug!(id = record.id(), expected, "conditional write matched no rows");
            Err(StoreError::EditConflict)
        }
    }
}

/// Read, mutate through `apply`, then commit.
///
/// `apply` may reject the change with its own error (validation, a stale
/// client-supplied version). A missing record surfaces from the read as
/// `NotFound`; once the read has succeeded, a write that matches nothing is
/// always an edit conflict.
pub async fn update_with<T, S, E, F>(store: &S, id: i64, apply: F) -> Result<T, E>
where
    T: Versioned + Send + Sync + 'static,
    S: VersionedStore<T> + ?Sized,
    E: From<StoreError> + Send,
    F: FnOnce(&mut T) -> Result<(), E> + Send,
{
    let mut record = store.fetch(id).await?;
    let observed = record.version();

    apply(&mut record)?;
    record.set_version(observed);

    commit(store, &mut record).await?;
    Ok(record)
}
