//! The BFRuntime session trait.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::BfrtResult;
use crate::types::{DataplaneObject, Entry, EntryKey, RegisterCell};

/// One live session against a compiled pipeline.
///
/// Implementations wrap a device connection (gRPC BFRuntime in production,
/// [`crate::SimSession`] in tests). Components receive the session as an
/// explicit `Arc<dyn BfrtSession>` rather than reaching for a global handle.
///
/// # Errors
///
/// Methods report device statuses as [`crate::BfrtError::Status`] and session
/// loss as [`crate::BfrtError::Transport`]. A wildcard listing of an object
/// with no entries reports `BF_OBJECT_NOT_FOUND`.
///
/// The session assumes a single writer; concurrent external modification of
/// the same pipeline is not coordinated.
#[async_trait]
pub trait BfrtSession: Send + Sync {
    /// Returns the name of the compiled program this session is bound to.
    fn program(&self) -> &str;

    /// Enumerates every object in the pipeline catalog.
    async fn objects(&self) -> BfrtResult<Vec<DataplaneObject>>;

    /// Lists all entries of `object` (wildcard match, not a keyed lookup).
    async fn entries(&self, object: &str) -> BfrtResult<Vec<Entry>>;

    /// Adds a new entry. Fails with `BF_ALREADY_EXISTS` on a duplicate key.
    async fn add_entry(&self, object: &str, entry: Entry) -> BfrtResult<()>;

    /// Overwrites the data of an existing entry with the same key.
    async fn modify_entry(&self, object: &str, entry: Entry) -> BfrtResult<()>;

    /// Removes the entry with `key`.
    async fn remove_entry(&self, object: &str, key: &EntryKey) -> BfrtResult<()>;

    /// Restores the pipeline-defined default action of `object`.
    async fn reset_default(&self, object: &str) -> BfrtResult<()>;

    /// Opens a batch; subsequent writes are sent together.
    async fn batch_begin(&self) -> BfrtResult<()>;

    /// Flushes and closes the open batch.
    async fn batch_end(&self) -> BfrtResult<()>;

    /// Writes the fields of one register index.
    async fn write_register(
        &self,
        name: &str,
        index: u32,
        fields: &BTreeMap<String, u64>,
    ) -> BfrtResult<()>;

    /// Reads every index of a register, optionally syncing from hardware first.
    async fn read_register(&self, name: &str, from_hw: bool) -> BfrtResult<Vec<RegisterCell>>;
}
