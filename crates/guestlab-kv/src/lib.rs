//! Persistent key/value capability for guestlab client state.
//!
//! Every component that remembers something across reloads (masked id
//! mappings, the current session pointer, trained model projections) goes
//! through [`KeyValueStore`]. Production code opens a [`SqliteStore`];
//! tests use a [`MemoryStore`].
//!
//! The store is shared by every open client on the same machine, so writes
//! are last-write-wins. Values are either idempotent caches or projections
//! the backend stays authoritative for.

use async_trait::async_trait;

mod error;
mod memory;
mod sqlite;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// String key/value storage with prefix scans.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Remove every key starting with `prefix`. Returns how many were removed.
    async fn remove_prefix(&self, prefix: &str) -> Result<u64>;

    /// Release the underlying resources. Later calls fail with [`Error::Closed`].
    async fn close(&self) -> Result<()>;
}
