//! In-memory store, used by tests and for throwaway state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Error, KeyValueStore, Result};

#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Option<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Number of stored keys, or 0 once closed.
    pub async fn len(&self) -> usize {
        self.inner.read().await.as_ref().map_or(0, |m| m.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.inner.read().await;
        let map = guard.as_ref().ok_or(Error::Closed)?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.inner.write().await;
        let map = guard.as_mut().ok_or(Error::Closed)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let map = guard.as_mut().ok_or(Error::Closed)?;
        Ok(map.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let guard = self.inner.read().await;
        let map = guard.as_ref().ok_or(Error::Closed)?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64> {
        let mut guard = self.inner.write().await;
        let map = guard.as_mut().ok_or(Error::Closed)?;
        let before = map.len();
        map.retain(|k, _| !k.starts_with(prefix));
        Ok((before - map.len()) as u64)
    }

    async fn close(&self) -> Result<()> {
        *self.inner.write().await = None;
        Ok(())
    }
}
