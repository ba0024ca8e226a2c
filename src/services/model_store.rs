//! Last known trained model per (session, project).
//!
//! Lets a reload show the model without waiting for a poll. The backend
//! stays authoritative whenever it can be reached.

use std::sync::Arc;

use guestlab_kv::KeyValueStore;
use tracing::{debug, warn};

use crate::error::Result;
use crate::keys::Keys;
use crate::models::TrainedModel;

#[derive(Clone)]
pub struct ModelLifecycleStore {
    store: Arc<dyn KeyValueStore>,
    keys: Keys,
}

impl ModelLifecycleStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    /// A record that no longer decodes is treated as absent.
    pub async fn get(&self, session_id: &str, project_id: &str) -> Result<Option<TrainedModel>> {
        let key = self.keys.model(session_id, project_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(model) => Ok(Some(model)),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable model record");
                self.store.remove(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn put(
        &self,
        session_id: &str,
        project_id: &str,
        model: &TrainedModel,
    ) -> Result<()> {
        let raw = serde_json::to_string(model)?;
        self.store
            .set(&self.keys.model(session_id, project_id), &raw)
            .await?;
        debug!(project_id, model_id = %model.id, "Persisted trained model");
        Ok(())
    }

    /// Clears exactly this pair's record. Returns whether one existed.
    pub async fn remove(&self, session_id: &str, project_id: &str) -> Result<bool> {
        Ok(self
            .store
            .remove(&self.keys.model(session_id, project_id))
            .await?)
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .store
            .remove_prefix(&self.keys.model_prefix(session_id))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use guestlab_kv::MemoryStore;

    fn store() -> (ModelLifecycleStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (ModelLifecycleStore::new(kv.clone(), Keys::new("guestlab")), kv)
    }

    #[tokio::test]
    async fn test_put_get_remove_exact_key() {
        let (models, _) = store();
        let model = TrainedModel::default_window("p1", Duration::hours(24), Utc::now());

        models.put("s1", "p1", &model).await.unwrap();
        models.put("s1", "p2", &model).await.unwrap();

        assert_eq!(models.get("s1", "p1").await.unwrap(), Some(model.clone()));
        assert!(models.remove("s1", "p1").await.unwrap());
        assert!(models.get("s1", "p1").await.unwrap().is_none());
        assert!(models.get("s1", "p2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_session_leaves_other_sessions() {
        let (models, _) = store();
        let model = TrainedModel::default_window("p1", Duration::hours(24), Utc::now());
        models.put("s1", "p1", &model).await.unwrap();
        models.put("s1", "p2", &model).await.unwrap();
        models.put("s2", "p1", &model).await.unwrap();

        assert_eq!(models.clear_session("s1").await.unwrap(), 2);
        assert!(models.get("s2", "p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_absent() {
        let (models, kv) = store();
        kv.set("guestlab:model:s1:p1", "{not json").await.unwrap();

        assert!(models.get("s1", "p1").await.unwrap().is_none());
        assert!(kv.get("guestlab:model:s1:p1").await.unwrap().is_none());
    }
}
