//! Masked token <-> internal id mappings.
//!
//! The only place the two kinds of identifier are reconciled. Mappings are
//! keyed by token; the reverse direction is a prefix scan.

use std::sync::Arc;

use guestlab_kv::KeyValueStore;
use guestlab_mask::{mask, IdKind, MAX_MASK_ATTEMPTS};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::keys::Keys;

/// Result of [`MappingStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    AlreadyPresent,
}

#[derive(Clone)]
pub struct MappingStore {
    store: Arc<dyn KeyValueStore>,
    keys: Keys,
}

impl MappingStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: Keys) -> Self {
        Self { store, keys }
    }

    pub async fn get_internal_id(&self, kind: IdKind, token: &str) -> Result<Option<String>> {
        Ok(self.store.get(&self.keys.mapping(kind, token)).await?)
    }

    /// Store a mapping. Re-storing an identical pair is a no-op; anything
    /// that would give a token or an internal id a second partner is a
    /// [`Error::MappingConflict`].
    pub async fn put(&self, kind: IdKind, token: &str, internal_id: &str) -> Result<PutOutcome> {
        if let Some(existing) = self.get_internal_id(kind, token).await? {
            if existing == internal_id {
                return Ok(PutOutcome::AlreadyPresent);
            }
            return Err(Error::MappingConflict {
                token: token.to_string(),
                existing,
                requested: internal_id.to_string(),
            });
        }

        if let Some(other) = self.find_token_for(kind, internal_id).await? {
            return Err(Error::MappingConflict {
                token: other,
                existing: internal_id.to_string(),
                requested: internal_id.to_string(),
            });
        }

        self.store
            .set(&self.keys.mapping(kind, token), internal_id)
            .await?;
        Ok(PutOutcome::Inserted)
    }

    /// Reverse lookup: the token already minted for `internal_id`, if any.
    pub async fn find_token_for(&self, kind: IdKind, internal_id: &str) -> Result<Option<String>> {
        let prefix = self.keys.mapping_prefix(kind);
        let entries = self.store.scan_prefix(&prefix).await?;
        Ok(entries
            .into_iter()
            .find(|(_, value)| value == internal_id)
            .map(|(key, _)| key[prefix.len()..].to_string()))
    }

    /// Return the existing token for `internal_id`, minting and storing one
    /// if there is none.
    ///
    /// A freshly derived token that already belongs to another id is
    /// re-derived with the next attempt number instead of being shared.
    pub async fn get_or_create(&self, kind: IdKind, internal_id: &str) -> Result<String> {
        if let Some(token) = self.find_token_for(kind, internal_id).await? {
            return Ok(token);
        }

        for attempt in 0..MAX_MASK_ATTEMPTS {
            let token = mask(internal_id, kind, attempt);
            match self.put(kind, &token, internal_id).await {
                Ok(_) => {
                    info!(kind = %kind, token = %token, "Minted masked id");
                    return Ok(token);
                }
                Err(Error::MappingConflict { existing, .. }) if existing != internal_id => {
                    warn!(
                        kind = %kind,
                        token = %token,
                        attempt,
                        "Masked id collision, re-deriving"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::MappingConflict {
            token: mask(internal_id, kind, 0),
            existing: "<exhausted>".to_string(),
            requested: internal_id.to_string(),
        })
    }

    pub async fn set_current(&self, token: &str) -> Result<()> {
        self.store.set(&self.keys.current_masked_id(), token).await?;
        Ok(())
    }

    pub async fn get_current(&self) -> Result<Option<String>> {
        Ok(self.store.get(&self.keys.current_masked_id()).await?)
    }

    /// Drop every mapping that belongs to a dead session.
    ///
    /// Project mappings are cleared wholesale: a client store only ever
    /// holds one guest session's projects.
    pub async fn purge_session(&self, session_id: &str) -> Result<()> {
        let prefix = self.keys.mapping_prefix(IdKind::Session);
        let current = self.get_current().await?;

        for (key, value) in self.store.scan_prefix(&prefix).await? {
            if value != session_id {
                continue;
            }
            self.store.remove(&key).await?;
            let token = &key[prefix.len()..];
            if current.as_deref() == Some(token) {
                self.store.remove(&self.keys.current_masked_id()).await?;
            }
        }

        let removed = self
            .store
            .remove_prefix(&self.keys.mapping_prefix(IdKind::Project))
            .await?;
        debug!(removed, "Purged project mappings");
        Ok(())
    }
}
