//! Guest session validation.
//!
//! `Unchecked -> {Valid, Invalid}`. A local expiry check runs first and can
//! fail the session without touching the network. Otherwise the backend's
//! record decides.
//!
//! Authoritative failures (not found, inactive, expired) purge every piece
//! of local state tied to the session. A transport failure does not: the
//! guard reports `ERROR_FALLBACK` and leaves the cached identity alone so a
//! later retry can succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use guestlab_kv::KeyValueStore;
use guestlab_mask::IdKind;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keys::Keys;
use crate::models::{GuestSession, LocalSession};
use crate::services::{Backend, MappingStore, ModelLifecycleStore};

/// Why a session was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    ExpiredLocal,
    NotFoundBackend,
    InactiveBackend,
    ExpiredBackend,
    ErrorFallback,
}

impl CleanupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupReason::ExpiredLocal => "EXPIRED_LOCAL",
            CleanupReason::NotFoundBackend => "NOT_FOUND_BACKEND",
            CleanupReason::InactiveBackend => "INACTIVE_BACKEND",
            CleanupReason::ExpiredBackend => "EXPIRED_BACKEND",
            CleanupReason::ErrorFallback => "ERROR_FALLBACK",
        }
    }

    /// Whether local state for the session must be destroyed.
    pub fn purges_state(&self) -> bool {
        !matches!(self, CleanupReason::ErrorFallback)
    }
}

impl std::fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuardState {
    #[default]
    Unchecked,
    Valid {
        session: GuestSession,
    },
    Invalid(CleanupReason),
}

impl GuardState {
    pub fn is_valid(&self) -> bool {
        matches!(self, GuardState::Valid { .. })
    }

    /// Authoritative expiry, once validated.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GuardState::Valid { session } => Some(session.expires_at),
            _ => None,
        }
    }
}

pub struct SessionGuard {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    keys: Keys,
    mappings: MappingStore,
    models: ModelLifecycleStore,
    ttl: chrono::Duration,
    state: RwLock<GuardState>,
}

impl SessionGuard {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        keys: Keys,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            mappings: MappingStore::new(store.clone(), keys.clone()),
            models: ModelLifecycleStore::new(store.clone(), keys.clone()),
            backend,
            store,
            keys,
            ttl,
            state: RwLock::new(GuardState::Unchecked),
        }
    }

    pub async fn state(&self) -> GuardState {
        self.state.read().await.clone()
    }

    /// Start over for a new page load.
    pub async fn reset(&self) {
        *self.state.write().await = GuardState::Unchecked;
    }

    /// The locally recorded session, if a complete record exists.
    pub async fn local_session(&self) -> Result<Option<LocalSession>> {
        let Some(session_id) = self.store.get(&self.keys.session_id()).await? else {
            return Ok(None);
        };
        let created_at = self.read_time(&self.keys.session_created_at()).await?;
        let expires_at = self.read_time(&self.keys.session_expires_at()).await?;
        let last_activity = self.read_time(&self.keys.session_last_activity()).await?;

        match (created_at, expires_at) {
            (Some(created_at), Some(expires_at)) => Ok(Some(LocalSession {
                session_id,
                created_at,
                expires_at,
                last_activity,
            })),
            _ => Ok(None),
        }
    }

    /// Record a session the backend just issued.
    ///
    /// The local expiry is `created_at + ttl`, capped at the backend's own
    /// expiry so the fast path never outlives the real record.
    pub async fn begin(&self, session: &GuestSession) -> Result<LocalSession> {
        let local = LocalSession {
            session_id: session.session_id.clone(),
            created_at: session.created_at,
            expires_at: (session.created_at + self.ttl).min(session.expires_at),
            last_activity: Some(Utc::now()),
        };
        self.write_local(&local).await?;
        info!(
            session_id = %local.session_id,
            expires_at = %local.expires_at,
            "Recorded guest session"
        );
        Ok(local)
    }

    /// The visitor's session and its masked token, creating the session on
    /// the backend the first time through.
    pub async fn ensure_session(&self) -> Result<(LocalSession, String)> {
        let local = match self.local_session().await? {
            Some(local) if !local.is_expired(Utc::now()) => local,
            stale => {
                if let Some(expired) = stale {
                    info!(
                        session_id = %expired.session_id,
                        reason = %CleanupReason::ExpiredLocal,
                        "Replacing expired session, purging local state"
                    );
                    self.purge(&expired.session_id).await?;
                }
                let session = self.backend.create_guest_session().await?;
                self.begin(&session).await?
            }
        };
        let token = self
            .mappings
            .get_or_create(IdKind::Session, &local.session_id)
            .await?;
        self.mappings.set_current(&token).await?;
        Ok((local, token))
    }

    /// Validate an internal session id.
    ///
    /// Only store failures surface as `Err`; every backend answer, including
    /// no answer, maps onto a [`GuardState`].
    pub async fn validate(&self, session_id: &str) -> Result<GuardState> {
        if let GuardState::Invalid(reason) = *self.state.read().await {
            return Ok(GuardState::Invalid(reason));
        }

        let now = Utc::now();
        let local = self
            .local_session()
            .await?
            .filter(|l| l.session_id == session_id);

        if let Some(local) = &local {
            if local.is_expired(now) {
                return self.invalidate(session_id, CleanupReason::ExpiredLocal).await;
            }
        }

        let session = match self.backend.get_guest_session(session_id).await {
            Ok(session) => session,
            Err(e) if e.is_authoritative() => {
                return self.invalidate(session_id, CleanupReason::NotFoundBackend).await;
            }
            Err(e) => {
                warn!(session_id, error = %e, "Session lookup failed, keeping local state");
                return self.invalidate(session_id, CleanupReason::ErrorFallback).await;
            }
        };

        if !session.active {
            return self.invalidate(session_id, CleanupReason::InactiveBackend).await;
        }
        if session.is_expired(now) {
            return self.invalidate(session_id, CleanupReason::ExpiredBackend).await;
        }

        // The backend's expiry replaces the local estimate.
        let reconciled = LocalSession {
            session_id: session.session_id.clone(),
            created_at: local.as_ref().map_or(session.created_at, |l| l.created_at),
            expires_at: session.expires_at,
            last_activity: Some(now),
        };
        self.write_local(&reconciled).await?;

        debug!(session_id, expires_at = %session.expires_at, "Session valid");
        let state = GuardState::Valid { session };
        *self.state.write().await = state.clone();
        Ok(state)
    }

    async fn invalidate(&self, session_id: &str, reason: CleanupReason) -> Result<GuardState> {
        if reason.purges_state() {
            info!(session_id, reason = %reason, "Session invalid, purging local state");
            self.purge(session_id).await?;
        } else {
            warn!(session_id, reason = %reason, "Session could not be validated");
        }
        let state = GuardState::Invalid(reason);
        *self.state.write().await = state.clone();
        Ok(state)
    }

    /// Remove every locally stored trace of a session.
    pub async fn purge(&self, session_id: &str) -> Result<()> {
        self.mappings.purge_session(session_id).await?;
        self.models.clear_session(session_id).await?;

        if self.store.get(&self.keys.session_id()).await?.as_deref() == Some(session_id) {
            for key in [
                self.keys.session_id(),
                self.keys.session_created_at(),
                self.keys.session_expires_at(),
                self.keys.session_last_activity(),
            ] {
                self.store.remove(&key).await?;
            }
        }
        Ok(())
    }

    async fn write_local(&self, local: &LocalSession) -> Result<()> {
        self.store
            .set(&self.keys.session_id(), &local.session_id)
            .await?;
        self.store
            .set(&self.keys.session_created_at(), &local.created_at.to_rfc3339())
            .await?;
        self.store
            .set(&self.keys.session_expires_at(), &local.expires_at.to_rfc3339())
            .await?;
        match local.last_activity {
            Some(at) => {
                self.store
                    .set(&self.keys.session_last_activity(), &at.to_rfc3339())
                    .await?
            }
            None => {
                self.store.remove(&self.keys.session_last_activity()).await?;
            }
        }
        Ok(())
    }

    async fn read_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc)))
    }
}
