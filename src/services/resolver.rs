//! Resolve URL segments into canonical masked tokens.
//!
//! A segment is one of three things: a masked token (looked up, never
//! invented), a raw internal id (masked and redirected so it leaves the
//! address bar) or garbage (sent to the list view). Sessions and projects go
//! through the same three branches independently.

use guestlab_mask::{classify, IdKind, Segment};
use tracing::{debug, info};

use crate::error::Result;
use crate::services::MappingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// Well-formed token with no mapping in this store (stale or foreign).
    UnknownToken,
    /// Matches neither the token nor the internal id shape.
    Malformed,
}

impl RedirectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectReason::UnknownToken => "unknown_token",
            RedirectReason::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The segment already is the canonical token.
    Resolved { token: String, internal_id: String },
    /// The segment was an internal id; the page must move to `token`.
    RedirectCanonical { token: String, internal_id: String },
    /// Nothing usable; go to the default list view.
    RedirectDefault(RedirectReason),
}

impl Resolution {
    pub fn internal_id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { internal_id, .. }
            | Resolution::RedirectCanonical { internal_id, .. } => Some(internal_id),
            Resolution::RedirectDefault(_) => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { token, .. } | Resolution::RedirectCanonical { token, .. } => {
                Some(token)
            }
            Resolution::RedirectDefault(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    mappings: MappingStore,
}

impl IdentityResolver {
    pub fn new(mappings: MappingStore) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &MappingStore {
        &self.mappings
    }

    pub async fn resolve(&self, segment: &str, kind: IdKind) -> Result<Resolution> {
        let resolution = match classify(segment, kind) {
            Segment::Masked => match self.mappings.get_internal_id(kind, segment).await? {
                Some(internal_id) => Resolution::Resolved {
                    token: segment.to_string(),
                    internal_id,
                },
                None => {
                    debug!(kind = %kind, token = %segment, "Unknown masked token");
                    Resolution::RedirectDefault(RedirectReason::UnknownToken)
                }
            },
            Segment::Internal => {
                let token = self.mappings.get_or_create(kind, segment).await?;
                info!(kind = %kind, token = %token, "Redirecting internal id to masked token");
                Resolution::RedirectCanonical {
                    token,
                    internal_id: segment.to_string(),
                }
            }
            Segment::Invalid => Resolution::RedirectDefault(RedirectReason::Malformed),
        };

        if kind == IdKind::Session {
            if let Some(token) = resolution.token() {
                self.mappings.set_current(token).await?;
            }
        }
        Ok(resolution)
    }

    /// Token for an internal id the caller already holds, e.g. a project
    /// just created on the backend. Never mints a second token.
    pub async fn token_for(&self, kind: IdKind, internal_id: &str) -> Result<String> {
        if kind == IdKind::Session {
            if let Some(current) = self.mappings.get_current().await? {
                let mapped = self.mappings.get_internal_id(kind, &current).await?;
                if mapped.as_deref() == Some(internal_id) {
                    return Ok(current);
                }
            }
        }
        self.mappings.get_or_create(kind, internal_id).await
    }
}
