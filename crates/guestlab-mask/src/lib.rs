//! Masked identifiers for guestlab.
//!
//! Sessions and projects are addressed by backend-issued internal ids that
//! must not show up in a shareable URL. This crate derives the short tokens
//! that stand in for them and classifies untrusted URL segments by shape.
//!
//! Nothing here touches storage: turning a token back into an internal id is
//! a lookup, done by the mapping store in the main crate.

pub mod codec;

pub use codec::{looks_like_internal_id, looks_like_masked_token, mask, MAX_MASK_ATTEMPTS};

/// Which kind of resource an identifier addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Session,
    Project,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Session => "session",
            IdKind::Project => "project",
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a URL segment, decided without any store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Looks like a masked token of the requested kind.
    Masked,
    /// Looks like a raw internal id of the requested kind.
    Internal,
    /// Neither; the caller must redirect to a safe default.
    Invalid,
}

/// Classify an untrusted URL segment for the given kind.
pub fn classify(segment: &str, kind: IdKind) -> Segment {
    if looks_like_masked_token(segment, kind) {
        Segment::Masked
    } else if looks_like_internal_id(segment, kind) {
        Segment::Internal
    } else {
        Segment::Invalid
    }
}
