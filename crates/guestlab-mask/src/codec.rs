//! Token derivation and shape checks.
//!
//! Session tokens are 8 lowercase hex characters. Project tokens are the
//! same 8 characters behind a `p` prefix, so the two never overlap.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::IdKind;

/// Upper bound on collision re-derivations before a caller gives up.
pub const MAX_MASK_ATTEMPTS: u32 = 16;

const PROJECT_TOKEN_PREFIX: &str = "p";

static SESSION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{8}$").unwrap());
static PROJECT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^p[0-9a-f]{8}$").unwrap());
static SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^session_[A-Za-z0-9]{16,}$").unwrap());
static PROJECT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^project_[A-Za-z0-9_-]{8,}$").unwrap());

/// Derive the masked token for an internal id.
///
/// The token is the first 4 bytes of `SHA-256(kind | id | attempt)`, hex
/// encoded. `attempt` is 0 for the normal token; callers bump it only when
/// the attempt-0 token is already held by a different id.
///
/// # Example
/// ```
/// use guestlab_mask::{mask, IdKind};
/// let token = mask("session_abcdef0123456789", IdKind::Session, 0);
/// assert_eq!(token.len(), 8);
/// assert_eq!(token, mask("session_abcdef0123456789", IdKind::Session, 0));
/// ```
pub fn mask(internal_id: &str, kind: IdKind, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(internal_id.as_bytes());
    hasher.update(b"|");
    hasher.update(attempt.to_le_bytes());
    let hash = hasher.finalize();

    let body = hex::encode(&hash[..4]);
    match kind {
        IdKind::Session => body,
        IdKind::Project => format!("{}{}", PROJECT_TOKEN_PREFIX, body),
    }
}

/// Lexical check only: length, charset and prefix for the kind.
pub fn looks_like_masked_token(candidate: &str, kind: IdKind) -> bool {
    match kind {
        IdKind::Session => SESSION_TOKEN.is_match(candidate),
        IdKind::Project => PROJECT_TOKEN.is_match(candidate),
    }
}

/// Lexical check on the unmasked, backend-issued shape.
pub fn looks_like_internal_id(candidate: &str, kind: IdKind) -> bool {
    match kind {
        IdKind::Session => SESSION_ID.is_match(candidate),
        IdKind::Project => {
            PROJECT_ID.is_match(candidate)
                || (candidate.len() == 36 && uuid::Uuid::parse_str(candidate).is_ok())
        }
    }
}
