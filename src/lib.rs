//! guestlab - guest sessions and training state for registration-free ML
//! projects.
//!
//! Visitors work in a temporary guest session. Every session and project is
//! addressed by a short masked token in the URL, never by the backend's
//! internal id. The client validates sessions against the backend, cleans
//! up local state when a session dies, and keeps a local projection of each
//! project's training job and model.

pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::{init as init_config, Config};
pub use error::{Error, Result};
pub use routes::Location;
pub use services::{PageFlow, PageOutcome};
pub use state::AppState;

pub use guestlab_kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use guestlab_mask::IdKind;
