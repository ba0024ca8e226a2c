//! Service layer for guestlab.
//!
//! - Backend (REST API client)
//! - MappingStore / IdentityResolver (masked ids in URLs)
//! - SessionGuard (guest session validation and cleanup)
//! - TrainingJobPoller / ModelLifecycleStore (training state)
//! - PageFlow (page-level orchestration)

mod backend;
mod mapping_store;
mod model_store;
mod page_flow;
mod resolver;
mod session_guard;
mod training;

pub use backend::{Backend, HttpBackend};
pub use mapping_store::{MappingStore, PutOutcome};
pub use model_store::ModelLifecycleStore;
pub use page_flow::{PageFlow, PageOutcome, ProjectLink};
pub use resolver::{IdentityResolver, RedirectReason, Resolution};
pub use session_guard::{CleanupReason, GuardState, SessionGuard};
pub use training::{
    reconcile, DelayedPoll, PollOutcome, Reconciliation, TrainingJobPoller, TrainingSubmission,
};
