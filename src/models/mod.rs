//! Data models for guestlab.
//!
//! Wire shapes of the backend API plus the client-side projections built
//! from them.

mod envelope;
mod job;
mod model;
mod project;
mod session;

pub(crate) use envelope::{error_message, ApiEnvelope};
pub(crate) use job::{PredictResponse, TrainResponse};
pub use job::*;
pub use model::*;
pub use project::*;
pub use session::*;
