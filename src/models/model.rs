//! Client-side projection of a trained model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TrainingJob;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrainedModelStatus {
    Training,
    Available,
    Failed,
}

/// What the client believes about a project's trained model.
///
/// `expires_at` is a display value only; the backend owns actual deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainedModel {
    pub id: String,
    pub status: TrainedModelStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Build an available model from a finished job.
    ///
    /// The display window starts when the job started (or was created) and
    /// ends `ttl` after it completed.
    pub fn from_job(job: &TrainingJob, ttl: Duration, now: DateTime<Utc>) -> Self {
        let started_at = job.started_at.or(job.created_at).unwrap_or(now);
        let finished_at = job.completed_at.unwrap_or(now);
        Self {
            id: job.id.clone(),
            status: TrainedModelStatus::Available,
            started_at,
            expires_at: finished_at + ttl,
        }
    }

    /// A plausible window for a model the backend says exists but that
    /// left no job or local record behind.
    pub fn default_window(project_id: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("model_{}", project_id),
            status: TrainedModelStatus::Available,
            started_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left on the display window, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Local belief about a project's model, derived by reconciliation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelState {
    #[default]
    Untrained,
    Training {
        job_id: Option<String>,
        progress: Option<f64>,
    },
    Available(TrainedModel),
    Failed {
        error: Option<String>,
    },
}

impl ModelState {
    pub fn is_available(&self) -> bool {
        matches!(self, ModelState::Available(_))
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        match self {
            ModelState::Available(model) => Some(model),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Untrained => "untrained",
            ModelState::Training { .. } => "training",
            ModelState::Available(_) => "available",
            ModelState::Failed { .. } => "failed",
        }
    }
}

/// Everything the UI shows about one project's training.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectTrainingView {
    pub state: ModelState,
    /// The job driving the view; only kept while training.
    pub current_job: Option<TrainingJob>,
}
