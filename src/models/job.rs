//! Training job models and the training endpoint payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProjectStatus;
use crate::error::{Error, Result};

/// Training job status.
///
/// `pending -> running -> {ready | failed}`; `ready` and `failed` are
/// terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    #[serde(alias = "completed")]
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// A backend training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJob {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Percent complete, 0..=100
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /project/{id}/training-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub project_status: ProjectStatus,
    #[serde(default)]
    pub current_job: Option<TrainingJob>,
    #[serde(default)]
    pub all_jobs: Vec<TrainingJob>,
    #[serde(default)]
    pub total_jobs: u64,
}

fn default_true() -> bool {
    true
}

/// Hyperparameters sent with `POST /project/{id}/train`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingParams {
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub validation_split: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.001,
            validation_split: 0.2,
        }
    }
}

impl TrainingParams {
    /// Reject configurations the backend would refuse with a 422.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Validation("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Validation("batchSize must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::Validation(
                "learningRate must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.validation_split) {
            return Err(Error::Validation(
                "validationSplit must be in [0, 0.5]".into(),
            ));
        }
        Ok(())
    }
}

/// What a successful training request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    /// Training finished inside the request; no job was ever observable.
    ImmediateCompletion { message: String },
    /// Training continues in the background under this job.
    JobHandle { job_id: String },
}

/// Raw body of `POST /project/{id}/train`. Only decoded here, then turned
/// into a [`TrainOutcome`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrainResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TrainResponse {
    pub(crate) fn into_outcome(self) -> Result<TrainOutcome> {
        if !self.success {
            return Err(Error::Backend {
                status: 200,
                message: self
                    .error
                    .or(self.message)
                    .unwrap_or_else(|| "training request was not accepted".into()),
            });
        }

        let nested_job_id = self
            .data
            .as_ref()
            .and_then(|d| d.get("jobId"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match self.job_id.or(nested_job_id) {
            Some(job_id) => Ok(TrainOutcome::JobHandle { job_id }),
            None => Ok(TrainOutcome::ImmediateCompletion {
                message: self
                    .message
                    .unwrap_or_else(|| "Training completed successfully!".into()),
            }),
        }
    }
}

/// One label/score pair from a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub confidence: f64,
}

/// Result of `POST /project/{id}/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<LabelScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<LabelScore>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PredictResponse {
    pub(crate) fn into_prediction(self) -> Result<Prediction> {
        match (self.success, self.label, self.confidence) {
            (true, Some(label), Some(confidence)) => Ok(Prediction {
                label,
                confidence,
                alternatives: self.alternatives,
            }),
            _ => Err(Error::NotReady(
                self.error
                    .unwrap_or_else(|| "prediction returned no label".into()),
            )),
        }
    }
}
