//! Project model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of project a guest can create.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    TextRecognition,
    ImageRecognition,
    ImageRecognitionTeachableMachine,
    PoseRecognitionTeachableMachine,
    CustomAiAgent,
    #[serde(other)]
    Other,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::TextRecognition => "text-recognition",
            ProjectType::ImageRecognition => "image-recognition",
            ProjectType::ImageRecognitionTeachableMachine => "image-recognition-teachable-machine",
            ProjectType::PoseRecognitionTeachableMachine => "pose-recognition-teachable-machine",
            ProjectType::CustomAiAgent => "custom-ai-agent",
            ProjectType::Other => "other",
        }
    }
}

/// Training state of a project as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Untrained,
    Training,
    Trained,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Untrained => "untrained",
            ProjectStatus::Training => "training",
            ProjectStatus::Trained => "trained",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Unknown => "unknown",
        }
    }
}

/// List-view annotation derived from polling; never authoritative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelAvailability {
    Available,
    Unavailable,
}

/// A guest project. Owned by exactly one guest session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_status: Option<ModelAvailability>,
    /// Dataset summary used for training stats; shape is owned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<serde_json::Value>,
}
