//! Backend REST API client.
//!
//! Every endpoint the client consumes goes through the [`Backend`] trait so
//! the components above it can be exercised against a mock server or an
//! in-process fake.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{
    error_message, ApiEnvelope, GuestSession, PredictResponse, Prediction, Project,
    TrainOutcome, TrainResponse, TrainingParams, TrainingStatus,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /guest-session`
    async fn create_guest_session(&self) -> Result<GuestSession>;

    /// `GET /guest-session/{session_id}`
    async fn get_guest_session(&self, session_id: &str) -> Result<GuestSession>;

    /// `GET /projects?session={session_id}`
    async fn list_projects(&self, session_id: &str) -> Result<Vec<Project>>;

    /// `GET /project/{project_id}`
    async fn get_project(&self, project_id: &str) -> Result<Project>;

    /// `POST /project/{project_id}/train`
    async fn train(&self, project_id: &str, params: &TrainingParams) -> Result<TrainOutcome>;

    /// `GET /project/{project_id}/training-status`
    async fn training_status(&self, project_id: &str) -> Result<TrainingStatus>;

    /// `DELETE /project/{project_id}/model?session_id=...`
    async fn delete_model(&self, session_id: &str, project_id: &str) -> Result<()>;

    /// `POST /project/{project_id}/predict`
    async fn predict(&self, project_id: &str, text: &str) -> Result<Prediction>;
}

/// [`Backend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("guestlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Join path segments onto the base URL, escaping each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-2xx response into the matching error.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| status.to_string());
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
            StatusCode::UNPROCESSABLE_ENTITY => Err(Error::Validation(message)),
            _ => {
                warn!(status = status.as_u16(), %message, "Backend returned an error");
                Err(Error::Backend {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let status = response.status().as_u16();
        let envelope: ApiEnvelope<T> = response.json().await?;
        envelope.into_data(status)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create_guest_session(&self) -> Result<GuestSession> {
        let url = self.url(&["guest-session"])?;
        let response = self.client.post(url).json(&json!({})).send().await?;
        let session: GuestSession = Self::envelope(response).await?;
        debug!(session_id = %session.session_id, "Created guest session");
        Ok(session)
    }

    async fn get_guest_session(&self, session_id: &str) -> Result<GuestSession> {
        let url = self.url(&["guest-session", session_id])?;
        let response = self.client.get(url).send().await?;
        Self::envelope(response).await
    }

    async fn list_projects(&self, session_id: &str) -> Result<Vec<Project>> {
        let url = self.url(&["projects"])?;
        let response = self
            .client
            .get(url)
            .query(&[("session", session_id)])
            .send()
            .await?;
        Self::envelope(response).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Project> {
        let url = self.url(&["project", project_id])?;
        let response = self.client.get(url).send().await?;
        Self::envelope(response).await
    }

    async fn train(&self, project_id: &str, params: &TrainingParams) -> Result<TrainOutcome> {
        let url = self.url(&["project", project_id, "train"])?;
        let response = self.client.post(url).json(params).send().await?;
        let body: TrainResponse = Self::check(response).await?.json().await?;
        body.into_outcome()
    }

    async fn training_status(&self, project_id: &str) -> Result<TrainingStatus> {
        let url = self.url(&["project", project_id, "training-status"])?;
        let response = self.client.get(url).send().await?;
        let status: TrainingStatus = Self::check(response).await?.json().await?;
        if !status.success {
            return Err(Error::Backend {
                status: 200,
                message: "training status request was not successful".into(),
            });
        }
        Ok(status)
    }

    async fn delete_model(&self, session_id: &str, project_id: &str) -> Result<()> {
        let url = self.url(&["project", project_id, "model"])?;
        let response = self
            .client
            .delete(url)
            .query(&[("session_id", session_id)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn predict(&self, project_id: &str, text: &str) -> Result<Prediction> {
        let url = self.url(&["project", project_id, "predict"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let body: PredictResponse = Self::check(response).await?.json().await?;
        body.into_prediction()
    }
}
