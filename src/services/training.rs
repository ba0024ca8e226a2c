//! Training job polling and reconciliation.
//!
//! Local belief about a project's model is rebuilt from three signals: the
//! backend's project status, its current job, and the model record persisted
//! by [`ModelLifecycleStore`]. Polls are single-shot and event driven (page
//! mount, a short delay after a training request); nothing here runs on a
//! recurring timer.
//!
//! At most one poll per project is in flight. A poll that arrives while
//! another is outstanding is dropped, not queued.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    JobStatus, ModelAvailability, ModelState, Prediction, Project, ProjectStatus,
    ProjectTrainingView, TrainOutcome, TrainedModel, TrainingJob, TrainingParams,
    TrainingStatus,
};
use crate::services::{Backend, ModelLifecycleStore};

/// What a training-status response means for the local view.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Training { job: Option<TrainingJob> },
    Available { model: TrainedModel, persist: bool },
    Failed { error: Option<String> },
    Untrained,
    /// Nothing the client understands; keep the current view.
    Indeterminate,
}

/// Derive the local state from one status response.
///
/// Rows are checked in order:
///
/// | project status | current job              | result                         |
/// |----------------|--------------------------|--------------------------------|
/// | training       | running / pending        | training                       |
/// | training       | ready, `completedAt` set | available, from the job        |
/// | trained        | ready, `completedAt` set | available, from the job        |
/// | trained        | anything else            | available, persisted or default|
/// | failed, or job failed                     || failed                         |
/// | untrained      |                          | nothing                        |
pub fn reconcile(
    project_id: &str,
    status: &TrainingStatus,
    persisted: Option<&TrainedModel>,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Reconciliation {
    let job = status.current_job.as_ref();
    let job_failed = job.is_some_and(|j| j.status == JobStatus::Failed);
    let job_error = || job.and_then(|j| j.error.clone());

    match status.project_status {
        ProjectStatus::Training => match job {
            Some(j) if j.status.is_active() => Reconciliation::Training {
                job: Some(j.clone()),
            },
            Some(j) if j.status == JobStatus::Ready && j.completed_at.is_some() => {
                Reconciliation::Available {
                    model: TrainedModel::from_job(j, ttl, now),
                    persist: true,
                }
            }
            Some(_) if job_failed => Reconciliation::Failed { error: job_error() },
            // Ready without a completion time, or a status we do not know:
            // the backend has not settled yet.
            Some(j) => Reconciliation::Training {
                job: Some(j.clone()),
            },
            None => Reconciliation::Training { job: None },
        },
        ProjectStatus::Trained => match job {
            Some(j) if j.status == JobStatus::Ready && j.completed_at.is_some() => {
                Reconciliation::Available {
                    model: TrainedModel::from_job(j, ttl, now),
                    persist: true,
                }
            }
            // Without a completion time the job cannot anchor the expiry
            // window; keep the one already recorded.
            _ => match persisted {
                Some(model) => Reconciliation::Available {
                    model: model.clone(),
                    persist: false,
                },
                None => Reconciliation::Available {
                    model: TrainedModel::default_window(project_id, ttl, now),
                    persist: true,
                },
            },
        },
        ProjectStatus::Failed => Reconciliation::Failed { error: job_error() },
        _ if job_failed => Reconciliation::Failed { error: job_error() },
        ProjectStatus::Untrained => Reconciliation::Untrained,
        ProjectStatus::Unknown => Reconciliation::Indeterminate,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Applied(ProjectTrainingView),
    /// Another poll for the project was already in flight.
    Skipped,
}

/// A single follow-up poll waiting to fire.
#[derive(Debug)]
pub struct DelayedPoll {
    handle: JoinHandle<()>,
}

impl DelayedPoll {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the poll to run (or be cancelled).
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

#[derive(Debug)]
pub struct TrainingSubmission {
    pub outcome: TrainOutcome,
    pub view: ProjectTrainingView,
    pub follow_up: DelayedPoll,
}

#[derive(Clone)]
pub struct TrainingJobPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    backend: Arc<dyn Backend>,
    models: ModelLifecycleStore,
    model_ttl: chrono::Duration,
    poll_delay: Duration,
    in_flight: Mutex<HashSet<String>>,
    views: RwLock<HashMap<String, ProjectTrainingView>>,
}

/// Holds a project's in-flight slot; released on drop, whatever the poll's
/// outcome.
struct InFlight {
    inner: Arc<PollerInner>,
    project_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.project_id);
    }
}

impl TrainingJobPoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        models: ModelLifecycleStore,
        model_ttl: chrono::Duration,
        poll_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                backend,
                models,
                model_ttl,
                poll_delay,
                in_flight: Mutex::new(HashSet::new()),
                views: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn try_begin(&self, project_id: &str) -> Option<InFlight> {
        let inserted = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project_id.to_string());
        inserted.then(|| InFlight {
            inner: self.inner.clone(),
            project_id: project_id.to_string(),
        })
    }

    pub async fn view(&self, project_id: &str) -> Option<ProjectTrainingView> {
        self.inner.views.read().await.get(project_id).cloned()
    }

    async fn set_view(&self, project_id: &str, view: ProjectTrainingView) -> ProjectTrainingView {
        self.inner
            .views
            .write()
            .await
            .insert(project_id.to_string(), view.clone());
        view
    }

    /// Rebuild the view from the persisted model after a reload, before any
    /// poll has answered. An existing view is left alone.
    pub async fn restore(
        &self,
        session_id: &str,
        project_id: &str,
    ) -> Result<Option<ProjectTrainingView>> {
        if let Some(view) = self.view(project_id).await {
            return Ok(Some(view));
        }
        let Some(model) = self.inner.models.get(session_id, project_id).await? else {
            return Ok(None);
        };
        let view = ProjectTrainingView {
            state: ModelState::Available(model),
            current_job: None,
        };
        Ok(Some(self.set_view(project_id, view).await))
    }

    /// Ask the backend for the project's training status and reconcile.
    ///
    /// Transport errors leave the view untouched and are returned.
    pub async fn poll(&self, session_id: &str, project_id: &str) -> Result<PollOutcome> {
        let Some(_slot) = self.try_begin(project_id) else {
            debug!(project_id, "Poll already in flight, dropping");
            return Ok(PollOutcome::Skipped);
        };

        let status = self.inner.backend.training_status(project_id).await?;
        let persisted = self.inner.models.get(session_id, project_id).await?;
        let reconciliation = reconcile(
            project_id,
            &status,
            persisted.as_ref(),
            Utc::now(),
            self.inner.model_ttl,
        );

        debug!(
            project_id,
            project_status = status.project_status.as_str(),
            job_status = status.current_job.as_ref().map(|j| j.status.as_str()),
            "Reconciling training status"
        );
        let view = self.apply(session_id, project_id, reconciliation).await?;
        Ok(PollOutcome::Applied(view))
    }

    async fn apply(
        &self,
        session_id: &str,
        project_id: &str,
        reconciliation: Reconciliation,
    ) -> Result<ProjectTrainingView> {
        let previous = self.view(project_id).await.unwrap_or_default();
        let models = &self.inner.models;

        let view = match reconciliation {
            Reconciliation::Training { job } => {
                let previous_job_id = match &previous.state {
                    ModelState::Training { job_id, .. } => job_id.clone(),
                    _ => None,
                };
                ProjectTrainingView {
                    state: ModelState::Training {
                        job_id: job.as_ref().map(|j| j.id.clone()).or(previous_job_id),
                        progress: job.as_ref().and_then(|j| j.progress),
                    },
                    current_job: job,
                }
            }
            Reconciliation::Available { model, persist } => {
                if persist {
                    models.put(session_id, project_id, &model).await?;
                }
                if !previous.state.is_available() {
                    info!(project_id, model_id = %model.id, "Model available");
                }
                ProjectTrainingView {
                    state: ModelState::Available(model),
                    current_job: None,
                }
            }
            Reconciliation::Failed { error } => {
                models.remove(session_id, project_id).await?;
                warn!(project_id, error = ?error, "Training failed");
                ProjectTrainingView {
                    state: ModelState::Failed { error },
                    current_job: None,
                }
            }
            Reconciliation::Untrained => {
                models.remove(session_id, project_id).await?;
                ProjectTrainingView::default()
            }
            Reconciliation::Indeterminate => return Ok(previous),
        };

        Ok(self.set_view(project_id, view).await)
    }

    /// Fire one poll after the configured delay.
    pub fn schedule_poll(&self, session_id: &str, project_id: &str) -> DelayedPoll {
        let poller = self.clone();
        let session_id = session_id.to_string();
        let project_id = project_id.to_string();
        let delay = self.inner.poll_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match poller.poll(&session_id, &project_id).await {
                Ok(PollOutcome::Applied(view)) => {
                    debug!(
                        project_id = %project_id,
                        state = view.state.label(),
                        "Follow-up poll applied"
                    )
                }
                Ok(PollOutcome::Skipped) => {
                    debug!(project_id = %project_id, "Follow-up poll skipped")
                }
                Err(e) => warn!(project_id = %project_id, error = %e, "Follow-up poll failed"),
            }
        });
        DelayedPoll { handle }
    }

    /// Submit a training request and apply whichever shape comes back.
    ///
    /// Both shapes schedule one follow-up poll; for an immediate completion
    /// it confirms the result, for a job handle it catches the first status
    /// change.
    pub async fn submit_training(
        &self,
        session_id: &str,
        project_id: &str,
        params: &TrainingParams,
    ) -> Result<TrainingSubmission> {
        params.validate()?;
        let outcome = self.inner.backend.train(project_id, params).await?;

        let view = match &outcome {
            TrainOutcome::ImmediateCompletion { message } => {
                info!(project_id, %message, "Training completed immediately");
                let model =
                    TrainedModel::default_window(project_id, self.inner.model_ttl, Utc::now());
                self.apply(
                    session_id,
                    project_id,
                    Reconciliation::Available {
                        model,
                        persist: true,
                    },
                )
                .await?
            }
            TrainOutcome::JobHandle { job_id } => {
                info!(project_id, job_id = %job_id, "Training job started");
                self.set_view(
                    project_id,
                    ProjectTrainingView {
                        state: ModelState::Training {
                            job_id: Some(job_id.clone()),
                            progress: None,
                        },
                        current_job: None,
                    },
                )
                .await
            }
        };

        let follow_up = self.schedule_poll(session_id, project_id);
        Ok(TrainingSubmission {
            outcome,
            view,
            follow_up,
        })
    }

    /// Delete the trained model: backend first, local state only on success.
    pub async fn delete_model(&self, session_id: &str, project_id: &str) -> Result<()> {
        if let Err(e) = self.inner.backend.delete_model(session_id, project_id).await {
            warn!(project_id, error = %e, "Model delete failed, keeping local state");
            return Err(e);
        }

        self.inner.models.remove(session_id, project_id).await?;
        self.set_view(project_id, ProjectTrainingView::default()).await;
        info!(project_id, "Model deleted");
        Ok(())
    }

    pub async fn predict(
        &self,
        session_id: &str,
        project_id: &str,
        text: &str,
    ) -> Result<Prediction> {
        if text.trim().is_empty() {
            return Err(Error::Validation("text to classify is empty".into()));
        }

        let ready = match self.view(project_id).await {
            Some(view) => view.state.is_available(),
            None => self.inner.models.get(session_id, project_id).await?.is_some(),
        };
        if !ready {
            return Err(Error::NotReady(format!(
                "project {} has no trained model",
                project_id
            )));
        }

        self.inner.backend.predict(project_id, text).await
    }

    /// Best-effort `model_status` for a project list.
    pub async fn annotate_projects(
        &self,
        session_id: &str,
        projects: Vec<Project>,
    ) -> Vec<Project> {
        let polls = projects.iter().map(|p| self.poll(session_id, &p.id));
        let outcomes = join_all(polls).await;

        projects
            .into_iter()
            .zip(outcomes)
            .map(|(mut project, outcome)| {
                project.model_status = match outcome {
                    Ok(PollOutcome::Applied(view)) => Some(if view.state.is_available() {
                        ModelAvailability::Available
                    } else {
                        ModelAvailability::Unavailable
                    }),
                    Ok(PollOutcome::Skipped) => None,
                    Err(e) => {
                        debug!(project_id = %project.id, error = %e, "No model status for project");
                        None
                    }
                };
                project
            })
            .collect()
    }
}
