//! In-process [`Backend`] double for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{
    GuestSession, Prediction, Project, TrainOutcome, TrainingParams, TrainingStatus,
};
use crate::services::Backend;

/// Scripted answers plus per-endpoint call counts.
///
/// Endpoints without a scripted answer fail with a transport error.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<HashMap<&'static str, usize>>,
    session: Mutex<Option<Result<GuestSession>>>,
    created: Mutex<Option<GuestSession>>,
    statuses: Mutex<VecDeque<Result<TrainingStatus>>>,
    train: Mutex<Option<Result<TrainOutcome>>>,
    delete: Mutex<Option<Result<()>>>,
    prediction: Mutex<Option<Prediction>>,
    projects: Mutex<Option<Vec<Project>>>,
    status_delay: Mutex<Option<Duration>>,
}

fn copy_error(e: &Error) -> Error {
    match e {
        Error::NotFound(m) => Error::NotFound(m.clone()),
        Error::Validation(m) => Error::Validation(m.clone()),
        Error::NotReady(m) => Error::NotReady(m.clone()),
        Error::Transport(m) => Error::Transport(m.clone()),
        Error::Backend { status, message } => Error::Backend {
            status: *status,
            message: message.clone(),
        },
        other => Error::Internal(other.to_string()),
    }
}

fn copy_result<T: Clone>(r: &Result<T>) -> Result<T> {
    match r {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(copy_error(e)),
    }
}

fn unscripted<T>(endpoint: &str) -> Result<T> {
    Err(Error::Transport(format!("{} not scripted", endpoint)))
}

impl FakeBackend {
    fn record(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    pub fn set_session(&self, answer: Result<GuestSession>) {
        *self.session.lock().unwrap() = Some(answer);
    }

    pub fn set_created(&self, session: GuestSession) {
        *self.created.lock().unwrap() = Some(session);
    }

    /// Queue a status answer. The last one repeats once the queue drains.
    pub fn push_status(&self, answer: Result<TrainingStatus>) {
        self.statuses.lock().unwrap().push_back(answer);
    }

    pub fn set_train(&self, answer: Result<TrainOutcome>) {
        *self.train.lock().unwrap() = Some(answer);
    }

    pub fn set_delete(&self, answer: Result<()>) {
        *self.delete.lock().unwrap() = Some(answer);
    }

    pub fn set_prediction(&self, prediction: Prediction) {
        *self.prediction.lock().unwrap() = Some(prediction);
    }

    /// Script `list_projects`; `get_project` answers from the same list.
    pub fn set_projects(&self, projects: Vec<Project>) {
        *self.projects.lock().unwrap() = Some(projects);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn create_guest_session(&self) -> Result<GuestSession> {
        self.record("create_guest_session");
        match self.created.lock().unwrap().clone() {
            Some(session) => Ok(session),
            None => unscripted("create_guest_session"),
        }
    }

    async fn get_guest_session(&self, _session_id: &str) -> Result<GuestSession> {
        self.record("get_guest_session");
        match &*self.session.lock().unwrap() {
            Some(answer) => copy_result(answer),
            None => unscripted("get_guest_session"),
        }
    }

    async fn list_projects(&self, _session_id: &str) -> Result<Vec<Project>> {
        self.record("list_projects");
        match self.projects.lock().unwrap().clone() {
            Some(projects) => Ok(projects),
            None => unscripted("list_projects"),
        }
    }

    async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.record("get_project");
        let projects = self.projects.lock().unwrap().clone();
        match projects {
            Some(projects) => projects
                .into_iter()
                .find(|p| p.id == project_id)
                .ok_or_else(|| Error::NotFound(format!("project {}", project_id))),
            None => unscripted("get_project"),
        }
    }

    async fn train(&self, _project_id: &str, _params: &TrainingParams) -> Result<TrainOutcome> {
        self.record("train");
        match &*self.train.lock().unwrap() {
            Some(answer) => copy_result(answer),
            None => unscripted("train"),
        }
    }

    async fn training_status(&self, _project_id: &str) -> Result<TrainingStatus> {
        self.record("training_status");
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut statuses = self.statuses.lock().unwrap();
        let answer = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().map(copy_result)
        };
        answer.unwrap_or_else(|| unscripted("training_status"))
    }

    async fn delete_model(&self, _session_id: &str, _project_id: &str) -> Result<()> {
        self.record("delete_model");
        match &*self.delete.lock().unwrap() {
            Some(answer) => copy_result(answer),
            None => unscripted("delete_model"),
        }
    }

    async fn predict(&self, _project_id: &str, _text: &str) -> Result<Prediction> {
        self.record("predict");
        match self.prediction.lock().unwrap().clone() {
            Some(prediction) => Ok(prediction),
            None => unscripted("predict"),
        }
    }
}
