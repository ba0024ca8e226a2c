//! End-to-end page and training flows against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use guestlab::models::{GuestSession, ModelState, TrainOutcome, TrainedModel, TrainingParams};
use guestlab::services::{HttpBackend, PollOutcome};
use guestlab::{AppState, Config, IdKind, Location, MemoryStore, PageFlow, PageOutcome, SqliteStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION: &str = "session_abcdef0123456789";
const PROJECT: &str = "project_tx81kq2z";

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    config.api.timeout = Duration::from_secs(5);
    config.model.poll_delay = Duration::from_millis(20);
    config
}

fn state_for(server: &MockServer) -> AppState {
    let config = config_for(server);
    let backend = Arc::new(HttpBackend::new(&config.api).unwrap());
    AppState::from_parts(&config, backend, Arc::new(MemoryStore::new()))
}

async fn open_sqlite(config: &Config, db: &str) -> AppState {
    let backend = Arc::new(HttpBackend::new(&config.api).unwrap());
    let store = Arc::new(SqliteStore::open(db).await.unwrap());
    AppState::from_parts(config, backend, store)
}

fn session_body(created_days_ago: i64, expires_in_days: i64, active: bool) -> Value {
    let now = Utc::now();
    json!({
        "success": true,
        "data": {
            "session_id": SESSION,
            "createdAt": (now - chrono::Duration::days(created_days_ago)).to_rfc3339(),
            "expiresAt": (now + chrono::Duration::days(expires_in_days)).to_rfc3339(),
            "active": active
        }
    })
}

async fn mount_session(server: &MockServer, body: Value, expect: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/guest-session/{}", SESSION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

async fn canonical_session(flow: &PageFlow) -> String {
    match flow.open(&format!("/projects/{}", SESSION)).await.unwrap() {
        PageOutcome::Redirect(Location::Session { session }) => session,
        other => panic!("expected a redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn internal_ids_are_masked_and_stable() {
    let server = MockServer::start().await;
    mount_session(&server, session_body(1, 6, true), 0).await;
    let flow = PageFlow::new(state_for(&server));

    let token = canonical_session(&flow).await;
    assert_eq!(token.len(), 8);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(canonical_session(&flow).await, token);

    let location = Location::Session {
        session: token.clone(),
    };
    assert!(!location.to_string().contains(SESSION));

    let stranger = if token == "ffffffff" { "eeeeeeee" } else { "ffffffff" };
    let outcome = flow
        .open(&format!("/projects/{}", stranger))
        .await
        .unwrap();
    assert_eq!(outcome.location().to_string(), "/projects");
}

#[tokio::test]
async fn expired_local_session_never_reaches_backend() {
    let server = MockServer::start().await;
    mount_session(&server, session_body(8, 1, true), 0).await;
    let state = state_for(&server);
    let flow = PageFlow::new(state.clone());

    // Created eight days ago: the seven-day local window has closed even
    // though the backend record would still be live.
    let now = Utc::now();
    state
        .guard
        .begin(&GuestSession {
            session_id: SESSION.into(),
            created_at: now - chrono::Duration::days(8),
            expires_at: now + chrono::Duration::days(1),
            active: true,
            last_active: None,
        })
        .await
        .unwrap();
    let token = canonical_session(&flow).await;

    let outcome = flow.open(&format!("/projects/{}", token)).await.unwrap();
    assert_eq!(outcome.location(), &Location::ProjectList);
    assert!(state.guard.local_session().await.unwrap().is_none());
    assert_eq!(
        state
            .resolver
            .mappings()
            .get_internal_id(IdKind::Session, &token)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn inactive_session_purges_local_state() {
    let server = MockServer::start().await;
    mount_session(&server, session_body(1, 6, false), 1).await;
    let state = state_for(&server);
    let flow = PageFlow::new(state.clone());

    let token = canonical_session(&flow).await;
    let model = TrainedModel::default_window(PROJECT, chrono::Duration::hours(24), Utc::now());
    state.models.put(SESSION, PROJECT, &model).await.unwrap();

    let outcome = flow.open(&format!("/projects/{}", token)).await.unwrap();
    assert_eq!(outcome.location(), &Location::ProjectList);
    assert!(state.models.get(SESSION, PROJECT).await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_backend_degrades_without_purging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/guest-session/{}", SESSION)))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server);
    let flow = PageFlow::new(state.clone());

    let token = canonical_session(&flow).await;
    let model = TrainedModel::default_window(PROJECT, chrono::Duration::hours(24), Utc::now());
    state.models.put(SESSION, PROJECT, &model).await.unwrap();

    match flow.open(&format!("/projects/{}", token)).await.unwrap() {
        PageOutcome::Degraded { reason, .. } => assert_eq!(reason, "ERROR_FALLBACK"),
        other => panic!("expected a degraded page, got {:?}", other),
    }
    assert_eq!(
        state.models.get(SESSION, PROJECT).await.unwrap(),
        Some(model)
    );
    assert_eq!(
        state
            .resolver
            .mappings()
            .get_internal_id(IdKind::Session, &token)
            .await
            .unwrap()
            .as_deref(),
        Some(SESSION)
    );
}

#[tokio::test]
async fn project_page_resolves_after_session_is_valid() {
    let server = MockServer::start().await;
    mount_session(&server, session_body(1, 6, true), 2).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/project/{}", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "id": PROJECT,
                "name": "Moods",
                "type": "text-recognition",
                "status": "untrained"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/project/{}/training-status", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "projectStatus": "untrained",
            "currentJob": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    let flow = PageFlow::new(state_for(&server));

    let token = canonical_session(&flow).await;
    let project_token = match flow
        .open(&format!("/projects/{}/{}", token, PROJECT))
        .await
        .unwrap()
    {
        PageOutcome::Redirect(Location::Project { project, .. }) => project,
        other => panic!("expected a redirect, got {:?}", other),
    };
    assert!(project_token.starts_with('p'));

    match flow
        .open(&format!("/projects/{}/{}", token, project_token))
        .await
        .unwrap()
    {
        PageOutcome::ProjectReady {
            project, training, ..
        } => {
            assert_eq!(project.name, "Moods");
            assert_eq!(training.unwrap().state, ModelState::Untrained);
        }
        other => panic!("expected the project page, got {:?}", other),
    }
}

#[tokio::test]
async fn immediate_training_completion_is_available() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/project/{}/train", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Training completed successfully!"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server);

    let submission = state
        .poller
        .submit_training(SESSION, PROJECT, &TrainingParams::default())
        .await
        .unwrap();
    submission.follow_up.cancel();

    assert!(matches!(
        submission.outcome,
        TrainOutcome::ImmediateCompletion { .. }
    ));
    assert!(submission.view.state.is_available());
    assert!(submission.view.current_job.is_none());
    assert!(state.models.get(SESSION, PROJECT).await.unwrap().is_some());
}

#[tokio::test]
async fn training_job_progresses_to_available() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/api/project/{}/train", PROJECT)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "jobId": "job_1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/project/{}/training-status", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "projectStatus": "training",
            "currentJob": {"id": "job_1", "status": "running", "progress": 40}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/project/{}/training-status", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "projectStatus": "trained"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server);

    let submission = state
        .poller
        .submit_training(SESSION, PROJECT, &TrainingParams::default())
        .await
        .unwrap();
    submission.follow_up.wait().await;

    let view = state.poller.view(PROJECT).await.unwrap();
    assert_eq!(
        view.state,
        ModelState::Training {
            job_id: Some("job_1".into()),
            progress: Some(40.0)
        }
    );

    match state.poller.poll(SESSION, PROJECT).await.unwrap() {
        PollOutcome::Applied(view) => {
            assert!(view.state.is_available());
            assert!(view.current_job.is_none());
        }
        PollOutcome::Skipped => panic!("poll was skipped"),
    }
}

#[tokio::test]
async fn overlapping_polls_send_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/project/{}/training-status", PROJECT)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "projectStatus": "untrained"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server);

    let (a, b) = tokio::join!(
        state.poller.poll(SESSION, PROJECT),
        state.poller.poll(SESSION, PROJECT)
    );
    let skipped = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|o| matches!(o, PollOutcome::Skipped))
        .count();
    assert_eq!(skipped, 1);
}

#[tokio::test]
async fn failed_delete_keeps_model() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/project/{}/model", PROJECT)))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server);

    let model = TrainedModel::default_window(PROJECT, chrono::Duration::hours(24), Utc::now());
    state.models.put(SESSION, PROJECT, &model).await.unwrap();
    state.poller.restore(SESSION, PROJECT).await.unwrap();

    assert!(state.poller.delete_model(SESSION, PROJECT).await.is_err());
    assert_eq!(
        state.models.get(SESSION, PROJECT).await.unwrap(),
        Some(model)
    );
    assert!(state.poller.view(PROJECT).await.unwrap().state.is_available());

    server.reset().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/project/{}/model", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    state.poller.delete_model(SESSION, PROJECT).await.unwrap();
    assert!(state.models.get(SESSION, PROJECT).await.unwrap().is_none());
    let view = state.poller.view(PROJECT).await.unwrap();
    assert_eq!(view.state, ModelState::Untrained);
    assert!(view.current_job.is_none());
}

#[tokio::test]
async fn masked_tokens_survive_reopening_the_store() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("state.db");
    let db = db.to_str().unwrap();
    let config = config_for(&server);

    let first = open_sqlite(&config, db).await;
    let token = canonical_session(&PageFlow::new(first.clone())).await;
    first.close().await.unwrap();

    let second = open_sqlite(&config, db).await;
    assert_eq!(
        second
            .resolver
            .mappings()
            .get_internal_id(IdKind::Session, &token)
            .await
            .unwrap()
            .as_deref(),
        Some(SESSION)
    );
    assert_eq!(canonical_session(&PageFlow::new(second)).await, token);
}
