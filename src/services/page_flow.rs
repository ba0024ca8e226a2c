//! Page-level orchestration.
//!
//! One call to [`PageFlow::open`] is one page load. The order is fixed:
//! resolve the session segment, validate the session, and only then touch
//! anything project scoped. Every outcome that changes the address carries
//! a [`Location`] built from masked tokens.

use chrono::{DateTime, Utc};
use guestlab_mask::{classify, IdKind, Segment};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{GuestSession, Project, ProjectTrainingView};
use crate::routes::{Location, RequestedPath};
use crate::services::{CleanupReason, GuardState, PollOutcome, Resolution};
use crate::state::AppState;

/// A project as linked from the list view.
#[derive(Debug, Clone)]
pub struct ProjectLink {
    pub location: Location,
    pub project: Project,
}

#[derive(Debug)]
pub enum PageOutcome {
    /// The address must change before anything renders.
    Redirect(Location),
    /// The page cannot be built right now; local state was kept.
    Degraded {
        location: Location,
        reason: &'static str,
    },
    SessionReady {
        location: Location,
        session_id: String,
        expires_at: DateTime<Utc>,
        projects: Vec<ProjectLink>,
    },
    ProjectReady {
        location: Location,
        session_id: String,
        project: Project,
        training: Option<ProjectTrainingView>,
    },
}

impl PageOutcome {
    /// Where the visitor ends up.
    pub fn location(&self) -> &Location {
        match self {
            PageOutcome::Redirect(location)
            | PageOutcome::Degraded { location, .. }
            | PageOutcome::SessionReady { location, .. }
            | PageOutcome::ProjectReady { location, .. } => location,
        }
    }
}

#[derive(Clone)]
pub struct PageFlow {
    state: AppState,
}

impl PageFlow {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Load the page at `path`.
    ///
    /// Only store failures surface as `Err`. Backend trouble becomes
    /// [`PageOutcome::Degraded`] and bad segments become redirects.
    pub async fn open(&self, path: &str) -> Result<PageOutcome> {
        let AppState {
            resolver, guard, ..
        } = &self.state;
        guard.reset().await;

        let requested = RequestedPath::parse(path);
        let Some(segment) = requested.session else {
            return self.enter().await;
        };

        let (token, session_id) = match resolver.resolve(&segment, IdKind::Session).await? {
            Resolution::Resolved { token, internal_id } => (token, internal_id),
            Resolution::RedirectCanonical { token, internal_id } => {
                return self
                    .canonical_redirect(token, &internal_id, requested.project.as_deref())
                    .await;
            }
            Resolution::RedirectDefault(reason) => {
                debug!(reason = reason.as_str(), "Unusable session segment");
                return Ok(PageOutcome::Redirect(Location::ProjectList));
            }
        };

        let session = match self.validate(&token, &session_id).await? {
            Ok(session) => session,
            Err(outcome) => return Ok(outcome),
        };

        match requested.project {
            Some(project) => self.open_project(token, session_id, &project).await,
            None => {
                self.open_session(token, session_id, session.expires_at)
                    .await
            }
        }
    }

    /// Validate the session behind `token`. `Err` carries the page to show
    /// instead.
    async fn validate(
        &self,
        token: &str,
        session_id: &str,
    ) -> Result<std::result::Result<GuestSession, PageOutcome>> {
        match self.state.guard.validate(session_id).await? {
            GuardState::Valid { session } => Ok(Ok(session)),
            GuardState::Invalid(CleanupReason::ErrorFallback) => Ok(Err(PageOutcome::Degraded {
                location: Location::Session {
                    session: token.to_string(),
                },
                reason: CleanupReason::ErrorFallback.as_str(),
            })),
            GuardState::Invalid(reason) => {
                info!(session = %token, reason = %reason, "Session rejected");
                Ok(Err(PageOutcome::Redirect(Location::ProjectList)))
            }
            GuardState::Unchecked => Err(Error::Internal("session left unchecked".into())),
        }
    }

    /// Redirect away from a raw session id.
    ///
    /// A masked project segment is carried over as is. A raw project id is
    /// only masked once the session has been validated; anything else is
    /// dropped.
    async fn canonical_redirect(
        &self,
        token: String,
        session_id: &str,
        project: Option<&str>,
    ) -> Result<PageOutcome> {
        let Some(project) = project else {
            return Ok(PageOutcome::Redirect(Location::Session { session: token }));
        };

        match classify(project, IdKind::Project) {
            Segment::Masked => Ok(PageOutcome::Redirect(Location::Project {
                session: token,
                project: project.to_string(),
            })),
            Segment::Invalid => Ok(PageOutcome::Redirect(Location::Session { session: token })),
            Segment::Internal => {
                if let Err(outcome) = self.validate(&token, session_id).await? {
                    return Ok(outcome);
                }
                let resolution = self.state.resolver.resolve(project, IdKind::Project).await?;
                let location = match resolution.token() {
                    Some(project) => Location::Project {
                        session: token,
                        project: project.to_string(),
                    },
                    None => Location::Session { session: token },
                };
                Ok(PageOutcome::Redirect(location))
            }
        }
    }

    /// `/projects` without a session: continue the visitor's session, or
    /// start one.
    async fn enter(&self) -> Result<PageOutcome> {
        match self.state.guard.ensure_session().await {
            Ok((_, token)) => Ok(PageOutcome::Redirect(Location::Session { session: token })),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Could not start a guest session");
                Ok(PageOutcome::Degraded {
                    location: Location::ProjectList,
                    reason: e.error_code(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn open_session(
        &self,
        token: String,
        session_id: String,
        expires_at: DateTime<Utc>,
    ) -> Result<PageOutcome> {
        let location = Location::Session {
            session: token.clone(),
        };
        let projects = match self.state.backend.list_projects(&session_id).await {
            Ok(projects) => projects,
            Err(e) => {
                warn!(error = %e, "Project list unavailable");
                return Ok(PageOutcome::Degraded {
                    location,
                    reason: e.error_code(),
                });
            }
        };
        let projects = self
            .state
            .poller
            .annotate_projects(&session_id, projects)
            .await;

        let mut links = Vec::with_capacity(projects.len());
        for project in projects {
            let project_token = self
                .state
                .resolver
                .token_for(IdKind::Project, &project.id)
                .await?;
            links.push(ProjectLink {
                location: Location::Project {
                    session: token.clone(),
                    project: project_token,
                },
                project,
            });
        }

        Ok(PageOutcome::SessionReady {
            location,
            session_id,
            expires_at,
            projects: links,
        })
    }

    async fn open_project(
        &self,
        session_token: String,
        session_id: String,
        segment: &str,
    ) -> Result<PageOutcome> {
        let AppState {
            resolver,
            backend,
            poller,
            ..
        } = &self.state;

        let (project_token, project_id) = match resolver.resolve(segment, IdKind::Project).await? {
            Resolution::Resolved { token, internal_id } => (token, internal_id),
            Resolution::RedirectCanonical { token, .. } => {
                return Ok(PageOutcome::Redirect(Location::Project {
                    session: session_token,
                    project: token,
                }));
            }
            Resolution::RedirectDefault(reason) => {
                debug!(reason = reason.as_str(), "Unusable project segment");
                return Ok(PageOutcome::Redirect(Location::Session {
                    session: session_token,
                }));
            }
        };

        let location = Location::Project {
            session: session_token.clone(),
            project: project_token,
        };
        let project = match backend.get_project(&project_id).await {
            Ok(project) => project,
            Err(e) if e.is_authoritative() => {
                info!(session = %session_token, "Project no longer exists");
                return Ok(PageOutcome::Redirect(Location::Session {
                    session: session_token,
                }));
            }
            Err(e) => {
                warn!(error = %e, "Project unavailable");
                return Ok(PageOutcome::Degraded {
                    location,
                    reason: e.error_code(),
                });
            }
        };

        poller.restore(&session_id, &project_id).await?;
        let training = match poller.poll(&session_id, &project_id).await {
            Ok(PollOutcome::Applied(view)) => Some(view),
            Ok(PollOutcome::Skipped) => poller.view(&project_id).await,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Initial training poll failed");
                poller.view(&project_id).await
            }
            Err(e) => return Err(e),
        };

        Ok(PageOutcome::ProjectReady {
            location,
            session_id,
            project,
            training,
        })
    }
}
