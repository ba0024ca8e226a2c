//! guestlab - command-line client for guest ML projects.
//!
//! Every subcommand takes a page path (`/projects/<session>/<project>`) and
//! goes through the same page load a browser visit would.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use guestlab::models::{ModelState, Project, ProjectTrainingView, TrainingParams};
use guestlab::services::{PageFlow, PageOutcome};
use guestlab::{AppState, IdKind, Location};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 4;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load a page and print where it lands
    Open { path: String },
    /// Show a project's training state
    Status { path: String },
    /// Start training a project's model
    Train {
        path: String,
        #[arg(long)]
        epochs: Option<u32>,
        #[arg(long)]
        batch_size: Option<u32>,
        #[arg(long)]
        learning_rate: Option<f64>,
        #[arg(long)]
        validation_split: Option<f64>,
        /// Return without waiting for the follow-up status check
        #[arg(long)]
        no_wait: bool,
    },
    /// Classify text with a project's trained model
    Predict { path: String, text: String },
    /// Delete a project's trained model
    DeleteModel { path: String },
    /// Start a fresh guest session
    NewSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = guestlab::init_config()?;
    let state = AppState::new(config).await?;
    let flow = PageFlow::new(state.clone());

    let result = run(cli.command, &flow).await;
    state.close().await?;
    result
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "guestlab=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(command: Command, flow: &PageFlow) -> anyhow::Result<()> {
    match command {
        Command::Open { path } => {
            let outcome = open_following(flow, &path).await?;
            print_outcome(&outcome);
        }
        Command::Status { path } => {
            let ProjectPage {
                project, training, ..
            } = project_page(flow, &path).await?;
            println!("{} ({})", project.name, project.project_type.as_str());
            match training {
                Some(view) => print_state(&view.state),
                None => println!("state: untrained"),
            }
        }
        Command::Train {
            path,
            epochs,
            batch_size,
            learning_rate,
            validation_split,
            no_wait,
        } => {
            let ProjectPage {
                session_id,
                project,
                ..
            } = project_page(flow, &path).await?;
            let defaults = TrainingParams::default();
            let params = TrainingParams {
                epochs: epochs.unwrap_or(defaults.epochs),
                batch_size: batch_size.unwrap_or(defaults.batch_size),
                learning_rate: learning_rate.unwrap_or(defaults.learning_rate),
                validation_split: validation_split.unwrap_or(defaults.validation_split),
            };

            let poller = &flow.state().poller;
            let submission = poller
                .submit_training(&session_id, &project.id, &params)
                .await
                .context("training request rejected")?;
            print_state(&submission.view.state);

            if no_wait {
                submission.follow_up.cancel();
            } else {
                submission.follow_up.wait().await;
                if let Some(view) = poller.view(&project.id).await {
                    print_state(&view.state);
                }
            }
        }
        Command::Predict { path, text } => {
            let ProjectPage {
                session_id,
                project,
                ..
            } = project_page(flow, &path).await?;
            let prediction = flow
                .state()
                .poller
                .predict(&session_id, &project.id, &text)
                .await?;
            println!("{} ({:.1}%)", prediction.label, prediction.confidence * 100.0);
            for alt in &prediction.alternatives {
                println!("  {} ({:.1}%)", alt.label, alt.confidence * 100.0);
            }
        }
        Command::DeleteModel { path } => {
            let ProjectPage {
                location,
                session_id,
                project,
                ..
            } = project_page(flow, &path).await?;
            flow.state()
                .poller
                .delete_model(&session_id, &project.id)
                .await
                .context("model was not deleted")?;
            println!("Deleted model for {}", location);
        }
        Command::NewSession => {
            let state = flow.state();
            let session = state.backend.create_guest_session().await?;
            state.guard.begin(&session).await?;
            let resolution = state
                .resolver
                .resolve(&session.session_id, IdKind::Session)
                .await?;
            let Some(token) = resolution.token() else {
                bail!("backend issued an unusable session id");
            };
            println!("{}", Location::Session { session: token.to_string() });
            println!("expires {}", session.expires_at.to_rfc3339());
        }
    }
    Ok(())
}

async fn open_following(flow: &PageFlow, path: &str) -> anyhow::Result<PageOutcome> {
    let mut path = path.to_string();
    for _ in 0..MAX_REDIRECTS {
        match flow.open(&path).await? {
            PageOutcome::Redirect(location) => {
                tracing::debug!(to = %location, "Following redirect");
                path = location.to_string();
            }
            outcome => return Ok(outcome),
        }
    }
    bail!("too many redirects, last location {}", path)
}

struct ProjectPage {
    location: Location,
    session_id: String,
    project: Project,
    training: Option<ProjectTrainingView>,
}

async fn project_page(flow: &PageFlow, path: &str) -> anyhow::Result<ProjectPage> {
    match open_following(flow, path).await? {
        PageOutcome::ProjectReady {
            location,
            session_id,
            project,
            training,
        } => Ok(ProjectPage {
            location,
            session_id,
            project,
            training,
        }),
        PageOutcome::Degraded { location, reason } => {
            bail!("{} is unavailable right now ({})", location, reason)
        }
        other => bail!("{} is not a project page", other.location()),
    }
}

fn print_outcome(outcome: &PageOutcome) {
    match outcome {
        PageOutcome::Redirect(location) => println!("redirect {}", location),
        PageOutcome::Degraded { location, reason } => {
            println!("{} degraded ({})", location, reason)
        }
        PageOutcome::SessionReady {
            location,
            expires_at,
            projects,
            ..
        } => {
            println!("{} (expires {})", location, expires_at.to_rfc3339());
            for link in projects {
                let model = match link.project.model_status {
                    Some(status) => format!("{:?}", status).to_lowercase(),
                    None => "unknown".to_string(),
                };
                println!(
                    "  {}  {}  [{}, model {}]",
                    link.location,
                    link.project.name,
                    link.project.status.as_str(),
                    model
                );
            }
        }
        PageOutcome::ProjectReady {
            location,
            project,
            training,
            ..
        } => {
            println!("{}  {}", location, project.name);
            if let Some(view) = training {
                print_state(&view.state);
            }
        }
    }
}

fn print_state(state: &ModelState) {
    match state {
        ModelState::Untrained => println!("state: untrained"),
        ModelState::Training { job_id, progress } => {
            let progress = progress.map(|p| format!(" {:.0}%", p)).unwrap_or_default();
            match job_id {
                Some(job_id) => println!("state: training{} (job {})", progress, job_id),
                None => println!("state: training{}", progress),
            }
        }
        ModelState::Available(model) => {
            let remaining = model.remaining(chrono::Utc::now());
            println!(
                "state: available, expires in {}h{:02}m",
                remaining.num_hours(),
                remaining.num_minutes() % 60
            );
        }
        ModelState::Failed { error } => match error {
            Some(error) => println!("state: failed ({})", error),
            None => println!("state: failed"),
        },
    }
}
