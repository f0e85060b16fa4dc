//! Session replay for the campus map engine.
//!
//! A session is a JSON list of steps applied in order to one engine. All
//! loads a step starts are settled before the next step runs, so the events
//! reported for a step include everything its completions emitted.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{Action, ConfigError, MapEngine, MapEvent, ResetOptions, ViewState};
use foundation::Coordinate;
use layers::{Hit, main_hit};
use serde::{Deserialize, Serialize};
use streaming::{LoadError, MemoryLoader};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Step {
    Reset {
        #[serde(default)]
        options: ResetOptions,
    },
    View(ViewState),
    /// Everything under the clicked pixel, topmost first.
    Click { hits: Vec<Hit>, coordinate: Coordinate },
    Geolocation { coordinate: Coordinate },
    PopupClose,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Session {
    pub steps: Vec<Step>,
}

impl Session {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(SessionError::Session)
    }
}

/// Events emitted while applying one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub events: Vec<MapEvent>,
}

#[derive(Debug)]
pub enum SessionError {
    Io { path: PathBuf, source: std::io::Error },
    Fixture(LoadError),
    Session(serde_json::Error),
    /// A reset step carried invalid options.
    Config { step: usize, error: ConfigError },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io { path, source } => write!(f, "read {}: {source}", path.display()),
            SessionError::Fixture(e) => write!(f, "invalid fixture: {e}"),
            SessionError::Session(e) => write!(f, "invalid session: {e}"),
            SessionError::Config { step, error } => write!(f, "step {step}: {error}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io { source, .. } => Some(source),
            SessionError::Fixture(e) => Some(e),
            SessionError::Session(e) => Some(e),
            SessionError::Config { error, .. } => Some(error),
        }
    }
}

fn read(path: &Path) -> Result<String, SessionError> {
    fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn replay_files(data: &Path, session: &Path) -> Result<Vec<StepReport>, SessionError> {
    let loader = MemoryLoader::from_json(&read(data)?).map_err(SessionError::Fixture)?;
    let session = Session::from_json(&read(session)?)?;
    replay(loader, &session).await
}

pub async fn replay(loader: MemoryLoader, session: &Session) -> Result<Vec<StepReport>, SessionError> {
    let mut engine = MapEngine::new(loader);
    let mut reports = Vec::with_capacity(session.steps.len());
    for (step, s) in session.steps.iter().enumerate() {
        debug!(step, ?s, "applying step");
        match s.clone() {
            Step::Reset { options } => {
                engine
                    .reset(options)
                    .map_err(|error| SessionError::Config { step, error })?;
            }
            Step::View(view) => {
                engine.dispatch(Action::ViewChanged(view));
            }
            Step::Click { hits, coordinate } => match main_hit(hits) {
                Some(hit) => {
                    engine.dispatch(Action::Clicked { hit, coordinate });
                }
                None => debug!(step, "click hit nothing"),
            },
            Step::Geolocation { coordinate } => {
                engine.dispatch(Action::GeolocationClicked(coordinate));
            }
            Step::PopupClose => {
                engine.dispatch(Action::PopupClosed);
            }
        }
        engine.settle().await;
        reports.push(StepReport {
            step,
            events: engine.events(),
        });
    }
    info!(steps = reports.len(), "session replayed");
    Ok(reports)
}
