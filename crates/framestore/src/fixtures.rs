//! Fixture seeding: demo frames that must exist on every deploy.
//!
//! The home page and the editor link to these frames by id, so the ids have
//! to resolve even on a fresh store. Seeding is best-effort: a fixture that
//! can't be loaded or written is logged and reported, never fatal.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::id::FrameId;
use crate::store::FrameStore;

/// Id of the empty frame, the default HTML for new editing sessions.
pub const BLANK_FRAME_ID: &str = "e3b0c44298fc";

/// Fixtures compiled into the crate, as `(name, content)`.
pub const BUNDLED: &[(&str, &str)] = &[
    ("blank.html", include_str!("../fixtures/blank.html")),
    ("blank-torus.js", include_str!("../fixtures/blank-torus.js")),
    ("canvas.js", include_str!("../fixtures/canvas.js")),
    ("interactive-input.js", include_str!("../fixtures/interactive-input.js")),
    ("nametag-torus.js", include_str!("../fixtures/nametag-torus.js")),
    ("todo-torus.js", include_str!("../fixtures/todo-torus.js")),
];

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to store fixture: {0}")]
    Store(#[from] StoreError),

    #[error("seeding thread panicked")]
    Panicked,
}

/// Where a fixture's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSource {
    Bundled(&'static str),
    File(PathBuf),
}

/// A named frame to seed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub name: String,
    pub source: FixtureSource,
}

impl Fixture {
    pub fn bundled(name: impl Into<String>, content: &'static str) -> Self {
        Self {
            name: name.into(),
            source: FixtureSource::Bundled(content),
        }
    }

    /// A fixture read from disk at seed time, named after its file name.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FixtureSource::File(path),
        }
    }

    pub fn load(&self) -> Result<Cow<'static, str>, FixtureError> {
        match &self.source {
            FixtureSource::Bundled(content) => Ok(Cow::Borrowed(content)),
            FixtureSource::File(path) => read_fixture(path).map(Cow::Owned),
        }
    }
}

fn read_fixture(path: &Path) -> Result<String, FixtureError> {
    fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// The fixed fixture list shipped with the crate.
pub fn bundled_fixtures() -> Vec<Fixture> {
    BUNDLED
        .iter()
        .map(|&(name, content)| Fixture::bundled(name, content))
        .collect()
}

/// Bundled fixtures (unless disabled) followed by the configured extra files.
pub fn configured_fixtures(config: &StoreConfig) -> Vec<Fixture> {
    let mut fixtures = if config.seed_bundled {
        bundled_fixtures()
    } else {
        Vec::new()
    };
    fixtures.extend(config.fixtures.iter().cloned().map(Fixture::file));
    fixtures
}

/// Outcome of a seeding run.
#[derive(Debug, Default, Clone)]
pub struct SeedReport {
    /// `(fixture name, id)` for every fixture now present in the store.
    pub seeded: Vec<(String, FrameId)>,
    /// `(fixture name, reason)` for every fixture that was skipped.
    pub failed: Vec<(String, String)>,
}

impl SeedReport {
    pub fn id_of(&self, name: &str) -> Option<&FrameId> {
        self.seeded.iter().find(|(n, _)| n == name).map(|(_, id)| id)
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn seed_one<S: FrameStore + ?Sized>(
    store: &S,
    fixture: &Fixture,
) -> Result<FrameId, FixtureError> {
    let content = fixture.load()?;
    Ok(store.create(&content)?)
}

/// Seed every fixture, one scoped thread each, returning once all are done.
pub fn seed<S: FrameStore + ?Sized>(store: &S, fixtures: &[Fixture]) -> SeedReport {
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = fixtures
            .iter()
            .map(|fixture| (fixture, scope.spawn(move || seed_one(store, fixture))))
            .collect();

        handles
            .into_iter()
            .map(|(fixture, handle)| {
                let outcome = handle.join().unwrap_or(Err(FixtureError::Panicked));
                (fixture, outcome)
            })
            .collect()
    });

    let mut report = SeedReport::default();
    for (fixture, outcome) in outcomes {
        match outcome {
            Ok(id) => {
                debug!(fixture = %fixture.name, %id, "fixture seeded");
                report.seeded.push((fixture.name.clone(), id));
            }
            Err(e) => {
                warn!(fixture = %fixture.name, error = %e, "skipping fixture");
                report.failed.push((fixture.name.clone(), e.to_string()));
            }
        }
    }

    info!(
        seeded = report.seeded.len(),
        failed = report.failed.len(),
        "fixture seeding finished"
    );
    report
}

/// Handle to a background seeding run.
#[derive(Debug)]
pub struct SeedHandle {
    handle: JoinHandle<SeedReport>,
}

impl SeedHandle {
    /// Block until seeding finishes.
    pub fn wait(self) -> SeedReport {
        self.handle.join().unwrap_or_else(|_| {
            warn!("fixture seeding thread panicked");
            SeedReport::default()
        })
    }
}

/// Seed on a background thread so the store can be handed out immediately.
pub fn spawn_seed<S>(store: Arc<S>, fixtures: Vec<Fixture>) -> SeedHandle
where
    S: FrameStore + ?Sized + 'static,
{
    let handle = thread::spawn(move || seed(store.as_ref(), &fixtures));
    SeedHandle { handle }
}
