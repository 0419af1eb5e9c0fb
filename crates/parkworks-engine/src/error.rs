//! Engine error types.

use std::path::PathBuf;

use parkworks_world::WorldError;

use crate::config::DrawingEngineKind;

/// Errors produced by the engine outside the tick path.
///
/// Nothing inside a simulation tick returns one of these: a tick either
/// completes or panics.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A second [`Context`](crate::context::Context) was constructed while
    /// one is alive on this thread.
    #[error("a Context already exists on this thread")]
    ContextExists,

    /// Neither the requested drawing engine nor the software fallback could
    /// be initialised.
    #[error("no drawing engine available (requested {requested:?}, software fallback also failed)")]
    NoDrawingEngine { requested: DrawingEngineKind },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("replay file {path}: {source}")]
    ReplayIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The replay file parsed but is not a usable recording.
    #[error("malformed replay: {0}")]
    ReplayFormat(String),

    /// A replay operation was requested in the wrong mode.
    #[error("replay manager is {mode}, cannot {operation}")]
    ReplayMode {
        mode: &'static str,
        operation: &'static str,
    },

    #[error("failed to write desync report {path}: {source}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    World(#[from] WorldError),
}

/// Why a park file could not be loaded.
///
/// Load failures are recoverable: the caller shows the message and falls
/// back to the title screen.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The park needs objects that are not installed.
    #[error("missing objects: {}", missing.join(", "))]
    ObjectLoad { missing: Vec<String> },

    #[error("unsupported ride type {ride_type}")]
    UnsupportedRideType { ride_type: u8 },

    #[error("park file version {found} is newer than the supported version {max_supported}")]
    UnsupportedVersion { found: u32, max_supported: u32 },

    #[error("failed to read park file: {0}")]
    Io(#[from] std::io::Error),

    #[error("park file is malformed: {0}")]
    Format(String),
}

impl LoadError {
    /// Title for the error window.
    pub fn title(&self) -> &'static str {
        match self {
            LoadError::ObjectLoad { .. } => "Required objects are missing",
            LoadError::UnsupportedRideType { .. } => "Unsupported ride type",
            LoadError::UnsupportedVersion { .. } => "Park was saved by a newer version",
            LoadError::Io(_) | LoadError::Format(_) => "Unable to load park",
        }
    }
}
