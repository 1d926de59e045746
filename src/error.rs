use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::BoundaryDefect;

/// Coarse classification of every [`WildtraxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Validation,
    Http,
    Transport,
    Parsing,
    EmptyResult,
    Filesystem,
    Config,
}

#[derive(Debug, Error, Diagnostic)]
pub enum WildtraxError {
    #[error("not authenticated: {0}")]
    #[diagnostic(
        code(wildtrax::auth),
        help("call `authenticate(true)` to obtain a fresh token")
    )]
    NotAuthenticated(String),

    #[error("missing credential: environment variable {0} is not set")]
    #[diagnostic(code(wildtrax::auth::credentials))]
    MissingCredential(String),

    #[error("credential exchange failed: {0}")]
    #[diagnostic(code(wildtrax::auth::exchange))]
    CredentialExchange(String),

    #[error("invalid sensor: {0}")]
    #[diagnostic(help("expected one of ARU, CAM, PC"))]
    InvalidSensor(String),

    #[error("unknown report `{0}`")]
    #[diagnostic(help(
        "expected one of main, project, recording, point_count, location, tag, image_report, image_set, birdnet, megadetector, megaclassifier"
    ))]
    UnknownReport(String),

    #[error("invalid report `{report}` for sensor {sensor}")]
    InvalidReport { sensor: String, report: String },

    #[error("must specify at least one report")]
    NoReports,

    #[error("project {0} is not available for download with the current credentials")]
    #[diagnostic(help("check `download_summary` for the projects you may export"))]
    UnauthorizedProject(u64),

    #[error("invalid boundary: {0}")]
    InvalidBoundary(BoundaryDefect),

    #[error("unknown species code(s): {0}")]
    UnknownSpecies(String),

    #[error("must specify at least one species")]
    NoSpecies,

    #[error("{endpoint} returned status {status}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("failed to extract report archive: {0}")]
    Archive(String),

    #[error("failed to parse {file}: {message}")]
    Table { file: String, message: String },

    #[error("no data found: {0}")]
    EmptyResult(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl WildtraxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WildtraxError::NotAuthenticated(_)
            | WildtraxError::MissingCredential(_)
            | WildtraxError::CredentialExchange(_) => ErrorKind::Authentication,
            WildtraxError::InvalidSensor(_)
            | WildtraxError::UnknownReport(_)
            | WildtraxError::InvalidReport { .. }
            | WildtraxError::NoReports
            | WildtraxError::UnauthorizedProject(_)
            | WildtraxError::InvalidBoundary(_)
            | WildtraxError::UnknownSpecies(_)
            | WildtraxError::NoSpecies => ErrorKind::Validation,
            WildtraxError::Http { .. } => ErrorKind::Http,
            WildtraxError::Transport { .. } => ErrorKind::Transport,
            WildtraxError::Decode { .. }
            | WildtraxError::Archive(_)
            | WildtraxError::Table { .. } => ErrorKind::Parsing,
            WildtraxError::EmptyResult(_) => ErrorKind::EmptyResult,
            WildtraxError::Filesystem(_) => ErrorKind::Filesystem,
            WildtraxError::ConfigRead(_) | WildtraxError::ConfigParse(_) => ErrorKind::Config,
        }
    }
}
