//! Error taxonomy shared by the store, renderer, interpreter and dispatcher.
//!
//! Every variant is surfaced to callers as a value. The dispatcher turns them
//! into `CommandResponse`s so nothing escapes a command boundary as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShowError {
    /// Text matched no known grammar.
    #[error("could not understand command: {0}")]
    Parse(String),

    /// A fixture, time or preset could not be resolved.
    #[error("{0}")]
    Resolution(String),

    /// An effect failed validation (duplicate id, bad timing).
    #[error("invalid effect: {0}")]
    Validation(String),

    /// A render pass produced no painted effects.
    #[error("render failed: {0}")]
    Render(String),

    /// Save or load of a per-song file failed. In-memory state is kept.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Bulk clear without the literal confirmation token.
    #[error("{0}")]
    DestructiveOpRejected(String),

    /// No song is loaded into the controller.
    #[error("no song loaded")]
    NoSession,

    #[error("agent error: {0}")]
    Agent(String),
}

impl ShowError {
    /// Non-error rejections are logged at info level instead of error.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ShowError::DestructiveOpRejected(_))
    }
}

impl From<std::io::Error> for ShowError {
    fn from(err: std::io::Error) -> Self {
        ShowError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ShowError {
    fn from(err: serde_json::Error) -> Self {
        ShowError::Persistence(format!("invalid JSON: {}", err))
    }
}

pub type ShowResult<T> = Result<T, ShowError>;
