//! Cue scheduling and timeline rendering for music-synchronized lighting.
//!
//! Text commands are interpreted into scheduled effects, stored per song,
//! and painted onto a per-frame DMX canvas that observers read while the
//! song plays.

pub mod agents;
pub mod broadcast;
pub mod canvas;
pub mod commands;
pub mod error;
pub mod fixtures;
pub mod interpreter;
pub mod models;
pub mod playback;
pub mod render_engine;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tasks;

pub use error::{ShowError, ShowResult};
pub use session::{ShowController, ShowSession};
