pub mod commands;
pub mod effects;
pub mod events;
pub mod fixtures;
pub mod plans;
pub mod playback;
pub mod song;
pub mod tasks;
