pub mod color;
pub mod engine;
pub mod library;

pub use engine::{build_fixture, EffectWindow, Fixture};
pub use library::FixtureLibrary;
