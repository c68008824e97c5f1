//! Core module holding simulation timing and frame-ordering sets.
pub mod plugin;

pub use plugin::{CorePlugin, SimulationClock, SimulationSet};
