//! World module: game clock, scenes and snapshots.
pub mod events;
pub mod plugin;
pub mod scenes;
pub mod snapshot;
pub mod time;

pub use plugin::WorldPlugin;
