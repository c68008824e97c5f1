//! NPC module: schedule definitions, the per-NPC controller and the
//! navigation primitive it routes through.
pub mod catalog;
pub mod components;
pub mod controller;
pub mod events;
pub mod navigation;
pub mod plugin;
pub mod schedule;
pub mod systems;

pub use plugin::NpcPlugin;
