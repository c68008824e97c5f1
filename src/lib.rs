//! Cat cafe NPC routines: a stepped game clock, per-NPC schedule controllers
//! and a straight-line navigation layer over a registry of scenes.
pub mod core;
pub mod npc;
pub mod world;

pub use crate::{core::CorePlugin, npc::NpcPlugin, world::WorldPlugin};
