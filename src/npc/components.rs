//! NPC-specific components.
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Unique identifier for an NPC, taken from its schedule file (`"henry"`).
#[derive(
    Component, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NpcId(String);

impl NpcId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NpcId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Marks an NPC whose schedule failed to load and who stays at its placement.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Stationary;

/// Z layer NPC sprites are drawn on.
pub const NPC_Z: f32 = 10.0;

/// Maps scene pixel coordinates (y grows downwards) onto a world translation.
pub fn npc_translation(position: Vec2) -> Vec3 {
    Vec3::new(position.x, -position.y, NPC_Z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npc_id_displays_raw_name() {
        let id = NpcId::from("henry");
        assert_eq!(id.to_string(), "henry");
        assert_eq!(id.as_str(), "henry");
    }

    #[test]
    fn translation_flips_scene_y_axis() {
        let translation = npc_translation(Vec2::new(400.0, 720.0));
        assert_eq!(translation, Vec3::new(400.0, -720.0, NPC_Z));
    }
}
