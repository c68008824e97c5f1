//! Position/room persistence. Schedule progress is not saved: applying a
//! snapshot re-derives it from the restored time of day.
use std::{collections::HashMap, fmt};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    npc::{
        components::{npc_translation, NpcId},
        controller::ScheduleController,
    },
    world::{
        scenes::{SceneGraph, SceneId, SceneRegistry},
        time::{ClockSettings, GameClock, GameTime},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    pub id: NpcId,
    pub scene: SceneId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub day: u64,
    pub time: GameTime,
    pub npcs: Vec<NpcSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    Malformed(String),
    UnknownScene { npc: NpcId, scene: SceneId },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed snapshot: {}", message),
            Self::UnknownScene { npc, scene } => {
                write!(f, "snapshot puts {} in unknown scene `{}`", npc, scene)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|err| SnapshotError::Malformed(err.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|err| SnapshotError::Malformed(err.to_string()))
    }

    pub fn npc(&self, id: &NpcId) -> Option<&NpcSnapshot> {
        self.npcs.iter().find(|npc| &npc.id == id)
    }
}

/// Reads the clock and every NPC's scene and position, sorted by NPC id.
pub fn capture_world_snapshot(world: &mut World) -> WorldSnapshot {
    let (day, time) = {
        let clock = world.resource::<GameClock>();
        (clock.day(), clock.now())
    };

    let mut query = world.query::<(&NpcId, &ScheduleController)>();
    let mut npcs: Vec<NpcSnapshot> = query
        .iter(world)
        .map(|(id, controller)| NpcSnapshot {
            id: id.clone(),
            scene: controller.scene().clone(),
            x: controller.position().x,
            y: controller.position().y,
        })
        .collect();
    npcs.sort_by(|a, b| a.id.cmp(&b.id));

    WorldSnapshot { day, time, npcs }
}

/// Restores the clock and NPC locations, then re-seeds every controller from
/// the restored time. Nothing is changed if the snapshot names an unknown scene.
pub fn apply_world_snapshot(world: &mut World, snapshot: &WorldSnapshot) -> Result<(), SnapshotError> {
    {
        let scenes = world.resource::<SceneRegistry>();
        if let Some(npc) = snapshot
            .npcs
            .iter()
            .find(|npc| !scenes.scene_exists(&npc.scene))
        {
            return Err(SnapshotError::UnknownScene {
                npc: npc.id.clone(),
                scene: npc.scene.clone(),
            });
        }
    }

    let settings = world.resource::<ClockSettings>().clone();
    let now = {
        let mut clock = world.resource_mut::<GameClock>();
        clock.restore(snapshot.day, snapshot.time, &settings);
        clock.now()
    };

    let mut saved: HashMap<&NpcId, &NpcSnapshot> =
        snapshot.npcs.iter().map(|npc| (&npc.id, npc)).collect();
    let mut placements = Vec::new();

    let mut query = world.query::<(&NpcId, &mut ScheduleController, &mut Transform)>();
    for (id, mut controller, mut transform) in query.iter_mut(world) {
        let (scene, position) = match saved.remove(id) {
            Some(npc) => (npc.scene.clone(), Vec2::new(npc.x, npc.y)),
            None => (controller.scene().clone(), controller.position()),
        };
        controller.restore(scene.clone(), position, now);
        transform.translation = npc_translation(position);
        placements.push((id.clone(), scene));
    }

    for id in saved.keys() {
        warn!("Snapshot mentions {} but no such NPC is loaded. Skipping.", id);
    }

    let mut scenes = world.resource_mut::<SceneRegistry>();
    for (id, scene) in placements {
        scenes.place(id, scene);
    }

    info!(
        "Restored snapshot: day {} at {} with {} NPC(s)",
        snapshot.day,
        now,
        snapshot.npcs.len()
    );
    Ok(())
}
