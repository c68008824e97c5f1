//! NPC-specific messages broadcast between systems.
use bevy::prelude::*;

use crate::{
    npc::{components::NpcId, navigation::NavigationError, schedule::ActionKind},
    world::{scenes::SceneId, time::GameTime},
};

/// Fired when an NPC starts a scheduled action.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct NpcActionStartedEvent {
    pub npc: NpcId,
    pub scheduled_at: GameTime,
    pub action: ActionKind,
}

/// Fired when an NPC's scene membership changes during navigation.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct NpcSceneChangedEvent {
    pub npc: NpcId,
    pub from: SceneId,
    pub to: SceneId,
}

#[derive(Message, Debug, Clone, PartialEq)]
pub struct NpcNavigationFailedEvent {
    pub npc: NpcId,
    pub error: NavigationError,
}
