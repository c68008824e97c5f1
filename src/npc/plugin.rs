//! NPC plugin wiring the schedule catalog, controllers and their messages.
use std::path::PathBuf;

use bevy::prelude::*;

use crate::{
    core::plugin::SimulationSet,
    npc::{
        catalog::{NpcCatalog, NPC_DATA_DIR},
        events::{NpcActionStartedEvent, NpcNavigationFailedEvent, NpcSceneChangedEvent},
        navigation::ActiveNavigator,
        systems::{
            drive_schedule_controllers, forget_despawned_npcs, reset_schedules_at_day_boundary,
            spawn_scheduled_npcs, sync_npc_transforms,
        },
    },
    world::time::ClockSettings,
};

enum CatalogSource {
    Directory(PathBuf),
    Loaded(NpcCatalog),
}

pub struct NpcPlugin {
    source: CatalogSource,
}

impl NpcPlugin {
    /// Uses an already-built catalog.
    pub fn new(catalog: NpcCatalog) -> Self {
        Self {
            source: CatalogSource::Loaded(catalog),
        }
    }

    /// Loads every schedule file in `dir` when the plugin is built.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: CatalogSource::Directory(dir.into()),
        }
    }
}

impl Default for NpcPlugin {
    fn default() -> Self {
        Self::from_dir(NPC_DATA_DIR)
    }
}

impl Plugin for NpcPlugin {
    fn build(&self, app: &mut App) {
        let catalog = match &self.source {
            CatalogSource::Loaded(catalog) => catalog.clone(),
            CatalogSource::Directory(dir) => {
                let day_start = app
                    .world()
                    .get_resource::<ClockSettings>()
                    .map(|settings| settings.day_start)
                    .unwrap_or_else(|| ClockSettings::default().day_start);
                NpcCatalog::load_dir(dir, day_start)
            }
        };

        app.insert_resource(catalog)
            .init_resource::<ActiveNavigator>()
            .add_message::<NpcActionStartedEvent>()
            .add_message::<NpcSceneChangedEvent>()
            .add_message::<NpcNavigationFailedEvent>()
            .add_systems(Startup, spawn_scheduled_npcs)
            .add_systems(
                Update,
                (reset_schedules_at_day_boundary, drive_schedule_controllers)
                    .chain()
                    .in_set(SimulationSet::Schedules),
            )
            .add_systems(
                Update,
                (sync_npc_transforms, forget_despawned_npcs).in_set(SimulationSet::Sync),
            );
    }
}
