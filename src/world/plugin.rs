//! WorldPlugin owns the game clock and the scene registry.
use bevy::prelude::*;

use crate::{
    core::plugin::{update_simulation_clock, SimulationSet},
    world::{
        events::DayBoundaryEvent,
        scenes::SceneRegistry,
        time::{advance_game_clock, ClockSettings, GameClock},
    },
};

pub struct WorldPlugin {
    settings: ClockSettings,
    scenes: Option<SceneRegistry>,
}

impl WorldPlugin {
    /// Uses validated clock settings; scenes come from `config/scenes.toml`
    /// unless given with [`WorldPlugin::with_scenes`].
    pub fn new(settings: ClockSettings) -> Self {
        Self {
            settings,
            scenes: None,
        }
    }

    pub fn with_scenes(mut self, scenes: SceneRegistry) -> Self {
        self.scenes = Some(scenes);
        self
    }
}

impl Default for WorldPlugin {
    fn default() -> Self {
        Self::new(ClockSettings::default())
    }
}

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        let settings = self.settings.clone();
        info!(
            "Game clock configured: day {} to {}, {} minute steps every {:.1}s, starting at {}",
            settings.day_start,
            settings.day_end(),
            settings.minutes_per_step,
            settings.real_seconds_per_step,
            settings.start_time
        );

        let scenes = self
            .scenes
            .clone()
            .unwrap_or_else(SceneRegistry::load_or_default);
        info!("Scene registry holds {} scene(s)", scenes.scene_ids().len());

        app.insert_resource(GameClock::new(&settings))
            .insert_resource(settings)
            .insert_resource(scenes)
            .add_message::<DayBoundaryEvent>()
            .add_systems(
                Update,
                advance_game_clock
                    .after(update_simulation_clock)
                    .in_set(SimulationSet::Clock),
            );
    }
}
