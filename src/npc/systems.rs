//! Systems related to NPC spawning and schedule execution.
use std::collections::HashSet;

use bevy::prelude::*;

use crate::{
    core::plugin::SimulationClock,
    npc::{
        catalog::NpcCatalog,
        components::{npc_translation, NpcId, Stationary},
        controller::ScheduleController,
        events::{NpcActionStartedEvent, NpcNavigationFailedEvent, NpcSceneChangedEvent},
        navigation::ActiveNavigator,
        schedule::ActionKind,
    },
    world::{
        events::DayBoundaryEvent,
        scenes::{SceneGraph, SceneRegistry},
        time::{ClockSettings, GameClock},
    },
};

/// Spawns one entity per catalog entry, placed at its initial position and
/// resuming its schedule from the current game time.
pub fn spawn_scheduled_npcs(
    mut commands: Commands,
    catalog: Res<NpcCatalog>,
    clock: Res<GameClock>,
    settings: Res<ClockSettings>,
    mut scenes: ResMut<SceneRegistry>,
) {
    let now = clock.now();

    for (npc, entry) in catalog.iter() {
        let controller =
            ScheduleController::new(entry.schedule.clone(), settings.day_start, now);
        if !scenes.scene_exists(controller.scene()) {
            warn!(
                "{} starts in unknown scene {}. Placing it anyway.",
                npc,
                controller.scene()
            );
        }
        scenes.place(npc.clone(), controller.scene().clone());

        info!(
            "Spawning {} in {} at ({:.0}, {:.0}) with {} schedule entries",
            npc,
            controller.scene(),
            controller.position().x,
            controller.position().y,
            entry.schedule.len()
        );

        let mut spawned = commands.spawn((
            npc.clone(),
            Name::new(format!("NPC {}", npc)),
            Transform::from_translation(npc_translation(controller.position())),
            controller,
        ));
        if entry.is_stationary() {
            spawned.insert(Stationary);
        }
    }
}

/// Rewinds every controller when the clock wraps to a new day.
pub fn reset_schedules_at_day_boundary(
    mut boundaries: MessageReader<DayBoundaryEvent>,
    mut controllers: Query<&mut ScheduleController>,
) {
    let Some(boundary) = boundaries.read().last() else {
        return;
    };

    debug!("Resetting schedules for day {}", boundary.day);
    for mut controller in controllers.iter_mut() {
        controller.on_day_boundary();
    }
}

/// Advances every controller by one tick against the same game time.
pub fn drive_schedule_controllers(
    clock: Res<GameClock>,
    sim_clock: Res<SimulationClock>,
    navigator: Res<ActiveNavigator>,
    mut scenes: ResMut<SceneRegistry>,
    mut controllers: Query<(&NpcId, &mut ScheduleController)>,
    mut started: MessageWriter<NpcActionStartedEvent>,
    mut scene_changes: MessageWriter<NpcSceneChangedEvent>,
    mut failures: MessageWriter<NpcNavigationFailedEvent>,
) {
    let now = clock.now();
    let delta = sim_clock.last_scaled_delta().as_secs_f32();

    for (npc, mut controller) in controllers.iter_mut() {
        let report = controller.tick(now, delta, &mut *scenes, navigator.navigator());
        if report.is_empty() {
            continue;
        }

        for action in report.started {
            if action.action == ActionKind::Loop {
                debug!("{} loops back to the start of the day at {}", npc, now);
            } else {
                info!(
                    "{} starts {} (scheduled {}) at {}",
                    npc, action.action, action.scheduled_at, now
                );
            }
            started.write(NpcActionStartedEvent {
                npc: npc.clone(),
                scheduled_at: action.scheduled_at,
                action: action.action,
            });
        }

        for change in report.scene_changes {
            info!("{} moves from {} to {}", npc, change.from, change.to);
            scene_changes.write(NpcSceneChangedEvent {
                npc: npc.clone(),
                from: change.from,
                to: change.to,
            });
        }

        if let Some(error) = report.navigation_failure {
            warn!("{} could not navigate: {}. Retrying later.", npc, error);
            failures.write(NpcNavigationFailedEvent {
                npc: npc.clone(),
                error,
            });
        }
    }
}

/// Copies controller positions onto transforms.
pub fn sync_npc_transforms(
    mut query: Query<(&ScheduleController, &mut Transform), Changed<ScheduleController>>,
) {
    for (controller, mut transform) in query.iter_mut() {
        transform.translation = npc_translation(controller.position());
    }
}

/// Drops scene membership for NPCs whose entities were despawned.
pub fn forget_despawned_npcs(live: Query<&NpcId>, mut scenes: ResMut<SceneRegistry>) {
    let live: HashSet<&NpcId> = live.iter().collect();
    scenes.retain_entities(|npc| {
        let keep = live.contains(npc);
        if !keep {
            debug!("Forgetting despawned NPC {}", npc);
        }
        keep
    });
}
