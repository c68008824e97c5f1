//! Per-NPC schedule controller: the state machine that turns the game clock
//! and a schedule definition into idling and movement.
//!
//! Each tick runs three steps in order:
//! 1. an `Idle` phase counts down and, once done, awaits the next action;
//! 2. a `Navigating` phase walks toward its waypoints at the NPC's speed;
//! 3. while awaiting, the next due entry (if any) is dispatched.
//!
//! Entries are visited in "logical" order: sorted by time, starting at the
//! first entry at or after the day start hour and wrapping through midnight.
//! The cursor is a position in that order.
use std::sync::Arc;

use bevy::prelude::*;

use crate::{
    npc::{
        navigation::{NavigationError, Navigator, Waypoint, Waypoints},
        schedule::{ActionKind, ScheduleDefinition, ScheduleEntry},
    },
    world::{
        scenes::{SceneGraph, SceneId},
        time::GameTime,
    },
};

/// Idle period after a failed route. The entry is tried again afterwards
/// unless a later entry has become due.
pub const NAVIGATION_RETRY_SECONDS: f32 = 5.0;
/// Idle period used when a loop cascade hits its per-tick cap.
pub const LOOP_PARK_SECONDS: f32 = 0.0;
/// Loop entries may re-dispatch at most this many times within one tick.
const MAX_LOOP_REDISPATCHES: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerPhase {
    Idle { remaining: f32 },
    Navigating { waypoints: Waypoints },
    AwaitingNextAction,
}

impl ControllerPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Navigating { .. } => "navigating",
            Self::AwaitingNextAction => "awaiting",
        }
    }
}

/// An entry that became active during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedAction {
    pub scheduled_at: GameTime,
    pub action: ActionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneChange {
    pub from: SceneId,
    pub to: SceneId,
}

/// What happened during one tick, for logging and messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub started: Vec<StartedAction>,
    pub scene_changes: Vec<SceneChange>,
    pub navigation_failure: Option<NavigationError>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.scene_changes.is_empty()
            && self.navigation_failure.is_none()
    }
}

/// Schedule progress and location of one NPC. Only its own update mutates it.
#[derive(Component, Debug, Clone)]
pub struct ScheduleController {
    schedule: Arc<ScheduleDefinition>,
    day_start: GameTime,
    rotation: usize,
    cursor: Option<usize>,
    /// Entry whose route failed; re-dispatched while nothing later is due.
    retry: Option<usize>,
    phase: ControllerPhase,
    scene: SceneId,
    position: Vec2,
}

impl ScheduleController {
    /// Creates a controller placed at the schedule's initial position and
    /// resuming the entries that are due at `now`.
    pub fn new(schedule: Arc<ScheduleDefinition>, day_start: GameTime, now: GameTime) -> Self {
        let placement = schedule.initial_position().clone();
        let rotation = schedule.first_index_of_day(day_start);
        let mut controller = Self {
            schedule,
            day_start,
            rotation,
            cursor: None,
            retry: None,
            phase: ControllerPhase::AwaitingNextAction,
            scene: placement.scene,
            position: placement.position,
        };
        controller.seed_cursor(now);
        controller
    }

    pub fn schedule(&self) -> &ScheduleDefinition {
        &self.schedule
    }

    pub fn phase(&self) -> &ControllerPhase {
        &self.phase
    }

    /// Logical position of the last dispatched entry; `None` before the first.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The last dispatched entry.
    pub fn current_entry(&self) -> Option<&ScheduleEntry> {
        self.cursor.and_then(|position| self.logical_entry(position))
    }

    pub fn scene(&self) -> &SceneId {
        &self.scene
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Rewinds to the start of the day. An idle in progress is cut short;
    /// a route in progress is walked to its end first.
    pub fn on_day_boundary(&mut self) {
        self.cursor = None;
        self.retry = None;
        if matches!(self.phase, ControllerPhase::Idle { .. }) {
            self.phase = ControllerPhase::AwaitingNextAction;
        }
    }

    /// Puts the NPC at a saved location and re-derives schedule progress from `now`.
    pub fn restore(&mut self, scene: SceneId, position: Vec2, now: GameTime) {
        self.scene = scene;
        self.position = position;
        self.phase = ControllerPhase::AwaitingNextAction;
        self.retry = None;
        self.seed_cursor(now);
    }

    /// Runs one tick. `now` is the same for every controller within a frame.
    pub fn tick(
        &mut self,
        now: GameTime,
        delta_seconds: f32,
        scenes: &mut dyn SceneGraph,
        navigator: &dyn Navigator,
    ) -> TickReport {
        let mut report = TickReport::default();
        let delta = if delta_seconds.is_finite() {
            delta_seconds.max(0.0)
        } else {
            0.0
        };

        if let ControllerPhase::Idle { remaining } = &mut self.phase {
            *remaining -= delta;
            if *remaining <= 0.0 {
                self.phase = ControllerPhase::AwaitingNextAction;
            }
        }

        if matches!(self.phase, ControllerPhase::Navigating { .. }) {
            self.walk(delta, scenes, &mut report);
        }

        if self.phase == ControllerPhase::AwaitingNextAction {
            self.dispatch_due(now, scenes, navigator, &mut report);
        }

        report
    }

    fn walk(&mut self, delta: f32, scenes: &mut dyn SceneGraph, report: &mut TickReport) {
        let npc = self.schedule.npc_id().clone();
        let mut budget = self.schedule.speed() * delta;

        let ControllerPhase::Navigating { waypoints } = &mut self.phase else {
            return;
        };

        while let Some(waypoint) = waypoints.current().cloned() {
            if waypoint.scene != self.scene {
                scenes.move_entity_to_scene(&npc, &waypoint.scene);
                report.scene_changes.push(SceneChange {
                    from: self.scene.clone(),
                    to: waypoint.scene.clone(),
                });
                self.scene = waypoint.scene;
                self.position = waypoint.position;
                waypoints.advance();
                continue;
            }

            let offset = waypoint.position - self.position;
            let distance = offset.length();
            if distance <= budget {
                self.position = waypoint.position;
                budget -= distance;
                waypoints.advance();
            } else {
                self.position += offset / distance * budget;
                break;
            }
        }

        if waypoints.is_exhausted() {
            self.phase = ControllerPhase::AwaitingNextAction;
        }
    }

    fn dispatch_due(
        &mut self,
        now: GameTime,
        scenes: &dyn SceneGraph,
        navigator: &dyn Navigator,
        report: &mut TickReport,
    ) {
        let mut loop_redispatches = 0;

        loop {
            let position = match self.next_due(now) {
                Some(position) => {
                    self.retry = None;
                    position
                }
                None => match self.retry.take() {
                    Some(position) => position,
                    None => return,
                },
            };
            let Some(entry) = self.logical_entry(position).cloned() else {
                return;
            };
            self.cursor = Some(position);
            report.started.push(StartedAction {
                scheduled_at: entry.time,
                action: entry.action.clone(),
            });

            match entry.action {
                ActionKind::Idle { duration } => {
                    self.phase = ControllerPhase::Idle {
                        remaining: duration,
                    };
                    return;
                }
                ActionKind::MoveTo { scene, target } => match scene {
                    Some(scene) if scene != self.scene => {
                        self.begin_route(position, &scene, Some(target), scenes, navigator, report);
                        return;
                    }
                    // Same-scene moves never consult the scene graph.
                    _ => {
                        self.phase = ControllerPhase::Navigating {
                            waypoints: Waypoints::new(vec![Waypoint::new(
                                self.scene.clone(),
                                target,
                            )]),
                        };
                        return;
                    }
                },
                ActionKind::NavigateToScene { scene, target } => {
                    self.begin_route(position, &scene, target, scenes, navigator, report);
                    return;
                }
                ActionKind::Loop => {
                    self.cursor = None;
                    if loop_redispatches >= MAX_LOOP_REDISPATCHES {
                        self.phase = ControllerPhase::Idle {
                            remaining: LOOP_PARK_SECONDS,
                        };
                        return;
                    }
                    loop_redispatches += 1;
                }
            }
        }
    }

    fn begin_route(
        &mut self,
        position: usize,
        to_scene: &SceneId,
        target: Option<Vec2>,
        scenes: &dyn SceneGraph,
        navigator: &dyn Navigator,
        report: &mut TickReport,
    ) {
        match navigator.route_to_scene(scenes, &self.scene, self.position, to_scene, target) {
            Ok(waypoints) => {
                self.phase = ControllerPhase::Navigating { waypoints };
            }
            Err(err) => {
                self.retry = Some(position);
                self.phase = ControllerPhase::Idle {
                    remaining: NAVIGATION_RETRY_SECONDS,
                };
                report.navigation_failure = Some(err);
            }
        }
    }

    /// The entry after the cursor, if its time has come.
    fn next_due(&self, now: GameTime) -> Option<usize> {
        let next = self.cursor.map_or(0, |position| position + 1);
        let entry = self.logical_entry(next)?;
        (entry.time.since(self.day_start) <= now.since(self.day_start)).then_some(next)
    }

    fn logical_entry(&self, position: usize) -> Option<&ScheduleEntry> {
        let entries = self.schedule.entries();
        if position >= entries.len() {
            return None;
        }
        entries.get((self.rotation + position) % entries.len())
    }

    /// Places the cursor just before the group of entries sharing the latest
    /// due time, so that group runs (in file order) from the next dispatch.
    fn seed_cursor(&mut self, now: GameTime) {
        let elapsed = now.since(self.day_start);
        let due = (0..self.schedule.len())
            .take_while(|&position| {
                self.logical_entry(position)
                    .is_some_and(|entry| entry.time.since(self.day_start) <= elapsed)
            })
            .count();

        self.cursor = match due.checked_sub(1).and_then(|last| self.logical_entry(last)) {
            Some(latest) => {
                let latest_time = latest.time;
                (0..due)
                    .find(|&position| {
                        self.logical_entry(position)
                            .is_some_and(|entry| entry.time == latest_time)
                    })
                    .and_then(|first| first.checked_sub(1))
            }
            None => None,
        };
    }
}
