//! Schedule definitions: parsing and validating one NPC's daily routine file.
use std::fmt;

use bevy::prelude::*;
use serde::Deserialize;

use crate::{
    npc::components::NpcId,
    world::{scenes::SceneId, time::GameTime},
};

/// Movement speed used when a schedule file does not name one.
pub const DEFAULT_SPEED: f32 = 100.0;

/// What an NPC does when a schedule entry becomes due.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Idle { duration: f32 },
    MoveTo { scene: Option<SceneId>, target: Vec2 },
    NavigateToScene { scene: SceneId, target: Option<Vec2> },
    Loop,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::MoveTo { .. } => "move_to",
            Self::NavigateToScene { .. } => "navigate_to_scene",
            Self::Loop => "loop",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle { duration } => write!(f, "idle for {:.0}s", duration),
            Self::MoveTo {
                scene: Some(scene),
                target,
            } => write!(f, "move_to {} ({:.0}, {:.0})", scene, target.x, target.y),
            Self::MoveTo {
                scene: None,
                target,
            } => write!(f, "move_to ({:.0}, {:.0})", target.x, target.y),
            Self::NavigateToScene {
                scene,
                target: Some(target),
            } => write!(
                f,
                "navigate_to_scene {} ({:.0}, {:.0})",
                scene, target.x, target.y
            ),
            Self::NavigateToScene {
                scene,
                target: None,
            } => write!(f, "navigate_to_scene {}", scene),
            Self::Loop => f.write_str("loop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub time: GameTime,
    pub action: ActionKind,
}

/// A scene plus coordinates inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub scene: SceneId,
    pub position: Vec2,
}

impl Placement {
    pub fn new(scene: impl Into<String>, position: Vec2) -> Self {
        Self {
            scene: SceneId::new(scene),
            position,
        }
    }

    /// Where an NPC stands when nothing usable could be read from its file.
    pub fn fallback() -> Self {
        Self::new("cat_cafe", Vec2::new(400.0, 720.0))
    }
}

/// Malformed schedule file or entry. Fatal to that NPC's schedule only.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleParseError {
    Malformed {
        npc: String,
        message: String,
    },
    InvalidSpeed {
        npc: String,
        speed: f32,
    },
    InvalidEntry {
        npc: String,
        index: usize,
        message: String,
    },
    InvalidTime {
        npc: String,
        index: usize,
        time: String,
    },
    InvalidDuration {
        npc: String,
        index: usize,
        duration: f32,
    },
    PartialCoordinates {
        npc: String,
        index: usize,
    },
    NonFiniteCoordinates {
        npc: String,
        index: usize,
    },
    DuplicateLoop {
        npc: String,
        index: usize,
    },
    LoopNotLast {
        npc: String,
        index: usize,
    },
}

impl ScheduleParseError {
    /// The NPC whose file failed to load.
    pub fn npc(&self) -> &str {
        match self {
            Self::Malformed { npc, .. }
            | Self::InvalidSpeed { npc, .. }
            | Self::InvalidEntry { npc, .. }
            | Self::InvalidTime { npc, .. }
            | Self::InvalidDuration { npc, .. }
            | Self::PartialCoordinates { npc, .. }
            | Self::NonFiniteCoordinates { npc, .. }
            | Self::DuplicateLoop { npc, .. }
            | Self::LoopNotLast { npc, .. } => npc,
        }
    }

    /// Index of the offending entry in file order, when one is to blame.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Self::Malformed { .. } | Self::InvalidSpeed { .. } => None,
            Self::InvalidEntry { index, .. }
            | Self::InvalidTime { index, .. }
            | Self::InvalidDuration { index, .. }
            | Self::PartialCoordinates { index, .. }
            | Self::NonFiniteCoordinates { index, .. }
            | Self::DuplicateLoop { index, .. }
            | Self::LoopNotLast { index, .. } => Some(*index),
        }
    }
}

impl fmt::Display for ScheduleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { npc, message } => {
                write!(f, "schedule for {} is malformed: {}", npc, message)
            }
            Self::InvalidSpeed { npc, speed } => {
                write!(f, "schedule for {} has invalid speed {}", npc, speed)
            }
            Self::InvalidEntry {
                npc,
                index,
                message,
            } => write!(f, "schedule for {} entry {}: {}", npc, index, message),
            Self::InvalidTime { npc, index, time } => write!(
                f,
                "schedule for {} entry {}: `{}` is not a HH:MM time",
                npc, index, time
            ),
            Self::InvalidDuration {
                npc,
                index,
                duration,
            } => write!(
                f,
                "schedule for {} entry {}: idle duration {} must be finite and >= 0",
                npc, index, duration
            ),
            Self::PartialCoordinates { npc, index } => write!(
                f,
                "schedule for {} entry {}: x and y must be given together",
                npc, index
            ),
            Self::NonFiniteCoordinates { npc, index } => write!(
                f,
                "schedule for {} entry {}: coordinates must be finite",
                npc, index
            ),
            Self::DuplicateLoop { npc, index } => write!(
                f,
                "schedule for {} entry {}: only one loop entry is allowed",
                npc, index
            ),
            Self::LoopNotLast { npc, index } => write!(
                f,
                "schedule for {} entry {}: loop must be the last entry of the day",
                npc, index
            ),
        }
    }
}

impl std::error::Error for ScheduleParseError {}

#[derive(Debug, Deserialize)]
struct RawScheduleFile {
    npc_id: String,
    #[serde(default)]
    speed: Option<f32>,
    initial_position: RawPlacement,
    schedule: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPlacement {
    scene: String,
    x: f32,
    y: f32,
}

impl From<RawPlacement> for Placement {
    fn from(value: RawPlacement) -> Self {
        Placement::new(value.scene, Vec2::new(value.x, value.y))
    }
}

/// The part of a schedule file needed to place an NPC whose schedule is broken.
#[derive(Debug, Deserialize)]
struct RawPlacementOnly {
    #[serde(default)]
    npc_id: Option<String>,
    initial_position: RawPlacement,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    time: String,
    #[serde(flatten)]
    action: RawAction,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawAction {
    Idle {
        duration: f32,
    },
    MoveTo {
        #[serde(default)]
        scene: Option<String>,
        x: f32,
        y: f32,
    },
    NavigateToScene {
        target_scene: String,
        #[serde(default)]
        x: Option<f32>,
        #[serde(default)]
        y: Option<f32>,
    },
    Loop,
}

/// Immutable daily routine for one NPC, sorted ascending by time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDefinition {
    npc_id: NpcId,
    speed: f32,
    initial_position: Placement,
    entries: Vec<ScheduleEntry>,
}

impl ScheduleDefinition {
    /// Builds a definition from already-typed entries, applying the same
    /// ordering and loop rules as file loading.
    pub fn new(
        npc_id: NpcId,
        speed: f32,
        initial_position: Placement,
        entries: Vec<ScheduleEntry>,
        day_start: GameTime,
    ) -> Result<Self, ScheduleParseError> {
        let npc = npc_id.to_string();
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ScheduleParseError::InvalidSpeed { npc, speed });
        }

        // Remember file order so errors can point at the authored entry.
        let mut indexed: Vec<(usize, ScheduleEntry)> = entries.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, entry)| entry.time);
        validate_loop(&npc, &indexed, day_start)?;

        Ok(Self {
            npc_id,
            speed,
            initial_position,
            entries: indexed.into_iter().map(|(_, entry)| entry).collect(),
        })
    }

    /// A schedule with no entries: the NPC stays where it was placed.
    pub fn stationary(npc_id: NpcId, initial_position: Placement) -> Self {
        Self {
            npc_id,
            speed: DEFAULT_SPEED,
            initial_position,
            entries: Vec::new(),
        }
    }

    /// Parses a schedule file. `key` names the NPC in errors raised before
    /// the file's own `npc_id` could be read.
    pub fn from_json(key: &str, json: &str, day_start: GameTime) -> Result<Self, ScheduleParseError> {
        let raw = serde_json::from_str::<RawScheduleFile>(json).map_err(|err| {
            ScheduleParseError::Malformed {
                npc: key.to_string(),
                message: err.to_string(),
            }
        })?;

        let npc = raw.npc_id.trim().to_string();
        if npc.is_empty() {
            return Err(ScheduleParseError::Malformed {
                npc: key.to_string(),
                message: "npc_id is empty".to_string(),
            });
        }

        let entries = raw
            .schedule
            .into_iter()
            .enumerate()
            .map(|(index, value)| parse_entry(&npc, index, value))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            NpcId::new(npc),
            raw.speed.unwrap_or(DEFAULT_SPEED),
            raw.initial_position.into(),
            entries,
            day_start,
        )
    }

    /// Best-effort read of `initial_position` from a file that failed to parse.
    pub fn placement_from_json(json: &str) -> Option<(Option<NpcId>, Placement)> {
        let raw = serde_json::from_str::<RawPlacementOnly>(json).ok()?;
        let npc = raw
            .npc_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(NpcId::new);
        Some((npc, raw.initial_position.into()))
    }

    pub fn npc_id(&self) -> &NpcId {
        &self.npc_id
    }

    /// Pixels per second.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn initial_position(&self) -> &Placement {
        &self.initial_position
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first entry at or after `day_start`; logical order starts
    /// there and wraps through midnight.
    pub fn first_index_of_day(&self, day_start: GameTime) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries.partition_point(|entry| entry.time < day_start) % self.entries.len()
    }
}

fn parse_entry(
    npc: &str,
    index: usize,
    value: serde_json::Value,
) -> Result<ScheduleEntry, ScheduleParseError> {
    let raw = serde_json::from_value::<RawEntry>(value).map_err(|err| {
        ScheduleParseError::InvalidEntry {
            npc: npc.to_string(),
            index,
            message: err.to_string(),
        }
    })?;

    let time = GameTime::parse_hhmm(&raw.time).ok_or_else(|| ScheduleParseError::InvalidTime {
        npc: npc.to_string(),
        index,
        time: raw.time.clone(),
    })?;

    let action = match raw.action {
        RawAction::Idle { duration } => {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ScheduleParseError::InvalidDuration {
                    npc: npc.to_string(),
                    index,
                    duration,
                });
            }
            ActionKind::Idle { duration }
        }
        RawAction::MoveTo { scene, x, y } => ActionKind::MoveTo {
            scene: scene
                .map(|scene| scene.trim().to_string())
                .filter(|scene| !scene.is_empty())
                .map(SceneId::new),
            target: finite_target(npc, index, x, y)?,
        },
        RawAction::NavigateToScene { target_scene, x, y } => {
            let target = match (x, y) {
                (Some(x), Some(y)) => Some(finite_target(npc, index, x, y)?),
                (None, None) => None,
                _ => {
                    return Err(ScheduleParseError::PartialCoordinates {
                        npc: npc.to_string(),
                        index,
                    })
                }
            };
            ActionKind::NavigateToScene {
                scene: SceneId::new(target_scene.trim()),
                target,
            }
        }
        RawAction::Loop => ActionKind::Loop,
    };

    Ok(ScheduleEntry { time, action })
}

fn finite_target(npc: &str, index: usize, x: f32, y: f32) -> Result<Vec2, ScheduleParseError> {
    let target = Vec2::new(x, y);
    if target.is_finite() {
        Ok(target)
    } else {
        Err(ScheduleParseError::NonFiniteCoordinates {
            npc: npc.to_string(),
            index,
        })
    }
}

/// At most one loop, and it must be the last entry of the day as seen from `day_start`.
fn validate_loop(
    npc: &str,
    sorted: &[(usize, ScheduleEntry)],
    day_start: GameTime,
) -> Result<(), ScheduleParseError> {
    let mut loops = sorted
        .iter()
        .filter(|(_, entry)| entry.action == ActionKind::Loop)
        .map(|(index, _)| *index);
    let Some(first_loop) = loops.next() else {
        return Ok(());
    };
    if let Some(second_loop) = loops.next() {
        return Err(ScheduleParseError::DuplicateLoop {
            npc: npc.to_string(),
            index: second_loop.max(first_loop),
        });
    }

    let rotation = sorted.partition_point(|(_, entry)| entry.time < day_start) % sorted.len();
    let last_of_day = (rotation + sorted.len() - 1) % sorted.len();
    if sorted[last_of_day].0 != first_loop {
        return Err(ScheduleParseError::LoopNotLast {
            npc: npc.to_string(),
            index: first_loop,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hour: u8, minute: u8) -> GameTime {
        GameTime::from_hm(hour, minute).unwrap()
    }

    fn day_start() -> GameTime {
        hm(8, 0)
    }

    const HENRY: &str = r#"{
        "npc_id": "henry",
        "speed": 100,
        "initial_position": { "scene": "cat_cafe", "x": 400, "y": 720 },
        "schedule": [
            { "time": "09:00", "action": "move_to", "scene": "cat_cafe", "x": 650, "y": 850 },
            { "time": "08:00", "action": "idle", "duration": 300 },
            { "time": "12:30", "action": "navigate_to_scene", "target_scene": "cat_cafe_kitchen" },
            { "time": "22:00", "action": "loop" }
        ]
    }"#;

    #[test]
    fn parses_and_sorts_entries_by_time() {
        let schedule = ScheduleDefinition::from_json("henry", HENRY, day_start()).unwrap();

        assert_eq!(schedule.npc_id(), &NpcId::from("henry"));
        assert_eq!(schedule.speed(), 100.0);
        assert_eq!(
            schedule.initial_position(),
            &Placement::new("cat_cafe", Vec2::new(400.0, 720.0))
        );

        let times: Vec<_> = schedule.entries().iter().map(|entry| entry.time).collect();
        assert_eq!(times, vec![hm(8, 0), hm(9, 0), hm(12, 30), hm(22, 0)]);
        assert_eq!(
            schedule.entries()[1].action,
            ActionKind::MoveTo {
                scene: Some(SceneId::from("cat_cafe")),
                target: Vec2::new(650.0, 850.0),
            }
        );
        assert_eq!(
            schedule.entries()[2].action,
            ActionKind::NavigateToScene {
                scene: SceneId::from("cat_cafe_kitchen"),
                target: None,
            }
        );
    }

    #[test]
    fn ties_keep_file_order() {
        let json = r#"{
            "npc_id": "mira",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "10:00", "action": "idle", "duration": 1 },
                { "time": "08:00", "action": "idle", "duration": 5 },
                { "time": "08:00", "action": "move_to", "x": 10, "y": 10 },
                { "time": "08:00", "action": "idle", "duration": 7 }
            ]
        }"#;
        let schedule = ScheduleDefinition::from_json("mira", json, day_start()).unwrap();

        let actions: Vec<_> = schedule
            .entries()
            .iter()
            .map(|entry| entry.action.clone())
            .collect();
        assert_eq!(
            actions,
            vec![
                ActionKind::Idle { duration: 5.0 },
                ActionKind::MoveTo {
                    scene: None,
                    target: Vec2::new(10.0, 10.0)
                },
                ActionKind::Idle { duration: 7.0 },
                ActionKind::Idle { duration: 1.0 },
            ]
        );
        assert_eq!(schedule.speed(), DEFAULT_SPEED);
    }

    #[test]
    fn errors_identify_npc_and_entry_index() {
        let unknown_action = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "08:00", "action": "idle", "duration": 5 },
                { "time": "09:00", "action": "teleport", "x": 1, "y": 2 }
            ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", unknown_action, day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::InvalidEntry { index: 1, .. }));
        assert_eq!(err.npc(), "henry");
        assert!(err.to_string().contains("entry 1"));

        let missing_field = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [ { "time": "08:00", "action": "move_to", "x": 5 } ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", missing_field, day_start()).unwrap_err();
        assert_eq!(err.entry_index(), Some(0));

        let bad_time = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [ { "time": "25:10", "action": "loop" } ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", bad_time, day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::InvalidTime { index: 0, .. }));
    }

    #[test]
    fn rejects_bad_speed_and_partial_coordinates() {
        let bad_speed = r#"{
            "npc_id": "henry",
            "speed": 0,
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": []
        }"#;
        let err = ScheduleDefinition::from_json("henry", bad_speed, day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::InvalidSpeed { .. }));

        let partial = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [ { "time": "08:00", "action": "navigate_to_scene", "target_scene": "outdoor", "x": 3 } ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", partial, day_start()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleParseError::PartialCoordinates { index: 0, .. }
        ));

        let err = ScheduleDefinition::from_json("ghost", "{ not json", day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::Malformed { .. }));
        assert_eq!(err.npc(), "ghost");
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let huge_move = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "08:00", "action": "idle", "duration": 5 },
                { "time": "09:00", "action": "move_to", "x": 1e39, "y": 10 }
            ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", huge_move, day_start()).unwrap_err();
        assert_eq!(
            err,
            ScheduleParseError::NonFiniteCoordinates {
                npc: "henry".to_string(),
                index: 1,
            }
        );

        let huge_navigate = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "09:00", "action": "navigate_to_scene", "target_scene": "outdoor", "x": 5, "y": -1e39 }
            ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", huge_navigate, day_start()).unwrap_err();
        assert_eq!(err.entry_index(), Some(0));
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn loop_must_be_unique_and_last_of_day() {
        let two_loops = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "21:00", "action": "loop" },
                { "time": "22:00", "action": "loop" }
            ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", two_loops, day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::DuplicateLoop { index: 1, .. }));

        let loop_early = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "12:00", "action": "loop" },
                { "time": "13:00", "action": "idle", "duration": 5 }
            ]
        }"#;
        let err = ScheduleDefinition::from_json("henry", loop_early, day_start()).unwrap_err();
        assert!(matches!(err, ScheduleParseError::LoopNotLast { index: 0, .. }));

        // After midnight is still "later" than 23:00 when the day starts at 08:00.
        let past_midnight = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe", "x": 0, "y": 0 },
            "schedule": [
                { "time": "01:00", "action": "loop" },
                { "time": "23:00", "action": "idle", "duration": 5 }
            ]
        }"#;
        let schedule = ScheduleDefinition::from_json("henry", past_midnight, day_start()).unwrap();
        assert_eq!(schedule.first_index_of_day(day_start()), 1);
    }

    #[test]
    fn recovers_placement_from_broken_file() {
        let broken = r#"{
            "npc_id": "henry",
            "initial_position": { "scene": "cat_cafe_kitchen", "x": 12, "y": 34 },
            "schedule": [ { "time": "08:00", "action": "dance" } ]
        }"#;
        assert!(ScheduleDefinition::from_json("henry", broken, day_start()).is_err());

        let (npc, placement) = ScheduleDefinition::placement_from_json(broken).unwrap();
        assert_eq!(npc, Some(NpcId::from("henry")));
        assert_eq!(
            placement,
            Placement::new("cat_cafe_kitchen", Vec2::new(12.0, 34.0))
        );
        assert!(ScheduleDefinition::placement_from_json("[]").is_none());
    }
}
