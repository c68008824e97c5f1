//! Navigation primitive: turns a (scene, position) goal into waypoints.
//!
//! There is no obstacle-aware pathfinding. Movement is straight-line inside a
//! scene and a teleport-style hop between scenes through their designated
//! exit and entry points.
use std::fmt;

use bevy::prelude::*;

use crate::world::scenes::{SceneGraph, SceneId};

/// One intermediate target on the way to a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub scene: SceneId,
    pub position: Vec2,
}

impl Waypoint {
    pub fn new(scene: SceneId, position: Vec2) -> Self {
        Self { scene, position }
    }
}

/// A route for a single navigation request, consumed front to back.
///
/// There is no way to rewind it; a new request produces a new route.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoints {
    points: Vec<Waypoint>,
    index: usize,
}

impl Waypoints {
    pub fn new(points: Vec<Waypoint>) -> Self {
        Self { points, index: 0 }
    }

    /// The waypoint currently being walked to.
    pub fn current(&self) -> Option<&Waypoint> {
        self.points.get(self.index)
    }

    pub fn advance(&mut self) {
        if self.index < self.points.len() {
            self.index += 1;
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.points.len()
    }

    /// Final waypoint of the route.
    pub fn destination(&self) -> Option<&Waypoint> {
        self.points.last()
    }

    pub fn remaining(&self) -> &[Waypoint] {
        &self.points[self.index.min(self.points.len())..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    UnknownScene(SceneId),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownScene(scene) => write!(f, "unknown target scene `{}`", scene),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Produces routes. Swap the implementation to get real pathfinding without
/// touching the schedule controller.
pub trait Navigator: Send + Sync {
    /// Route from `from` in `from_scene` to `to` in `to_scene`. Computed fresh
    /// on every call.
    fn route(
        &self,
        scenes: &dyn SceneGraph,
        from_scene: &SceneId,
        from: Vec2,
        to_scene: &SceneId,
        to: Vec2,
    ) -> Result<Waypoints, NavigationError>;

    /// Like [`Navigator::route`], defaulting the target to the scene's entry point.
    fn route_to_scene(
        &self,
        scenes: &dyn SceneGraph,
        from_scene: &SceneId,
        from: Vec2,
        to_scene: &SceneId,
        to: Option<Vec2>,
    ) -> Result<Waypoints, NavigationError> {
        let target = match to {
            Some(target) => target,
            None => scenes
                .entry_point(to_scene)
                .ok_or_else(|| NavigationError::UnknownScene(to_scene.clone()))?,
        };
        self.route(scenes, from_scene, from, to_scene, target)
    }
}

/// Straight lines inside a scene, door-to-door between scenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineNavigator;

impl Navigator for StraightLineNavigator {
    fn route(
        &self,
        scenes: &dyn SceneGraph,
        from_scene: &SceneId,
        _from: Vec2,
        to_scene: &SceneId,
        to: Vec2,
    ) -> Result<Waypoints, NavigationError> {
        if !scenes.scene_exists(to_scene) {
            return Err(NavigationError::UnknownScene(to_scene.clone()));
        }

        if from_scene == to_scene {
            return Ok(Waypoints::new(vec![Waypoint::new(to_scene.clone(), to)]));
        }

        let entry = scenes
            .entry_point(to_scene)
            .ok_or_else(|| NavigationError::UnknownScene(to_scene.clone()))?;

        let mut points = Vec::with_capacity(3);
        if let Some(exit) = scenes.exit_point(from_scene) {
            points.push(Waypoint::new(from_scene.clone(), exit));
        }
        points.push(Waypoint::new(to_scene.clone(), entry));
        points.push(Waypoint::new(to_scene.clone(), to));
        Ok(Waypoints::new(points))
    }
}

/// The navigator every schedule controller routes through.
#[derive(Resource)]
pub struct ActiveNavigator {
    inner: Box<dyn Navigator>,
}

impl ActiveNavigator {
    pub fn new(inner: Box<dyn Navigator>) -> Self {
        Self { inner }
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.inner.as_ref()
    }
}

impl Default for ActiveNavigator {
    fn default() -> Self {
        Self::new(Box::new(StraightLineNavigator))
    }
}
