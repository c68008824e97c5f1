//! Scene registry: the set of known scenes, their arrival points, and which
//! scene each NPC currently belongs to.
use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::Path,
};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::npc::components::NpcId;

const CONFIG_PATH: &str = "config/scenes.toml";

/// Identifier of a loaded scene (`"cat_cafe"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The only view of the world the schedule layer is allowed to use.
pub trait SceneGraph {
    fn scene_exists(&self, scene: &SceneId) -> bool;

    /// Where entities arriving in `scene` appear.
    fn entry_point(&self, scene: &SceneId) -> Option<Vec2>;

    /// Where entities leaving `scene` walk to before transitioning, if the scene defines one.
    fn exit_point(&self, _scene: &SceneId) -> Option<Vec2> {
        None
    }

    /// Moves an entity's scene membership. Never fails for a scene that exists.
    fn move_entity_to_scene(&mut self, npc: &NpcId, scene: &SceneId);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneDefinition {
    pub id: SceneId,
    pub entry: Vec2,
    pub exit: Option<Vec2>,
}

impl SceneDefinition {
    pub fn new(id: impl Into<String>, entry: Vec2) -> Self {
        Self {
            id: SceneId::new(id),
            entry,
            exit: None,
        }
    }

    pub fn with_exit(mut self, exit: Vec2) -> Self {
        self.exit = Some(exit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneConfigError {
    Malformed(String),
    DuplicateScene(SceneId),
    Empty,
}

impl fmt::Display for SceneConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed scene config: {}", message),
            Self::DuplicateScene(id) => write!(f, "scene `{}` is defined twice", id),
            Self::Empty => write!(f, "no scenes defined"),
        }
    }
}

impl std::error::Error for SceneConfigError {}

#[derive(Debug, Clone, Deserialize)]
struct RawSceneConfig {
    #[serde(default, rename = "scene")]
    scenes: Vec<RawScene>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawScene {
    id: String,
    entry: [f32; 2],
    #[serde(default)]
    exit: Option<[f32; 2]>,
}

/// Loaded scenes plus the scene membership of every NPC.
#[derive(Resource, Debug, Clone, Default)]
pub struct SceneRegistry {
    scenes: HashMap<SceneId, SceneDefinition>,
    locations: BTreeMap<NpcId, SceneId>,
}

impl SceneRegistry {
    pub fn new(definitions: impl IntoIterator<Item = SceneDefinition>) -> Self {
        let scenes = definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), definition))
            .collect();
        Self {
            scenes,
            locations: BTreeMap::new(),
        }
    }

    /// The cafe rooms and the street outside them.
    pub fn with_builtin_scenes() -> Self {
        Self::new([
            SceneDefinition::new("cat_cafe", Vec2::new(400.0, 720.0))
                .with_exit(Vec2::new(640.0, 980.0)),
            SceneDefinition::new("cat_cafe_kitchen", Vec2::new(200.0, 500.0))
                .with_exit(Vec2::new(1080.0, 500.0)),
            SceneDefinition::new("outdoor", Vec2::new(640.0, 360.0)),
            SceneDefinition::new("arcade", Vec2::new(320.0, 600.0)),
        ])
    }

    pub fn load_or_default() -> Self {
        let path = Path::new(CONFIG_PATH);
        match fs::read_to_string(path) {
            Ok(data) => match Self::from_toml_str(&data) {
                Ok(registry) => registry,
                Err(err) => {
                    warn!(
                        "Failed to parse {} ({}). Falling back to built-in scenes.",
                        CONFIG_PATH, err
                    );
                    Self::with_builtin_scenes()
                }
            },
            Err(err) => {
                warn!(
                    "Failed to read {} ({}). Falling back to built-in scenes.",
                    CONFIG_PATH, err
                );
                Self::with_builtin_scenes()
            }
        }
    }

    pub fn from_toml_str(data: &str) -> Result<Self, SceneConfigError> {
        let raw = toml::from_str::<RawSceneConfig>(data)
            .map_err(|err| SceneConfigError::Malformed(err.to_string()))?;
        if raw.scenes.is_empty() {
            return Err(SceneConfigError::Empty);
        }

        let mut registry = Self::default();
        for scene in raw.scenes {
            let id = SceneId::new(scene.id.trim());
            if registry.scenes.contains_key(&id) {
                return Err(SceneConfigError::DuplicateScene(id));
            }
            let definition = SceneDefinition {
                id: id.clone(),
                entry: Vec2::from_array(scene.entry),
                exit: scene.exit.map(Vec2::from_array),
            };
            registry.scenes.insert(id, definition);
        }
        Ok(registry)
    }

    pub fn scene(&self, scene: &SceneId) -> Option<&SceneDefinition> {
        self.scenes.get(scene)
    }

    /// Scene ids in sorted order.
    pub fn scene_ids(&self) -> Vec<&SceneId> {
        let mut ids: Vec<_> = self.scenes.keys().collect();
        ids.sort();
        ids
    }

    /// Records where an NPC starts, without going through a transition.
    pub fn place(&mut self, npc: NpcId, scene: SceneId) {
        self.locations.insert(npc, scene);
    }

    pub fn location_of(&self, npc: &NpcId) -> Option<&SceneId> {
        self.locations.get(npc)
    }

    pub fn npcs_in_scene(&self, scene: &SceneId) -> Vec<&NpcId> {
        self.locations
            .iter()
            .filter(|(_, location)| *location == scene)
            .map(|(npc, _)| npc)
            .collect()
    }

    /// Drops an NPC's membership when it is torn down.
    pub fn forget(&mut self, npc: &NpcId) -> Option<SceneId> {
        self.locations.remove(npc)
    }

    pub fn retain_entities(&mut self, mut keep: impl FnMut(&NpcId) -> bool) {
        self.locations.retain(|npc, _| keep(npc));
    }
}

impl SceneGraph for SceneRegistry {
    fn scene_exists(&self, scene: &SceneId) -> bool {
        self.scenes.contains_key(scene)
    }

    fn entry_point(&self, scene: &SceneId) -> Option<Vec2> {
        self.scenes.get(scene).map(|definition| definition.entry)
    }

    fn exit_point(&self, scene: &SceneId) -> Option<Vec2> {
        self.scenes.get(scene).and_then(|definition| definition.exit)
    }

    fn move_entity_to_scene(&mut self, npc: &NpcId, scene: &SceneId) {
        if !self.scenes.contains_key(scene) {
            warn!("Ignoring move of {} into unknown scene {}", npc, scene);
            return;
        }
        self.locations.insert(npc.clone(), scene.clone());
    }
}
