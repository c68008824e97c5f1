//! NPC catalog: every schedule file under `data/npcs`, loaded once at startup.
use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use bevy::prelude::*;

use crate::{
    npc::{
        components::NpcId,
        schedule::{Placement, ScheduleDefinition, ScheduleParseError},
    },
    world::time::GameTime,
};

pub const NPC_DATA_DIR: &str = "data/npcs";

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub schedule: Arc<ScheduleDefinition>,
    /// Set when the file failed to load and the NPC was degraded to a
    /// stationary schedule.
    pub load_error: Option<ScheduleParseError>,
}

impl CatalogEntry {
    pub fn is_stationary(&self) -> bool {
        self.load_error.is_some()
    }
}

/// Loaded schedules keyed by NPC id. Shared read-only by all controllers.
#[derive(Resource, Debug, Clone, Default)]
pub struct NpcCatalog {
    entries: BTreeMap<NpcId, CatalogEntry>,
}

impl NpcCatalog {
    /// Loads every `*.json` file in `dir`, in file name order. A missing
    /// directory yields an empty catalog.
    pub fn load_dir(dir: &Path, day_start: GameTime) -> Self {
        let mut catalog = Self::default();

        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                warn!(
                    "Failed to read NPC directory {} ({}). No NPCs loaded.",
                    dir.display(),
                    err
                );
                return catalog;
            }
        };

        let mut paths: Vec<_> = read_dir
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let key = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            match fs::read_to_string(&path) {
                Ok(json) => catalog.insert_source(&key, &json, day_start),
                Err(err) => warn!("Failed to read {} ({}). Skipping.", path.display(), err),
            }
        }

        info!("Loaded {} NPC schedule(s) from {}", catalog.len(), dir.display());
        catalog
    }

    /// Parses one schedule file. A broken file degrades that NPC to a
    /// stationary schedule at whatever placement can still be read.
    pub fn insert_source(&mut self, key: &str, json: &str, day_start: GameTime) {
        match ScheduleDefinition::from_json(key, json, day_start) {
            Ok(schedule) => self.insert_schedule(schedule),
            Err(err) => {
                let (npc, placement) = match ScheduleDefinition::placement_from_json(json) {
                    Some((npc, placement)) => (npc.unwrap_or_else(|| NpcId::new(key)), placement),
                    None => (NpcId::new(key), Placement::fallback()),
                };
                warn!(
                    "{}. {} stays at {} ({:.0}, {:.0}).",
                    err, npc, placement.scene, placement.position.x, placement.position.y
                );
                self.insert_entry(
                    npc.clone(),
                    CatalogEntry {
                        schedule: Arc::new(ScheduleDefinition::stationary(npc, placement)),
                        load_error: Some(err),
                    },
                );
            }
        }
    }

    pub fn insert_schedule(&mut self, schedule: ScheduleDefinition) {
        let npc = schedule.npc_id().clone();
        self.insert_entry(
            npc,
            CatalogEntry {
                schedule: Arc::new(schedule),
                load_error: None,
            },
        );
    }

    fn insert_entry(&mut self, npc: NpcId, entry: CatalogEntry) {
        if self.entries.contains_key(&npc) {
            warn!("Duplicate schedule for {}. Keeping the first one.", npc);
            return;
        }
        self.entries.insert(npc, entry);
    }

    pub fn get(&self, npc: &NpcId) -> Option<&CatalogEntry> {
        self.entries.get(npc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NpcId, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::schedule::ActionKind;

    fn day_start() -> GameTime {
        GameTime::from_hm(8, 0).unwrap()
    }

    #[test]
    fn broken_file_degrades_to_stationary() {
        let mut catalog = NpcCatalog::default();
        catalog.insert_source(
            "henry",
            r#"{
                "npc_id": "henry",
                "initial_position": { "scene": "cat_cafe_kitchen", "x": 12, "y": 34 },
                "schedule": [ { "time": "08:00", "action": "juggle" } ]
            }"#,
            day_start(),
        );

        let entry = catalog.get(&NpcId::from("henry")).unwrap();
        assert!(entry.is_stationary());
        assert!(entry.schedule.is_empty());
        assert_eq!(
            entry.schedule.initial_position(),
            &Placement::new("cat_cafe_kitchen", Vec2::new(12.0, 34.0))
        );
    }

    #[test]
    fn unreadable_file_uses_fallback_placement_and_key() {
        let mut catalog = NpcCatalog::default();
        catalog.insert_source("ghost", "not json at all", day_start());

        let entry = catalog.get(&NpcId::from("ghost")).unwrap();
        assert_eq!(entry.schedule.initial_position(), &Placement::fallback());
        assert!(matches!(
            entry.load_error,
            Some(ScheduleParseError::Malformed { .. })
        ));
    }

    #[test]
    fn one_bad_file_does_not_affect_others() {
        let mut catalog = NpcCatalog::default();
        catalog.insert_source(
            "mira",
            r#"{
                "npc_id": "mira",
                "initial_position": { "scene": "outdoor", "x": 0, "y": 0 },
                "schedule": [ { "time": "09:00", "action": "idle", "duration": 30 } ]
            }"#,
            day_start(),
        );
        catalog.insert_source("broken", "{", day_start());

        assert_eq!(catalog.len(), 2);
        let mira = catalog.get(&NpcId::from("mira")).unwrap();
        assert!(!mira.is_stationary());
        assert_eq!(
            mira.schedule.entries()[0].action,
            ActionKind::Idle { duration: 30.0 }
        );
    }

    #[test]
    fn first_schedule_wins_on_duplicate_ids() {
        let mut catalog = NpcCatalog::default();
        let placement = Placement::fallback();
        catalog.insert_schedule(ScheduleDefinition::stationary(
            NpcId::from("henry"),
            placement.clone(),
        ));
        catalog.insert_schedule(ScheduleDefinition::stationary(
            NpcId::from("henry"),
            Placement::new("arcade", Vec2::ZERO),
        ));

        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog
                .get(&NpcId::from("henry"))
                .map(|entry| entry.schedule.initial_position().clone()),
            Some(placement)
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let catalog = NpcCatalog::load_dir(Path::new("does/not/exist"), day_start());
        assert!(catalog.is_empty());
    }
}
