//! Static building and unit definitions.
//!
//! The catalog is loaded once at process start and never mutated. A
//! compiled-in standard set covers the default session; a YAML file can
//! replace it wholesale for modded catalogs.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One-time stat deltas applied when a building is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingEffects {
    pub happiness: i32,
    pub gold: i32,
    pub food: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub effects: BuildingEffects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCost {
    pub gold: i32,
    pub food: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDef {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub cost: UnitCost,
    /// Building type that must exist before this unit can be trained.
    pub required_building: String,
    pub build_time_secs: f64,
    /// Movement speed in pixels per second. Carried for the rendering
    /// collaborator; the simulation core never reads it.
    pub speed: f64,
}

impl UnitDef {
    pub fn build_time_ms(&self) -> u64 {
        (self.build_time_secs * 1_000.0).round() as u64
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    buildings: BTreeMap<String, BuildingDef>,
    units: BTreeMap<String, UnitDef>,
}

impl Catalog {
    /// Assemble a catalog from definition lists, rejecting duplicate ids
    /// and dangling prerequisite references.
    pub fn from_defs(buildings: Vec<BuildingDef>, units: Vec<UnitDef>) -> Result<Self> {
        let mut building_map = BTreeMap::new();
        for def in buildings {
            if building_map.insert(def.id.clone(), def.clone()).is_some() {
                bail!("duplicate building id '{}'", def.id);
            }
        }
        let mut unit_map = BTreeMap::new();
        for def in units {
            if !building_map.contains_key(&def.required_building) {
                bail!(
                    "unit '{}' requires unknown building '{}'",
                    def.id,
                    def.required_building
                );
            }
            if unit_map.insert(def.id.clone(), def.clone()).is_some() {
                bail!("duplicate unit id '{}'", def.id);
            }
        }
        Ok(Self {
            buildings: building_map,
            units: unit_map,
        })
    }

    pub fn building(&self, id: &str) -> Option<&BuildingDef> {
        self.buildings.get(id)
    }

    pub fn unit(&self, id: &str) -> Option<&UnitDef> {
        self.units.get(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingDef> {
        self.buildings.values()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitDef> {
        self.units.values()
    }

    /// The built-in catalog: eleven civic buildings and three trainable
    /// unit lines.
    pub fn standard() -> Self {
        let buildings = vec![
            building("house", "House", 50.0, 50.0, 5, -10, -5),
            building("church", "Church", 60.0, 80.0, 15, -20, 0),
            building("mine", "Gold Mine", 70.0, 70.0, -10, 30, 0),
            building("farm", "Wheat Farm", 80.0, 60.0, 5, 10, 25),
            building("lumbermill", "Lumber Mill", 65.0, 65.0, -5, 20, 0),
            building("barracks", "Barracks", 75.0, 55.0, 0, -15, -10),
            building("market", "Market", 70.0, 50.0, 10, 15, 10),
            building("warriorcamp", "Warrior Camp", 65.0, 65.0, -5, -20, -15),
            building("archeryrange", "Archery Range", 70.0, 60.0, -3, -25, -10),
            building("tavern", "Tavern", 60.0, 55.0, 20, 10, -5),
            building("storehouse", "Storehouse", 75.0, 75.0, 0, 5, 15),
        ];
        let units = vec![
            UnitDef {
                id: "warrior".into(),
                name: "Warrior".into(),
                width: 30.0,
                height: 30.0,
                cost: UnitCost { gold: 20, food: 10 },
                required_building: "warriorcamp".into(),
                build_time_secs: 3.0,
                speed: 80.0,
            },
            UnitDef {
                id: "archer".into(),
                name: "Archer".into(),
                width: 30.0,
                height: 30.0,
                cost: UnitCost { gold: 25, food: 8 },
                required_building: "archeryrange".into(),
                build_time_secs: 3.0,
                speed: 100.0,
            },
            UnitDef {
                id: "knight".into(),
                name: "Knight".into(),
                width: 35.0,
                height: 35.0,
                cost: UnitCost { gold: 40, food: 15 },
                required_building: "barracks".into(),
                build_time_secs: 3.0,
                speed: 60.0,
            },
        ];
        Self::from_defs(buildings, units).expect("standard catalog is well-formed")
    }
}

fn building(
    id: &str,
    name: &str,
    width: f64,
    height: f64,
    happiness: i32,
    gold: i32,
    food: i32,
) -> BuildingDef {
    BuildingDef {
        id: id.into(),
        name: name.into(),
        width,
        height,
        effects: BuildingEffects {
            happiness,
            gold,
            food,
        },
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    buildings: Vec<BuildingDef>,
    units: Vec<UnitDef>,
}

pub struct CatalogLoader {
    base_dir: PathBuf,
}

impl CatalogLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Catalog> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let parsed: CatalogFile = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Catalog::from_defs(parsed.buildings, parsed.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_catalog_links_units_to_buildings() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.buildings().count(), 11);
        assert_eq!(catalog.units().count(), 3);
        for unit in catalog.units() {
            assert!(
                catalog.building(&unit.required_building).is_some(),
                "unit '{}' must reference a known building",
                unit.id
            );
        }
        let warrior = catalog.unit("warrior").expect("warrior exists");
        assert_eq!(warrior.required_building, "warriorcamp");
        assert_eq!(warrior.cost, UnitCost { gold: 20, food: 10 });
        assert_eq!(warrior.build_time_ms(), 3_000);
    }

    #[test]
    fn loads_catalog_from_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.yaml");
        let mut file = fs::File::create(&path).expect("create catalog file");
        file.write_all(
            br#"
buildings:
  - id: keep
    name: Keep
    width: 80.0
    height: 80.0
    effects: { happiness: 5, gold: -30, food: 0 }
units:
  - id: guard
    name: Guard
    width: 30.0
    height: 30.0
    cost: { gold: 10, food: 5 }
    required_building: keep
    build_time_secs: 2.0
    speed: 70.0
"#,
        )
        .expect("write catalog file");

        let catalog = CatalogLoader::new(dir.path())
            .load("catalog.yaml")
            .expect("catalog should load");
        assert!(catalog.building("keep").is_some());
        assert_eq!(catalog.unit("guard").unwrap().required_building, "keep");
    }

    #[test]
    fn rejects_dangling_prerequisite() {
        let units = vec![UnitDef {
            id: "ghost".into(),
            name: "Ghost".into(),
            width: 30.0,
            height: 30.0,
            cost: UnitCost { gold: 1, food: 1 },
            required_building: "nowhere".into(),
            build_time_secs: 1.0,
            speed: 10.0,
        }];
        assert!(Catalog::from_defs(Vec::new(), units).is_err());
    }
}
