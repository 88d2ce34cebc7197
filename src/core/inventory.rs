//! Scene inventory: merging catalog results, summaries and GeoJSON persistence.

use crate::types::{BoundingBox, Footprint, Platform, PrepError, PrepResult, SceneRecord};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Deduplicated, insertion-ordered collection of scenes keyed by granule name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    scenes: IndexMap<String, SceneRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by identifier. A replaced record keeps its original position.
    pub fn insert(&mut self, scene: SceneRecord) -> Option<SceneRecord> {
        self.scenes.insert(scene.identifier.clone(), scene)
    }

    pub fn get(&self, identifier: &str) -> Option<&SceneRecord> {
        self.scenes.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneRecord> {
        self.scenes.values()
    }

    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.scenes.keys().map(String::as_str).collect()
    }

    /// Distinct acquisition dates on one relative orbit
    pub fn dates_for_orbit(&self, relative_orbit: u32) -> BTreeSet<NaiveDate> {
        self.iter()
            .filter(|s| s.relative_orbit == relative_orbit)
            .map(|s| s.acquisition_date)
            .collect()
    }
}

impl FromIterator<SceneRecord> for Inventory {
    fn from_iter<I: IntoIterator<Item = SceneRecord>>(iter: I) -> Self {
        let mut inventory = Inventory::new();
        for scene in iter {
            inventory.insert(scene);
        }
        inventory
    }
}

/// Per relative orbit breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitSummary {
    pub relative_orbit: u32,
    pub scenes: usize,
    pub dates: BTreeSet<NaiveDate>,
    pub platforms: BTreeSet<Platform>,
    pub flight_direction: Option<String>,
}

/// Read-only aggregate view of an inventory
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySummary {
    pub total_scenes: usize,
    pub by_orbit: BTreeMap<u32, OrbitSummary>,
    pub by_date: BTreeMap<NaiveDate, usize>,
    pub extent: Option<BoundingBox>,
}

impl InventorySummary {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.by_date.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.by_date.keys().next_back().copied()
    }
}

impl std::fmt::Display for InventorySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scenes: {}", self.total_scenes)?;
        if let (Some(first), Some(last)) = (self.first_date(), self.last_date()) {
            writeln!(f, "Date range: {} to {} ({} dates)", first, last, self.by_date.len())?;
        }
        if let Some(extent) = &self.extent {
            writeln!(f, "Extent (S N W E): {}", extent)?;
        }
        for orbit in self.by_orbit.values() {
            let platforms: Vec<&str> = orbit.platforms.iter().map(|p| p.tag()).collect();
            writeln!(
                f,
                "Orbit {:>3}: {:>4} scenes on {:>3} dates [{}] {}",
                orbit.relative_orbit,
                orbit.scenes,
                orbit.dates.len(),
                platforms.join(","),
                orbit.flight_direction.as_deref().unwrap_or("UNKNOWN"),
            )?;
        }
        Ok(())
    }
}

/// Union, summary and persistence operations over inventories
pub struct InventoryMerger;

impl InventoryMerger {
    /// Union of result sets deduplicated by identifier.
    /// Later sets overwrite metadata of earlier ones; positions stay where first seen.
    pub fn merge<I, S>(result_sets: I) -> Inventory
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = SceneRecord>,
    {
        let mut inventory = Inventory::new();
        let mut replaced = 0usize;

        for set in result_sets {
            for scene in set {
                if inventory.insert(scene).is_some() {
                    replaced += 1;
                }
            }
        }

        log::info!("Merged inventory: {} scenes ({} duplicates collapsed)", inventory.len(), replaced);
        inventory
    }

    pub fn summarize(inventory: &Inventory) -> InventorySummary {
        let mut by_orbit: BTreeMap<u32, OrbitSummary> = BTreeMap::new();
        let mut by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut extent: Option<BoundingBox> = None;

        for scene in inventory.iter() {
            let entry = by_orbit.entry(scene.relative_orbit).or_insert_with(|| OrbitSummary {
                relative_orbit: scene.relative_orbit,
                scenes: 0,
                dates: BTreeSet::new(),
                platforms: BTreeSet::new(),
                flight_direction: None,
            });
            entry.scenes += 1;
            entry.dates.insert(scene.acquisition_date);
            entry.platforms.insert(scene.platform);
            if entry.flight_direction.is_none() {
                entry.flight_direction = scene.flight_direction.clone();
            }

            *by_date.entry(scene.acquisition_date).or_insert(0) += 1;

            if let Some(env) = scene.footprint.envelope() {
                extent = Some(extent.map_or(env, |acc| acc.union(&env)));
            }
        }

        InventorySummary {
            total_scenes: inventory.len(),
            by_orbit,
            by_date,
            extent,
        }
    }

    /// Write the inventory as a GeoJSON FeatureCollection.
    /// The file is replaced atomically so concurrent readers never see a partial write.
    pub fn persist<P: AsRef<Path>>(inventory: &Inventory, path: P) -> PrepResult<()> {
        let path = path.as_ref();
        let collection = FeatureCollection::from_scenes(inventory.iter());
        let json = serde_json::to_string_pretty(&collection)?;
        write_atomic(path, json.as_bytes())?;
        log::info!("Saved inventory of {} scenes to {}", inventory.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PrepResult<Inventory> {
        let path = path.as_ref();
        log::info!("Loading inventory from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let collection: FeatureCollection = serde_json::from_str(&content)?;
        if collection.kind != "FeatureCollection" {
            return Err(PrepError::InvalidFormat(format!(
                "{} is a {}, expected FeatureCollection", path.display(), collection.kind
            )));
        }

        let inventory: Inventory = collection
            .features
            .into_iter()
            .map(Feature::into_scene)
            .collect::<PrepResult<Vec<_>>>()?
            .into_iter()
            .collect();
        log::info!("Loaded {} scenes", inventory.len());
        Ok(inventory)
    }

    /// One GeoJSON per (relative orbit, date) under `<root>/<orbit>/<YYYYMMDD>.geojson`.
    /// Derived output; safe to delete and regenerate.
    pub fn export_footprints<P: AsRef<Path>>(inventory: &Inventory, root: P) -> PrepResult<Vec<PathBuf>> {
        let mut groups: BTreeMap<(u32, NaiveDate), Vec<&SceneRecord>> = BTreeMap::new();
        for scene in inventory.iter() {
            groups.entry((scene.relative_orbit, scene.acquisition_date)).or_default().push(scene);
        }

        let mut written = Vec::with_capacity(groups.len());
        for ((orbit, date), scenes) in groups {
            let dir = root.as_ref().join(orbit.to_string());
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.geojson", date.format("%Y%m%d")));
            let collection = FeatureCollection::from_scenes(scenes.into_iter());
            std::fs::write(&path, serde_json::to_string_pretty(&collection)?)?;
            log::debug!("Wrote footprint {}", path.display());
            written.push(path);
        }

        log::info!("Exported {} footprint files under {}", written.len(), root.as_ref().display());
        Ok(written)
    }
}

/// Write to a sibling temp file then rename over the target
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> PrepResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| PrepError::Io(e.error))?;
    Ok(())
}

// GeoJSON on-disk layout

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

impl FeatureCollection {
    fn from_scenes<'a>(scenes: impl Iterator<Item = &'a SceneRecord>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: scenes.map(Feature::from_scene).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    geometry: FootprintGeometry,
    properties: SceneProperties,
}

/// Single-part footprints stay `Polygon`; split ones become `MultiPolygon`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum FootprintGeometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl FootprintGeometry {
    fn from_footprint(footprint: &Footprint) -> Self {
        match footprint.parts.as_slice() {
            [ring] => FootprintGeometry::Polygon(vec![ring.clone()]),
            parts => FootprintGeometry::MultiPolygon(parts.iter().map(|ring| vec![ring.clone()]).collect()),
        }
    }

    fn into_footprint(self) -> Footprint {
        let parts = match self {
            FootprintGeometry::Polygon(rings) => rings.into_iter().take(1).collect(),
            FootprintGeometry::MultiPolygon(polygons) => {
                polygons.into_iter().filter_map(|rings| rings.into_iter().next()).collect()
            }
        };
        Footprint::from_parts(parts)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneProperties {
    granule_name: String,
    platform: Platform,
    date_stamp: NaiveDate,
    start_time: NaiveDateTime,
    relative_orbit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    absolute_orbit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flight_direction: Option<String>,
    download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    browse_url: Option<String>,
}

impl Feature {
    fn from_scene(scene: &SceneRecord) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: FootprintGeometry::from_footprint(&scene.footprint),
            properties: SceneProperties {
                granule_name: scene.identifier.clone(),
                platform: scene.platform,
                date_stamp: scene.acquisition_date,
                start_time: scene.start_time,
                relative_orbit: scene.relative_orbit,
                absolute_orbit: scene.absolute_orbit,
                frame_number: scene.frame_number,
                flight_direction: scene.flight_direction.clone(),
                download_url: scene.download_url.clone(),
                browse_url: scene.browse_url.clone(),
            },
        }
    }

    fn into_scene(self) -> PrepResult<SceneRecord> {
        let footprint = self.geometry.into_footprint();
        if footprint.parts.is_empty() {
            return Err(PrepError::InvalidGeometry(format!(
                "{} has an empty footprint", self.properties.granule_name
            )));
        }

        let p = self.properties;
        Ok(SceneRecord {
            identifier: p.granule_name,
            platform: p.platform,
            acquisition_date: p.date_stamp,
            start_time: p.start_time,
            relative_orbit: p.relative_orbit,
            absolute_orbit: p.absolute_orbit,
            frame_number: p.frame_number,
            flight_direction: p.flight_direction,
            footprint,
            download_url: p.download_url,
            browse_url: p.browse_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scene(name: &str, platform: Platform, date: &str, orbit: u32) -> SceneRecord {
        let start = NaiveDateTime::parse_from_str(&format!("{}T135920", date), "%Y%m%dT%H%M%S").unwrap();
        SceneRecord {
            identifier: name.to_string(),
            platform,
            acquisition_date: start.date(),
            start_time: start,
            relative_orbit: orbit,
            absolute_orbit: Some(3504),
            frame_number: None,
            flight_direction: Some("ASCENDING".to_string()),
            footprint: Footprint::new(vec![[-121.0, 46.0], [-120.0, 46.0], [-120.0, 47.0], [-121.0, 47.0], [-121.0, 46.0]]),
            download_url: format!("https://datapool.asf.alaska.edu/SLC/{}/{}.zip", platform, name),
            browse_url: None,
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = vec![scene("A1", Platform::SA, "20141106", 64), scene("A2", Platform::SA, "20141130", 64)];
        let once = InventoryMerger::merge([a.clone()]);
        let twice = InventoryMerger::merge([a.clone(), a]);
        assert_eq!(once.identifiers(), twice.identifiers());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_last_write_wins_keeps_position() {
        let first = vec![scene("A1", Platform::SA, "20141106", 64), scene("A2", Platform::SA, "20141130", 64)];
        let mut updated = scene("A1", Platform::SA, "20141106", 64);
        updated.download_url = "https://mirror.example/A1.zip".to_string();

        let inventory = InventoryMerger::merge([first, vec![updated]]);
        assert_eq!(inventory.len(), 2);
        let order: Vec<&str> = inventory.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(order, vec!["A1", "A2"]);
        assert_eq!(inventory.get("A1").unwrap().download_url, "https://mirror.example/A1.zip");
    }

    #[test]
    fn test_summary_counts() {
        let inventory = InventoryMerger::merge([
            vec![scene("A1", Platform::SA, "20141106", 64), scene("A2", Platform::SA, "20141106", 64)],
            vec![scene("B1", Platform::SB, "20141130", 64), scene("B2", Platform::SB, "20141201", 137)],
        ]);
        let summary = InventoryMerger::summarize(&inventory);
        assert_eq!(summary.total_scenes, 4);
        assert_eq!(summary.by_orbit[&64].scenes, 3);
        assert_eq!(summary.by_orbit[&64].dates.len(), 2);
        assert_eq!(summary.by_orbit[&64].platforms.len(), 2);
        assert_eq!(summary.by_orbit[&137].scenes, 1);
        assert_eq!(summary.by_date.len(), 3);
        assert_eq!(summary.first_date().unwrap().to_string(), "2014-11-06");
        assert_eq!(summary.extent.unwrap(), BoundingBox::new(46.0, 47.0, -121.0, -120.0).unwrap());
        assert!(summary.to_string().contains("Orbit  64"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = InventoryMerger::summarize(&Inventory::new());
        assert_eq!(summary.total_scenes, 0);
        assert!(summary.extent.is_none());
        assert!(summary.first_date().is_none());
    }

    #[test]
    fn test_load_rejects_non_collection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.geojson");
        std::fs::write(&path, r#"{"type": "Feature", "features": []}"#).unwrap();
        assert!(matches!(InventoryMerger::load(&path), Err(PrepError::InvalidFormat(_))));
    }

    #[test]
    fn test_export_footprints_layout() {
        let dir = TempDir::new().unwrap();
        let inventory = InventoryMerger::merge([vec![
            scene("A1", Platform::SA, "20141106", 64),
            scene("A2", Platform::SA, "20141106", 64),
            scene("B1", Platform::SB, "20141130", 137),
        ]]);
        let written = InventoryMerger::export_footprints(&inventory, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("64").join("20141106.geojson").exists());
        assert!(dir.path().join("137").join("20141130.geojson").exists());

        let group = InventoryMerger::load(dir.path().join("64").join("20141106.geojson")).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_split_footprint_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.geojson");
        let mut split = scene("A1", Platform::SA, "20141106", 64);
        split.footprint = Footprint::from_parts(vec![
            vec![[179.5, 50.0], [180.0, 50.0], [180.0, 51.0], [179.5, 50.0]],
            vec![[-180.0, 50.0], [-179.2, 50.0], [-179.2, 51.0], [-180.0, 50.0]],
        ]);
        let inventory = InventoryMerger::merge([vec![split.clone(), scene("A2", Platform::SA, "20141130", 64)]]);

        InventoryMerger::persist(&inventory, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("MultiPolygon"));
        assert!(content.contains("\"Polygon\""));

        let reloaded = InventoryMerger::load(&path).unwrap();
        assert_eq!(reloaded.get("A1").unwrap().footprint, split.footprint);
        assert_eq!(reloaded, inventory);
    }
}
