use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use tempfile::TempDir;
use topsprep::{Footprint, Inventory, InventoryMerger, Platform, SceneRecord};

fn scene(name: &str, platform: Platform, start: &str, orbit: u32) -> SceneRecord {
    let start = NaiveDateTime::parse_from_str(start, "%Y%m%dT%H%M%S").expect("valid start time");
    SceneRecord {
        identifier: name.to_string(),
        platform,
        acquisition_date: start.date(),
        start_time: start,
        relative_orbit: orbit,
        absolute_orbit: Some(3504),
        frame_number: Some(144),
        flight_direction: Some("ASCENDING".to_string()),
        footprint: Footprint::from_wkt(
            "POLYGON((-119.5 45.9,-122.8 46.3,-122.4 48.1,-119.1 47.7,-119.5 45.9))",
        )
        .expect("valid footprint"),
        download_url: format!("https://datapool.asf.alaska.edu/SLC/{}.zip", name),
        browse_url: Some(format!("https://datapool.asf.alaska.edu/BROWSE/{}.jpg", name)),
    }
}

fn batch_a() -> Vec<SceneRecord> {
    vec![
        scene("S1A_A", Platform::SA, "20141106T135920", 64),
        scene("S1A_B", Platform::SA, "20141130T135920", 64),
        scene("S1A_C", Platform::SA, "20141201T015500", 137),
    ]
}

fn batch_b() -> Vec<SceneRecord> {
    vec![
        scene("S1B_A", Platform::SB, "20161106T135920", 64),
        scene("S1B_B", Platform::SB, "20161118T135920", 64),
    ]
}

#[test]
fn test_disjoint_merge_size_is_sum() {
    let merged = InventoryMerger::merge([batch_a(), batch_b()]);
    assert_eq!(merged.len(), batch_a().len() + batch_b().len());
}

#[test]
fn test_overlapping_merge_has_no_duplicates() {
    let mut overlapping = batch_b();
    overlapping.push(scene("S1A_B", Platform::SA, "20141130T135920", 64));

    let merged = InventoryMerger::merge([batch_a(), overlapping.clone()]);
    assert!(merged.len() <= batch_a().len() + overlapping.len());
    assert_eq!(merged.len(), 5);

    let ids: Vec<&str> = merged.iter().map(|s| s.identifier.as_str()).collect();
    let unique: BTreeSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
}

#[test]
fn test_merge_with_self_is_identity() {
    let inventory: Inventory = batch_a().into_iter().collect();
    let merged = InventoryMerger::merge([batch_a(), batch_a()]);
    assert_eq!(merged.identifiers(), inventory.identifiers());
}

#[test]
fn test_persist_then_load_is_lossless() {
    let tmp = TempDir::new().expect("Failed to create temp directory");
    let path = tmp.path().join("query.geojson");

    let inventory = InventoryMerger::merge([batch_a(), batch_b()]);
    InventoryMerger::persist(&inventory, &path).expect("Failed to persist inventory");
    let loaded = InventoryMerger::load(&path).expect("Failed to load inventory");

    assert_eq!(loaded.len(), inventory.len());
    for original in inventory.iter() {
        let restored = loaded.get(&original.identifier).expect("scene survives round trip");
        assert_eq!(restored, original);
    }
    let order: Vec<&str> = loaded.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(order, vec!["S1A_A", "S1A_B", "S1A_C", "S1B_A", "S1B_B"]);
}

#[test]
fn test_persist_replaces_existing_file() {
    let tmp = TempDir::new().expect("Failed to create temp directory");
    let path = tmp.path().join("query.geojson");

    InventoryMerger::persist(&InventoryMerger::merge([batch_a()]), &path).unwrap();
    InventoryMerger::persist(&InventoryMerger::merge([batch_b()]), &path).unwrap();

    let loaded = InventoryMerger::load(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn test_summary_by_orbit() {
    let inventory = InventoryMerger::merge([batch_a(), batch_b()]);
    let summary = InventoryMerger::summarize(&inventory);
    println!("{}", summary);

    assert_eq!(summary.total_scenes, 5);
    assert_eq!(summary.by_orbit[&64].scenes, 4);
    assert_eq!(summary.by_orbit[&64].platforms.len(), 2);
    assert_eq!(summary.by_orbit[&137].dates.len(), 1);
    assert_eq!(summary.first_date().unwrap().to_string(), "2014-11-06");
    assert_eq!(summary.last_date().unwrap().to_string(), "2016-11-18");
}
