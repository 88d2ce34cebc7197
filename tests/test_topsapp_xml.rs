use std::io::Write;
use tempfile::NamedTempFile;
use topsprep::core::topsapp::{
    KEY_DEM, KEY_GEOCODE_BOX, KEY_RANGE_LOOKS, KEY_REFERENCE, KEY_SAFE, KEY_SWATHS, TOP_COMPONENT,
};
use topsprep::core::{ConfigNode, TopsOverrides};
use topsprep::{BoundingBox, ConfigDocument, ConfigDocumentBuilder, OrbitMode, PrepError};

fn overrides(reference: &[&str], secondary: &[&str]) -> TopsOverrides {
    TopsOverrides {
        reference_scenes: Some(reference.iter().map(|s| s.to_string()).collect()),
        secondary_scenes: Some(secondary.iter().map(|s| s.to_string()).collect()),
        reference_dir: Some("referencedir".to_string()),
        secondary_dir: Some("secondarydir".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_two_scene_reference_round_trip() {
    let doc = ConfigDocumentBuilder::build(
        ConfigDocument::default(),
        &overrides(&["first.zip", "second.zip"], &["third.zip"]),
    )
    .unwrap();
    let xml = doc.to_xml().unwrap();
    println!("{}", xml);

    let reference_lines: Vec<&str> = xml
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with(r#"<property name="safe">"#))
        .collect();
    assert_eq!(
        reference_lines,
        vec![
            r#"<property name="safe">first.zip</property>"#,
            r#"<property name="safe">second.zip</property>"#,
            r#"<property name="safe">third.zip</property>"#,
        ]
    );

    let parsed = ConfigDocument::from_xml(&xml).unwrap();
    assert_eq!(
        parsed.get(&[TOP_COMPONENT, KEY_REFERENCE, KEY_SAFE]),
        Some(&ConfigNode::list(["first.zip", "second.zip"]))
    );
}

// A one-element list reads back as a scalar with the same values
#[test]
fn test_single_scene_reads_back_as_scalar() {
    let doc = ConfigDocumentBuilder::build(ConfigDocument::default(), &overrides(&["only.zip"], &["other.zip"]))
        .unwrap();
    let parsed = ConfigDocument::from_xml(&doc.to_xml().unwrap()).unwrap();
    let node = parsed.get(&[TOP_COMPONENT, KEY_REFERENCE, KEY_SAFE]).unwrap();
    assert_eq!(node, &ConfigNode::scalar("only.zip"));
    assert_eq!(node.values(), vec!["only.zip"]);
}

#[test]
fn test_template_file_with_overrides() {
    let mut template = NamedTempFile::new().unwrap();
    write!(
        template,
        "topsinsar:\n  sensorname: SENTINEL1\n  rangelooks: 19\n  demfilename: /data/template_dem.wgs84\n  reference:\n    safe: ''\n  secondary:\n    safe: ''\n"
    )
    .unwrap();

    let base = ConfigDocument::from_yaml_file(template.path()).unwrap();
    let mut ov = overrides(&["a.zip"], &["b.zip"]);
    ov.swaths = Some(vec![2, 3]);
    ov.geocode_bbox = Some(BoundingBox::new(46.0, 47.0, -121.0, -120.0).unwrap());
    ov.orbit_mode = Some(OrbitMode::Header);

    let doc = ConfigDocumentBuilder::build(base, &ov).unwrap();
    let parsed = ConfigDocument::from_xml(&doc.to_xml().unwrap()).unwrap();

    assert_eq!(parsed.get(&[TOP_COMPONENT, KEY_RANGE_LOOKS]), Some(&ConfigNode::scalar("19")));
    assert_eq!(parsed.get(&[TOP_COMPONENT, KEY_DEM]), Some(&ConfigNode::scalar("/data/template_dem.wgs84")));
    assert_eq!(parsed.get(&[TOP_COMPONENT, KEY_SWATHS]), Some(&ConfigNode::list(["2", "3"])));
    assert_eq!(
        parsed.get(&[TOP_COMPONENT, KEY_GEOCODE_BOX]).unwrap().values(),
        vec!["46", "47", "-121", "-120"]
    );
}

#[test]
fn test_missing_secondary_scenes_fails_serialization() {
    let mut ov = overrides(&["a.zip"], &[]);
    ov.secondary_scenes = None;
    let doc = ConfigDocumentBuilder::build(ConfigDocument::default(), &ov).unwrap();
    match doc.to_xml() {
        Err(PrepError::MissingRequiredField(field)) => assert_eq!(field, "topsinsar.secondary.safe"),
        other => panic!("Expected MissingRequiredField, got {:?}", other),
    }
}

#[test]
fn test_missing_sensor_name_fails_serialization() {
    let base = ConfigDocument::from_yaml_str("topsinsar:\n  reference:\n    safe: ''\n").unwrap();
    let doc = ConfigDocumentBuilder::build(base, &overrides(&["a.zip"], &["b.zip"])).unwrap();
    assert!(matches!(doc.to_xml(), Err(PrepError::MissingRequiredField(f)) if f == "topsinsar.sensorname"));
}
