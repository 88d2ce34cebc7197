use approx::assert_relative_eq;
use tempfile::TempDir;
use topsprep::{BoundingBox, PrepError, Region, RegionResolver};

const MULTI: &str = r#"{
    "type": "Feature",
    "properties": {"name": "two lobes"},
    "geometry": {
        "type": "MultiPolygon",
        "coordinates": [
            [[[-120.6, 46.4], [-120.5, 46.4], [-120.5, 46.5], [-120.6, 46.4]]],
            [[[-120.45, 46.5], [-120.4, 46.5], [-120.4, 46.6], [-120.45, 46.5]]]
        ]
    }
}"#;

#[test]
fn test_multipolygon_envelope_with_buffer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lobes.geojson");
    std::fs::write(&path, MULTI).unwrap();

    let plain = RegionResolver::resolve(&Region::VectorFile { path: path.clone(), buffer: None }).unwrap();
    let buffered = RegionResolver::resolve(&Region::VectorFile { path, buffer: Some(0.25) }).unwrap();

    assert_relative_eq!(plain.south, 46.4, epsilon = 1e-12);
    assert_relative_eq!(plain.east, -120.4, epsilon = 1e-12);
    assert_relative_eq!(buffered.south, plain.south - 0.25, epsilon = 1e-12);
    assert_relative_eq!(buffered.north, plain.north + 0.25, epsilon = 1e-12);
    assert_relative_eq!(buffered.west, plain.west - 0.25, epsilon = 1e-12);
    assert_relative_eq!(buffered.east, plain.east + 0.25, epsilon = 1e-12);
}

#[test]
fn test_literal_bounds_are_validated() {
    let ok = Region::Bounds(BoundingBox { south: 46.4, north: 46.6, west: -120.6, east: -120.4 });
    assert!(RegionResolver::resolve(&ok).is_ok());

    let inverted = Region::Bounds(BoundingBox { south: 46.6, north: 46.4, west: -120.6, east: -120.4 });
    assert!(matches!(RegionResolver::resolve(&inverted), Err(PrepError::InvalidRegion(_))));
}

#[test]
fn test_missing_vector_file() {
    let region = Region::VectorFile { path: "/nonexistent/roi.geojson".into(), buffer: None };
    assert!(matches!(RegionResolver::resolve(&region), Err(PrepError::InvalidGeometry(_))));

    let region = Region::VectorFile { path: "/nonexistent/roi.shp".into(), buffer: None };
    assert!(matches!(RegionResolver::resolve(&region), Err(PrepError::InvalidGeometry(_))));
}
