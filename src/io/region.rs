//! Region-of-interest resolution: literal S/N/W/E boxes or polygon vector files.
//!
//! GeoJSON is always read. Other OGR formats (Shapefile, KML, GeoPackage, ...)
//! go through GDAL when the crate is built with the `ogr` feature.

use crate::types::{BoundingBox, PrepError, PrepResult};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Region descriptor as accepted on the command line
#[derive(Debug, Clone)]
pub enum Region {
    Bounds(BoundingBox),
    VectorFile { path: PathBuf, buffer: Option<f64> },
}

/// Converts region descriptors into bounding boxes
pub struct RegionResolver;

fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("geojson"))
}

impl RegionResolver {
    pub fn resolve(region: &Region) -> PrepResult<BoundingBox> {
        match region {
            Region::Bounds(bbox) => {
                bbox.validate()?;
                Ok(*bbox)
            }
            Region::VectorFile { path, buffer } => Self::from_vector_file(path, *buffer),
        }
    }

    /// Envelope of every polygon in a vector file, grown by `buffer` degrees.
    /// A file that is missing, unreadable or holds no polygons is `InvalidGeometry`.
    pub fn from_vector_file<P: AsRef<Path>>(path: P, buffer: Option<f64>) -> PrepResult<BoundingBox> {
        let path = path.as_ref();
        log::info!("Reading region of interest from {}", path.display());

        let envelope = if is_geojson(path) {
            Self::geojson_envelope(path)?
        } else {
            Self::ogr_envelope(path)?
        }
        .ok_or_else(|| {
            PrepError::InvalidGeometry(format!("No polygon features in {}", path.display()))
        })?;
        log::debug!("Polygon envelope: {}", envelope);

        let bbox = match buffer {
            Some(amount) => Self::apply_buffer(&envelope, amount)?,
            None => envelope,
        };
        bbox.validate()?;
        log::info!("Region of interest (S N W E): {}", bbox);
        Ok(bbox)
    }

    fn geojson_envelope(path: &Path) -> PrepResult<Option<BoundingBox>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PrepError::InvalidGeometry(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let geojson: Value = serde_json::from_str(&content).map_err(|e| {
            PrepError::InvalidGeometry(format!("Cannot parse {} as GeoJSON: {}", path.display(), e))
        })?;
        Self::polygon_envelope(&geojson)
    }

    /// Union of polygon envelopes across every layer of an OGR dataset
    #[cfg(feature = "ogr")]
    fn ogr_envelope(path: &Path) -> PrepResult<Option<BoundingBox>> {
        use gdal::vector::LayerAccess;

        let dataset = gdal::Dataset::open(path).map_err(|e| {
            PrepError::InvalidGeometry(format!("Cannot open {}: {}", path.display(), e))
        })?;

        let mut envelope: Option<BoundingBox> = None;
        for mut layer in dataset.layers() {
            log::debug!("Reading layer {}", layer.name());
            for feature in layer.features() {
                let Some(geometry) = feature.geometry() else { continue };
                if !geometry.geometry_name().to_uppercase().contains("POLYGON") {
                    continue;
                }
                let env = geometry.envelope();
                let part = BoundingBox { south: env.MinY, north: env.MaxY, west: env.MinX, east: env.MaxX };
                envelope = Some(envelope.map_or(part, |acc| acc.union(&part)));
            }
        }
        Ok(envelope)
    }

    #[cfg(not(feature = "ogr"))]
    fn ogr_envelope(path: &Path) -> PrepResult<Option<BoundingBox>> {
        if !path.exists() {
            return Err(PrepError::InvalidGeometry(format!("Cannot read {}: file not found", path.display())));
        }
        // Plenty of GeoJSON files carry a plain .json or no extension at all
        Self::geojson_envelope(path).map_err(|_| {
            PrepError::InvalidGeometry(format!(
                "{} is not GeoJSON; other vector formats need the `ogr` feature",
                path.display()
            ))
        })
    }

    /// Expand a box by `amount` degrees on every side, clamped to valid lat/lon
    pub fn apply_buffer(bbox: &BoundingBox, amount: f64) -> PrepResult<BoundingBox> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(PrepError::InvalidRegion(format!("Invalid buffer: {}", amount)));
        }
        let buffered = BoundingBox {
            south: (bbox.south - amount).max(-90.0),
            north: (bbox.north + amount).min(90.0),
            west: (bbox.west - amount).max(-180.0),
            east: (bbox.east + amount).min(180.0),
        };
        buffered.validate()?;
        Ok(buffered)
    }

    /// Write the resolved box as `S N W E` so a run can be reproduced
    pub fn persist<P: AsRef<Path>>(bbox: &BoundingBox, path: P) -> PrepResult<()> {
        std::fs::write(&path, format!("{}\n", bbox))?;
        log::info!("Saved region of interest to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PrepResult<BoundingBox> {
        let content = std::fs::read_to_string(&path)?;
        let values = content
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|e| PrepError::InvalidRegion(format!("Bad value '{}': {}", v, e)))
            })
            .collect::<PrepResult<Vec<f64>>>()?;
        BoundingBox::from_snwe(&values)
    }

    /// Walk FeatureCollection / Feature / geometry objects and fold polygon vertices
    fn polygon_envelope(value: &Value) -> PrepResult<Option<BoundingBox>> {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

        match kind {
            "FeatureCollection" => {
                let features = value.get("features").and_then(Value::as_array).ok_or_else(|| {
                    PrepError::InvalidGeometry("FeatureCollection without features".to_string())
                })?;
                let mut envelope: Option<BoundingBox> = None;
                for feature in features {
                    if let Some(env) = Self::polygon_envelope(feature)? {
                        envelope = Some(envelope.map_or(env, |acc| acc.union(&env)));
                    }
                }
                Ok(envelope)
            }
            "Feature" => match value.get("geometry") {
                Some(Value::Null) | None => Ok(None),
                Some(geometry) => Self::polygon_envelope(geometry),
            },
            "GeometryCollection" => {
                let mut envelope: Option<BoundingBox> = None;
                for geometry in value.get("geometries").and_then(Value::as_array).into_iter().flatten() {
                    if let Some(env) = Self::polygon_envelope(geometry)? {
                        envelope = Some(envelope.map_or(env, |acc| acc.union(&env)));
                    }
                }
                Ok(envelope)
            }
            "Polygon" | "MultiPolygon" => {
                let coords = value.get("coordinates").ok_or_else(|| {
                    PrepError::InvalidGeometry(format!("{} without coordinates", kind))
                })?;
                let mut envelope: Option<BoundingBox> = None;
                Self::fold_positions(coords, &mut envelope)?;
                Ok(envelope)
            }
            // Points and lines do not describe an area
            _ => Ok(None),
        }
    }

    fn fold_positions(coords: &Value, envelope: &mut Option<BoundingBox>) -> PrepResult<()> {
        let items = coords.as_array().ok_or_else(|| {
            PrepError::InvalidGeometry("Coordinates must be arrays".to_string())
        })?;

        // A position is an array of numbers; anything else is a nesting level
        if items.first().map_or(false, Value::is_number) {
            let lon = items.first().and_then(Value::as_f64);
            let lat = items.get(1).and_then(Value::as_f64);
            let (lon, lat) = match (lon, lat) {
                (Some(lon), Some(lat)) => (lon, lat),
                _ => return Err(PrepError::InvalidGeometry(format!("Bad position: {}", coords))),
            };
            let point = BoundingBox { south: lat, north: lat, west: lon, east: lon };
            *envelope = Some(envelope.map_or(point, |acc| acc.union(&point)));
            return Ok(());
        }

        for item in items {
            Self::fold_positions(item, envelope)?;
        }
        Ok(())
    }
}
