use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wkt::Wkt;

/// Sentinel-1 platform tags understood by the ASF catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    /// Sentinel-1A
    #[serde(rename = "SA")]
    SA,
    /// Sentinel-1B
    #[serde(rename = "SB")]
    SB,
}

impl Platform {
    /// Both units of the mission, in query order
    pub const ALL: [Platform; 2] = [Platform::SA, Platform::SB];

    /// Catalog tag used in query parameters and output filenames
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::SA => "SA",
            Platform::SB => "SB",
        }
    }

    /// Mission prefix used in granule and orbit file names
    pub fn mission_id(&self) -> &'static str {
        match self {
            Platform::SA => "S1A",
            Platform::SB => "S1B",
        }
    }

    /// Parse a catalog tag, mission id or platform name ("Sentinel-1A")
    pub fn parse(value: &str) -> PrepResult<Self> {
        match value.trim().to_uppercase().as_str() {
            "SA" | "S1A" | "SENTINEL-1A" => Ok(Platform::SA),
            "SB" | "S1B" | "SENTINEL-1B" => Ok(Platform::SB),
            other => Err(PrepError::InvalidFormat(format!("Unknown platform: {}", other))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for Platform {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::parse(s)
    }
}

/// Geographic bounding box in degrees, ordered the way ISCE expects (S, N, W, E)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build a box and check south < north, west < east
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> PrepResult<Self> {
        let bbox = Self { south, north, west, east };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Build from an `[S, N, W, E]` slice as given on the command line
    pub fn from_snwe(snwe: &[f64]) -> PrepResult<Self> {
        match snwe {
            [s, n, w, e] => Self::new(*s, *n, *w, *e),
            _ => Err(PrepError::InvalidRegion(format!(
                "Expected 4 values (S N W E), got {}", snwe.len()
            ))),
        }
    }

    pub fn validate(&self) -> PrepResult<()> {
        let values = [self.south, self.north, self.west, self.east];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PrepError::InvalidRegion(format!("Non-finite bounds: {}", self)));
        }
        if self.south >= self.north {
            return Err(PrepError::InvalidRegion(format!(
                "South ({}) must be less than north ({})", self.south, self.north
            )));
        }
        if self.west >= self.east {
            return Err(PrepError::InvalidRegion(format!(
                "West ({}) must be less than east ({})", self.west, self.east
            )));
        }
        Ok(())
    }

    pub fn to_snwe(&self) -> [f64; 4] {
        [self.south, self.north, self.west, self.east]
    }

    /// Closed WKT polygon, counter-clockwise from the south-west corner
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({w} {s},{e} {s},{e} {n},{w} {n},{w} {s}))",
            s = self.south, n = self.north, w = self.west, e = self.east
        )
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            south: self.south.min(other.south),
            north: self.north.max(other.north),
            west: self.west.min(other.west),
            east: self.east.max(other.east),
        }
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.south <= other.south
            && self.north >= other.north
            && self.west <= other.west
            && self.east >= other.east
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.south, self.north, self.west, self.east)
    }
}

/// Scene footprint: the closed exterior ring of each polygon part, as (lon, lat)
/// vertices. Granules crossing the antimeridian arrive as two parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub parts: Vec<Vec<[f64; 2]>>,
}

impl Footprint {
    /// Single-part footprint
    pub fn new(ring: Vec<[f64; 2]>) -> Self {
        Self { parts: vec![ring] }
    }

    pub fn from_parts(parts: Vec<Vec<[f64; 2]>>) -> Self {
        Self { parts }
    }

    /// Parse a WKT `POLYGON` or `MULTIPOLYGON` as returned by the catalog.
    /// Holes are dropped; only the exterior ring of each part is kept.
    pub fn from_wkt(text: &str) -> PrepResult<Self> {
        let geometry = Wkt::<f64>::from_str(text.trim())
            .map_err(|e| PrepError::InvalidGeometry(format!("Bad WKT '{}': {}", text, e)))?;

        let polygons = match geometry {
            Wkt::Polygon(polygon) => vec![polygon],
            Wkt::MultiPolygon(multi) => multi.0,
            _ => {
                return Err(PrepError::InvalidGeometry(format!(
                    "Expected POLYGON or MULTIPOLYGON: {}", text
                )))
            }
        };

        let parts = polygons
            .into_iter()
            .map(|polygon| {
                let exterior = polygon.0.into_iter().next().ok_or_else(|| {
                    PrepError::InvalidGeometry(format!("Empty polygon in {}", text))
                })?;
                close_ring(exterior.0.iter().map(|c| [c.x, c.y]).collect())
            })
            .collect::<PrepResult<Vec<_>>>()?;

        if parts.is_empty() {
            return Err(PrepError::InvalidGeometry(format!("Empty geometry: {}", text)));
        }
        Ok(Self { parts })
    }

    /// Envelope over every part, `None` when there are no vertices
    pub fn envelope(&self) -> Option<BoundingBox> {
        let mut vertices = self.parts.iter().flatten();
        let first = vertices.next()?;
        let init = BoundingBox { south: first[1], north: first[1], west: first[0], east: first[0] };
        Some(vertices.fold(init, |acc, [lon, lat]| BoundingBox {
            south: acc.south.min(*lat),
            north: acc.north.max(*lat),
            west: acc.west.min(*lon),
            east: acc.east.max(*lon),
        }))
    }
}

fn close_ring(mut ring: Vec<[f64; 2]>) -> PrepResult<Vec<[f64; 2]>> {
    if ring.len() < 3 {
        return Err(PrepError::InvalidGeometry(format!(
            "Polygon needs at least 3 vertices, got {}", ring.len()
        )));
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    Ok(ring)
}

/// One catalog granule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Granule name, unique across the catalog
    pub identifier: String,
    pub platform: Platform,
    pub acquisition_date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub relative_orbit: u32,
    pub absolute_orbit: Option<u32>,
    pub frame_number: Option<u32>,
    pub flight_direction: Option<String>,
    pub footprint: Footprint,
    pub download_url: String,
    pub browse_url: Option<String>,
}

/// How topsApp should obtain orbit state vectors for a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitMode {
    /// Precise orbit files are listed in the manifest and read from the pair directory
    Precise,
    /// Orbit from the SAFE annotation headers
    Header,
}

/// Error types for inventory and pair preparation
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("No scenes for date {date} on relative orbit {orbit}; re-query the catalog")]
    SceneNotFound { date: NaiveDate, orbit: u32 },

    #[error("Precise orbit unavailable: {0}")]
    OrbitUnavailable(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Result type for preparation operations
pub type PrepResult<T> = Result<T, PrepError>;

/// Parse a date given as `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_date(value: &str) -> PrepResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|e| PrepError::InvalidFormat(format!("Invalid date '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_validation() {
        assert!(BoundingBox::new(46.4, 46.6, -120.6, -120.4).is_ok());
        assert!(matches!(
            BoundingBox::new(46.6, 46.4, -120.6, -120.4),
            Err(PrepError::InvalidRegion(_))
        ));
        assert!(matches!(
            BoundingBox::new(46.4, 46.6, -120.4, -120.6),
            Err(PrepError::InvalidRegion(_))
        ));
        assert!(BoundingBox::from_snwe(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_bbox_wkt() {
        let bbox = BoundingBox::new(46.4, 46.6, -120.6, -120.4).unwrap();
        assert_eq!(
            bbox.to_wkt(),
            "POLYGON((-120.6 46.4,-120.4 46.4,-120.4 46.6,-120.6 46.6,-120.6 46.4))"
        );
    }

    #[test]
    fn test_footprint_from_wkt() {
        let fp = Footprint::from_wkt(
            "POLYGON((-119.5 45.9,-122.8 46.3,-122.4 48.1,-119.1 47.7,-119.5 45.9))",
        )
        .unwrap();
        assert_eq!(fp.parts.len(), 1);
        assert_eq!(fp.parts[0].len(), 5);
        let env = fp.envelope().unwrap();
        assert_eq!(env.south, 45.9);
        assert_eq!(env.north, 48.1);
        assert_eq!(env.west, -122.8);
        assert_eq!(env.east, -119.1);
    }

    #[test]
    fn test_footprint_closes_open_ring() {
        let fp = Footprint::from_wkt("POLYGON ((0 0, 1 0, 1 1))").unwrap();
        assert_eq!(fp.parts[0].first(), fp.parts[0].last());
        assert!(Footprint::from_wkt("LINESTRING(0 0, 1 1)").is_err());
        assert!(Footprint::from_wkt("POLYGON((0 0, 1 1))").is_err());
    }

    #[test]
    fn test_footprint_multipolygon_envelope_is_union() {
        let fp = Footprint::from_wkt(
            "MULTIPOLYGON(((179.5 50,180 50,180 51,179.5 51,179.5 50)),((-180 50,-179.2 50,-179.2 51,-180 51,-180 50)))",
        )
        .unwrap();
        assert_eq!(fp.parts.len(), 2);
        let env = fp.envelope().unwrap();
        assert_eq!(env.west, -180.0);
        assert_eq!(env.east, 180.0);
        assert_eq!(env.south, 50.0);
        assert_eq!(env.north, 51.0);
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!(Platform::parse("Sentinel-1A").unwrap(), Platform::SA);
        assert_eq!(Platform::parse("sb").unwrap(), Platform::SB);
        assert!(Platform::parse("Sentinel-2A").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2014, 11, 30).unwrap();
        assert_eq!(parse_date("20141130").unwrap(), d);
        assert_eq!(parse_date("2014-11-30").unwrap(), d);
        assert!(parse_date("30/11/2014").is_err());
    }
}
