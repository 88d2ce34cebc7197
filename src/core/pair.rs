//! Interferometric pair preparation.
//!
//! Resolves the reference and secondary scenes of one path from a saved
//! inventory, looks up precise orbits, then writes `topsApp.xml` and the
//! download manifest into a dedicated `int-<ref>-<sec>` directory.

use crate::config::PrepConfig;
use crate::core::inventory::{write_atomic, InventoryMerger};
use crate::core::selector::{SceneSelector, SceneSource};
use crate::core::topsapp::{ConfigDocument, ConfigDocumentBuilder, TopsOverrides};
use crate::io::http::Fetch;
use crate::io::orbit::{OrbitFile, OrbitLookup, OrbitResolver};
use crate::types::{BoundingBox, OrbitMode, PrepError, PrepResult};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const REFERENCE_DIR: &str = "referencedir";
pub const SECONDARY_DIR: &str = "secondarydir";

/// Output directory of one pair. Paths are resolved against it explicitly;
/// the process working directory is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairWorkspace {
    dir: PathBuf,
}

impl PairWorkspace {
    pub fn dir_name(reference: NaiveDate, secondary: NaiveDate) -> String {
        format!("int-{}-{}", reference.format("%Y%m%d"), secondary.format("%Y%m%d"))
    }

    /// Create `<out_root>/int-<ref>-<sec>`; an existing directory is reused
    pub fn create<P: AsRef<Path>>(out_root: P, reference: NaiveDate, secondary: NaiveDate) -> PrepResult<Self> {
        let dir = out_root.as_ref().join(Self::dir_name(reference, secondary));
        std::fs::create_dir_all(&dir)?;
        log::info!("Pair directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.dir.join(name)
    }
}

/// What to do when no precise orbit covers a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrbitPolicy {
    /// Fall back to header orbits with a warning
    #[default]
    Fallback,
    /// Treat a missing precise orbit as fatal
    Strict,
    /// Do not query the orbit server at all
    HeaderOnly,
}

/// Inputs for one pair
#[derive(Debug, Clone)]
pub struct PairRequest {
    pub inventory: PathBuf,
    pub reference_date: NaiveDate,
    pub secondary_date: NaiveDate,
    pub relative_orbit: u32,
    pub template: Option<PathBuf>,
    pub swaths: Option<Vec<u8>>,
    pub dem: Option<String>,
    pub region_of_interest: Option<BoundingBox>,
    pub geocode_bbox: Option<BoundingBox>,
    pub azimuth_looks: Option<u32>,
    pub range_looks: Option<u32>,
    pub filter_strength: Option<f64>,
    pub orbit_policy: OrbitPolicy,
}

impl PairRequest {
    pub fn new<P: Into<PathBuf>>(
        inventory: P,
        reference_date: NaiveDate,
        secondary_date: NaiveDate,
        relative_orbit: u32,
    ) -> Self {
        Self {
            inventory: inventory.into(),
            reference_date,
            secondary_date,
            relative_orbit,
            template: None,
            swaths: None,
            dem: None,
            region_of_interest: None,
            geocode_bbox: None,
            azimuth_looks: None,
            range_looks: None,
            filter_strength: None,
            orbit_policy: OrbitPolicy::default(),
        }
    }

    fn validate(&self) -> PrepResult<()> {
        if self.reference_date == self.secondary_date {
            return Err(PrepError::InvalidFormat(format!(
                "Reference and secondary dates are both {}", self.reference_date
            )));
        }
        if let Some(swaths) = &self.swaths {
            if swaths.is_empty() || swaths.iter().any(|s| !(1..=3).contains(s)) {
                return Err(PrepError::InvalidFormat(format!(
                    "Sub-swaths must be between 1 and 3, got {:?}", swaths
                )));
            }
        }
        for (label, bbox) in [("region of interest", &self.region_of_interest), ("geocode box", &self.geocode_bbox)] {
            if let Some(bbox) = bbox {
                bbox.validate().map_err(|e| PrepError::InvalidRegion(format!("{}: {}", label, e)))?;
            }
        }
        Ok(())
    }
}

/// Everything written for a prepared pair
#[derive(Debug, Clone)]
pub struct PreparedPair {
    pub workspace: PairWorkspace,
    pub reference: Vec<SceneSource>,
    pub secondary: Vec<SceneSource>,
    pub orbits: Vec<OrbitFile>,
    pub orbit_mode: OrbitMode,
    pub document: ConfigDocument,
    pub topsapp_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl PreparedPair {
    /// Scene URLs followed by orbit URLs
    pub fn download_urls(&self) -> Vec<&str> {
        self.reference
            .iter()
            .chain(self.secondary.iter())
            .map(|s| s.url.as_str())
            .chain(self.orbits.iter().map(|o| o.url.as_str()))
            .collect()
    }
}

pub struct PairPreparer {
    config: PrepConfig,
    orbits: OrbitResolver,
}

impl PairPreparer {
    pub fn new(config: &PrepConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            config: config.clone(),
            orbits: OrbitResolver::new(config, fetcher),
        }
    }

    pub fn prepare<P: AsRef<Path>>(&self, request: &PairRequest, out_root: P) -> PrepResult<PreparedPair> {
        request.validate()?;

        let inventory = InventoryMerger::load(&request.inventory)?;
        let reference = SceneSelector::resolve_scenes(&inventory, request.reference_date, request.relative_orbit)?;
        let secondary = SceneSelector::resolve_scenes(&inventory, request.secondary_date, request.relative_orbit)?;

        let (orbit_mode, orbits) = self.resolve_orbits(request.orbit_policy, &reference, &secondary)?;

        let base = match &request.template {
            Some(path) => ConfigDocument::from_yaml_file(path)?,
            None => ConfigDocument::default(),
        };
        let overrides = TopsOverrides {
            reference_scenes: Some(reference.iter().map(|s| s.basename.clone()).collect()),
            secondary_scenes: Some(secondary.iter().map(|s| s.basename.clone()).collect()),
            reference_dir: Some(REFERENCE_DIR.to_string()),
            secondary_dir: Some(SECONDARY_DIR.to_string()),
            swaths: request.swaths.clone(),
            dem: request.dem.clone(),
            region_of_interest: request.region_of_interest,
            geocode_bbox: request.geocode_bbox,
            azimuth_looks: request.azimuth_looks,
            range_looks: request.range_looks,
            filter_strength: request.filter_strength,
            orbit_mode: Some(orbit_mode),
        };
        let document = ConfigDocumentBuilder::build(base, &overrides)?;
        let xml = ConfigDocumentBuilder::serialize(&document)?;

        let workspace = PairWorkspace::create(out_root, request.reference_date, request.secondary_date)?;
        let topsapp_path = workspace.join(&self.config.topsapp_file);
        let manifest_path = workspace.join(&self.config.manifest_file);

        let prepared = PreparedPair {
            workspace,
            reference,
            secondary,
            orbits,
            orbit_mode,
            document,
            topsapp_path,
            manifest_path,
        };

        write_atomic(&prepared.topsapp_path, xml.as_bytes())?;
        write_manifest(&prepared.manifest_path, &prepared.download_urls())?;
        log::info!(
            "Prepared {} ({} + {} scenes, {:?} orbits)",
            prepared.workspace.path().display(),
            prepared.reference.len(),
            prepared.secondary.len(),
            prepared.orbit_mode
        );
        Ok(prepared)
    }

    /// One listing fetch serves both dates. The first scene of each date decides,
    /// since a single orbit file spans a whole pass.
    fn resolve_orbits(
        &self,
        policy: OrbitPolicy,
        reference: &[SceneSource],
        secondary: &[SceneSource],
    ) -> PrepResult<(OrbitMode, Vec<OrbitFile>)> {
        if policy == OrbitPolicy::HeaderOnly {
            log::info!("Using orbits from SAFE annotation headers");
            return Ok((OrbitMode::Header, Vec::new()));
        }

        let catalog = self.orbits.fetch_catalog()?;
        let mut files: Vec<OrbitFile> = Vec::with_capacity(2);

        for scenes in [reference, secondary] {
            let Some(first) = scenes.first() else { continue };
            match catalog.lookup(&first.basename)? {
                OrbitLookup::Found(file) => {
                    if !files.iter().any(|f| f.url == file.url) {
                        files.push(file);
                    }
                }
                unavailable @ OrbitLookup::Unavailable(_) if policy == OrbitPolicy::Strict => {
                    unavailable.require()?;
                }
                // Header mode ignores orbit files, so one found earlier is dropped too
                OrbitLookup::Unavailable(reason) => {
                    log::warn!("Precise orbit lookup failed ({}); using header orbits", reason);
                    return Ok((OrbitMode::Header, Vec::new()));
                }
            }
        }

        Ok((OrbitMode::Precise, files))
    }
}

/// One URL per line
pub fn write_manifest<P: AsRef<Path>>(path: P, urls: &[&str]) -> PrepResult<()> {
    let mut content = urls.join("\n");
    content.push('\n');
    write_atomic(path.as_ref(), content.as_bytes())?;
    log::info!("Wrote {} download links to {}", urls.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        crate::types::parse_date(s).unwrap()
    }

    #[test]
    fn test_workspace_naming() {
        assert_eq!(
            PairWorkspace::dir_name(date("20141106"), date("20141130")),
            "int-20141106-20141130"
        );

        let tmp = tempfile::tempdir().unwrap();
        let ws = PairWorkspace::create(tmp.path(), date("20141106"), date("20141130")).unwrap();
        assert!(ws.path().is_dir());
        assert_eq!(ws.join("topsApp.xml"), tmp.path().join("int-20141106-20141130/topsApp.xml"));
    }

    #[test]
    fn test_request_validation() {
        let mut request = PairRequest::new("query.geojson", date("20141106"), date("20141130"), 64);
        assert!(request.validate().is_ok());

        request.swaths = Some(vec![1, 4]);
        assert!(matches!(request.validate(), Err(PrepError::InvalidFormat(_))));

        request.swaths = Some(vec![2]);
        request.secondary_date = request.reference_date;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_manifest_one_url_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("download-links.txt");
        write_manifest(&path, &["https://a/x.zip", "https://b/y.EOF"]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "https://a/x.zip\nhttps://b/y.EOF\n");
    }
}
