use crate::config::PrepConfig;
use crate::io::http::Fetch;
use crate::types::{Platform, PrepError, PrepResult};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Orbit file types published for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitType {
    /// Precise Orbit Ephemerides (best accuracy, ~20 days delay)
    POEORB,
    /// Restituted Orbit Ephemerides (lower accuracy, ~3 hours delay)
    RESORB,
}

impl OrbitType {
    /// Directory name of the listing under the orbit server root
    pub fn listing_dir(&self) -> &'static str {
        match self {
            OrbitType::POEORB => "aux_poeorb",
            OrbitType::RESORB => "aux_resorb",
        }
    }
}

impl std::fmt::Display for OrbitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitType::POEORB => write!(f, "POEORB"),
            OrbitType::RESORB => write!(f, "RESORB"),
        }
    }
}

fn granule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // S1A_IW_SLC__1SSV_20141130T135920_20141130T135947_003504_004221_0A60
    RE.get_or_init(|| {
        Regex::new(r"^(S1[AB])_\w{2}_\w{4}_\w{4}_(\d{8}T\d{6})_(\d{8}T\d{6})_")
            .expect("granule pattern is valid")
    })
}

fn orbit_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // S1A_OPER_AUX_POEORB_OPOD_20141126T122539_V20141105T225944_20141107T005944.EOF
    RE.get_or_init(|| {
        Regex::new(r"^(S1[AB])_OPER_AUX_(POEORB|RESORB)_OPOD_(\d{8}T\d{6})_V(\d{8}T\d{6})_(\d{8}T\d{6})\.EOF(\.zip)?$")
            .expect("orbit file pattern is valid")
    })
}

fn parse_compact_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
}

/// Mission and sensing window decoded from a granule name
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleInfo {
    pub platform: Platform,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
}

impl GranuleInfo {
    /// Decode a granule name or file basename (`.zip` / `.SAFE` suffixes allowed)
    pub fn parse(name: &str) -> PrepResult<Self> {
        let caps = granule_regex().captures(name).ok_or_else(|| {
            PrepError::InvalidFormat(format!("Not a Sentinel-1 granule name: {}", name))
        })?;

        let start_time = parse_compact_time(&caps[2]).ok_or_else(|| {
            PrepError::InvalidFormat(format!("Bad sensing start in {}", name))
        })?;
        let stop_time = parse_compact_time(&caps[3]).ok_or_else(|| {
            PrepError::InvalidFormat(format!("Bad sensing stop in {}", name))
        })?;

        Ok(Self { platform: Platform::parse(&caps[1])?, start_time, stop_time })
    }
}

/// An orbit file listed on the server
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitFile {
    pub name: String,
    pub url: String,
    pub platform: Platform,
    pub orbit_type: OrbitType,
    pub production_time: NaiveDateTime,
    pub validity_start: NaiveDateTime,
    pub validity_stop: NaiveDateTime,
}

impl OrbitFile {
    /// Decode an orbit filename; `None` when it does not follow the ESA convention
    pub fn parse(name: &str, base_url: &str) -> Option<Self> {
        let caps = orbit_file_regex().captures(name)?;
        let orbit_type = match &caps[2] {
            "POEORB" => OrbitType::POEORB,
            _ => OrbitType::RESORB,
        };
        Some(Self {
            name: name.to_string(),
            url: format!("{}/{}", base_url.trim_end_matches('/'), name),
            platform: Platform::parse(&caps[1]).ok()?,
            orbit_type,
            production_time: parse_compact_time(&caps[3])?,
            validity_start: parse_compact_time(&caps[4])?,
            validity_stop: parse_compact_time(&caps[5])?,
        })
    }

    /// Whether this file covers the whole sensing window of a granule
    pub fn covers(&self, granule: &GranuleInfo) -> bool {
        self.platform == granule.platform
            && self.validity_start <= granule.start_time
            && self.validity_stop >= granule.stop_time
    }
}

/// Outcome of an orbit lookup; unavailability is an expected result, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum OrbitLookup {
    Found(OrbitFile),
    Unavailable(String),
}

impl OrbitLookup {
    pub fn url(&self) -> Option<&str> {
        match self {
            OrbitLookup::Found(file) => Some(&file.url),
            OrbitLookup::Unavailable(_) => None,
        }
    }

    /// Treat unavailability as fatal
    pub fn require(self) -> PrepResult<OrbitFile> {
        match self {
            OrbitLookup::Found(file) => Ok(file),
            OrbitLookup::Unavailable(reason) => Err(PrepError::OrbitUnavailable(reason)),
        }
    }
}

/// Snapshot of one orbit directory listing
#[derive(Debug, Clone)]
pub struct OrbitCatalog {
    pub orbit_type: OrbitType,
    pub files: Vec<OrbitFile>,
}

impl OrbitCatalog {
    /// Build from the HTML of a directory listing
    pub fn from_listing(html: &str, base_url: &str, orbit_type: OrbitType) -> Self {
        let files: Vec<OrbitFile> = extract_hrefs(html)
            .into_iter()
            .filter_map(|name| OrbitFile::parse(&name, base_url))
            .filter(|file| file.orbit_type == orbit_type)
            .collect();

        log::debug!("Orbit listing holds {} {} files", files.len(), orbit_type);
        Self { orbit_type, files }
    }

    /// Find the orbit file covering a scene. Several candidates means the file was
    /// reprocessed; the latest production wins.
    pub fn lookup(&self, scene: &str) -> PrepResult<OrbitLookup> {
        let granule = GranuleInfo::parse(scene)?;

        let best = self.files
            .iter()
            .filter(|file| file.covers(&granule))
            .max_by_key(|file| file.production_time);

        Ok(match best {
            Some(file) => {
                log::info!("Orbit for {}: {}", scene, file.name);
                OrbitLookup::Found(file.clone())
            }
            None => OrbitLookup::Unavailable(format!(
                "no {} file for {} covering {} (scene may be too recent)",
                self.orbit_type, granule.platform.mission_id(), granule.start_time
            )),
        })
    }
}

/// Resolves precise orbit file URLs from the ASF orbit server
pub struct OrbitResolver {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
    orbit_type: OrbitType,
}

impl OrbitResolver {
    pub fn new(config: &PrepConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            base_url: config.orbit_url.trim_end_matches('/').to_string(),
            orbit_type: config.orbit_type,
        }
    }

    pub fn listing_url(&self) -> String {
        format!("{}/{}", self.base_url, self.orbit_type.listing_dir())
    }

    /// Download the directory listing once; transport failures propagate
    pub fn fetch_catalog(&self) -> PrepResult<OrbitCatalog> {
        let url = self.listing_url();
        log::info!("Fetching {} listing from {}", self.orbit_type, url);
        let html = self.fetcher.get_text(&format!("{}/", url), &[])?;
        Ok(OrbitCatalog::from_listing(&html, &url, self.orbit_type))
    }

    /// Fetch the listing and look up a single scene
    pub fn resolve_orbit(&self, scene: &str) -> PrepResult<OrbitLookup> {
        self.fetch_catalog()?.lookup(scene)
    }
}

/// Bare filenames from `href="..."` attributes of a listing page
fn extract_hrefs(html: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = html;

    while let Some(start) = rest.find("href=\"") {
        rest = &rest[start + 6..];
        let Some(end) = rest.find('"') else { break };
        let target = &rest[..end];
        let name = target.rsplit('/').next().unwrap_or(target);
        if name.contains(".EOF") {
            names.push(name.to_string());
        }
        rest = &rest[end..];
    }
    names
}
