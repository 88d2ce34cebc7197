//! Runtime configuration: catalog endpoints, HTTP behaviour and output filenames.
//!
//! Values come from `PrepConfig::default()`, optionally overlaid by a YAML file and
//! then by `TOPSPREP_*` environment variables.

use crate::io::orbit::OrbitType;
use crate::types::{PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_SEARCH_URL: &str = "TOPSPREP_SEARCH_URL";
pub const ENV_ORBIT_URL: &str = "TOPSPREP_ORBIT_URL";
pub const ENV_TIMEOUT_SECS: &str = "TOPSPREP_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub search_url: String,          // ASF search API endpoint
    pub orbit_url: String,           // Root of the orbit file listings
    pub orbit_type: OrbitType,
    pub processing_level: String,
    pub beam_mode: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub inventory_file: String,
    pub snwe_file: String,
    pub topsapp_file: String,
    pub manifest_file: String,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            search_url: "https://api.daac.asf.alaska.edu/services/search/param".to_string(),
            orbit_url: "https://s1qc.asf.alaska.edu".to_string(),
            orbit_type: OrbitType::POEORB,
            processing_level: "SLC".to_string(),
            beam_mode: "IW".to_string(),
            timeout_secs: 100,                 // ASF searches over large regions are slow
            user_agent: concat!("topsprep/", env!("CARGO_PKG_VERSION")).to_string(),
            inventory_file: "query.geojson".to_string(),
            snwe_file: "snwe.txt".to_string(),
            topsapp_file: "topsApp.xml".to_string(),
            manifest_file: "download-links.txt".to_string(),
        }
    }
}

impl PrepConfig {
    /// Read a YAML config file; keys not present keep their defaults
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> PrepResult<Self> {
        log::info!("Reading configuration from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> PrepResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Default or file-based configuration with environment overrides applied
    pub fn load(path: Option<&Path>) -> PrepResult<Self> {
        let config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `TOPSPREP_*` overrides from a lookup function
    pub fn with_overrides<F>(mut self, lookup: F) -> PrepResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SEARCH_URL) {
            log::debug!("{} override: {}", ENV_SEARCH_URL, url);
            self.search_url = url;
        }
        if let Some(url) = lookup(ENV_ORBIT_URL) {
            log::debug!("{} override: {}", ENV_ORBIT_URL, url);
            self.orbit_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs.trim().parse().map_err(|e| {
                PrepError::InvalidFormat(format!("{}='{}': {}", ENV_TIMEOUT_SECS, secs, e))
            })?;
        }
        Ok(self)
    }
}
