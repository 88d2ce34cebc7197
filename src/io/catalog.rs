//! ASF catalog search for Sentinel-1 IW SLC granules.

use crate::config::PrepConfig;
use crate::io::http::Fetch;
use crate::types::{BoundingBox, Footprint, Platform, PrepError, PrepResult, SceneRecord};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output selector for a catalog query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogFormat {
    /// Scene metadata, parsed into [`SceneRecord`]s
    Metadata,
    /// KML footprint overlay
    Footprint,
    /// CSV spreadsheet
    Spreadsheet,
    /// Metalink download manifest
    Manifest,
}

impl CatalogFormat {
    /// Value of the `output` query parameter
    pub fn api_output(&self) -> &'static str {
        match self {
            CatalogFormat::Metadata => "json",
            CatalogFormat::Footprint => "kml",
            CatalogFormat::Spreadsheet => "csv",
            CatalogFormat::Manifest => "metalink",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.api_output()
    }
}

impl std::fmt::Display for CatalogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_output())
    }
}

/// Parameters shared by every output format
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub bbox: BoundingBox,
    pub platform: Platform,
    pub relative_orbit: Option<u32>,
}

impl CatalogQuery {
    pub fn new(bbox: BoundingBox, platform: Platform, relative_orbit: Option<u32>) -> Self {
        Self { bbox, platform, relative_orbit }
    }
}

/// The two response shapes of a query
#[derive(Debug)]
pub enum QueryResponse {
    Scenes(Vec<SceneRecord>),
    Artifact(PathBuf),
}

/// Granule as returned by the search API's json output.
/// Numeric fields arrive as either strings or numbers depending on API version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsfGranule {
    granule_name: String,
    platform: String,
    start_time: String,
    relative_orbit: FlexNumber,
    #[serde(default)]
    absolute_orbit: Option<FlexNumber>,
    #[serde(default)]
    frame_number: Option<FlexNumber>,
    #[serde(default)]
    flight_direction: Option<String>,
    string_footprint: String,
    download_url: String,
    #[serde(default)]
    browse: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Int(u64),
    Text(String),
}

impl FlexNumber {
    fn to_u32(&self, field: &str, granule: &str) -> PrepResult<u32> {
        let parsed = match self {
            FlexNumber::Int(v) => u32::try_from(*v).ok(),
            FlexNumber::Text(s) => s.trim().parse::<u32>().ok(),
        };
        parsed.ok_or_else(|| PrepError::InvalidFormat(
            format!("Bad {} for {}: {:?}", field, granule, self)
        ))
    }
}

/// Issues catalog searches and turns responses into scene records or artifact files
pub struct CatalogQueryClient {
    fetcher: Arc<dyn Fetch>,
    search_url: String,
    processing_level: String,
    beam_mode: String,
    output_dir: PathBuf,
}

impl CatalogQueryClient {
    pub fn new(config: &PrepConfig, fetcher: Arc<dyn Fetch>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            search_url: config.search_url.clone(),
            processing_level: config.processing_level.clone(),
            beam_mode: config.beam_mode.clone(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Query parameters for a search; identical across formats except `output`
    pub fn build_params(&self, query: &CatalogQuery, format: CatalogFormat) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("intersectsWith", query.bbox.to_wkt()),
            ("platform", query.platform.tag().to_string()),
            ("processingLevel", self.processing_level.clone()),
            ("beamMode", self.beam_mode.clone()),
            ("output", format.api_output().to_string()),
        ];
        if let Some(orbit) = query.relative_orbit {
            params.push(("relativeOrbit", orbit.to_string()));
        }
        params
    }

    /// File a raw response for this platform and format is written to
    pub fn output_path(&self, platform: Platform, format: CatalogFormat) -> PathBuf {
        self.output_dir.join(format!("query_{}.{}", platform.tag(), format.extension()))
    }

    pub fn query(&self, query: &CatalogQuery, format: CatalogFormat) -> PrepResult<QueryResponse> {
        match format {
            CatalogFormat::Metadata => self.query_scenes(query).map(QueryResponse::Scenes),
            CatalogFormat::Footprint | CatalogFormat::Spreadsheet | CatalogFormat::Manifest => {
                self.fetch_artifact(query, format).map(QueryResponse::Artifact)
            }
        }
    }

    /// Metadata query returning the parsed scenes
    pub fn query_scenes(&self, query: &CatalogQuery) -> PrepResult<Vec<SceneRecord>> {
        let (body, scenes) = self.fetch_metadata(query)?;
        self.save_raw(query.platform, &body)?;
        Ok(scenes)
    }

    /// One metadata query per platform, issued concurrently.
    /// Any failed platform fails the whole call so an incomplete set is never merged,
    /// and raw responses are written only once every platform has succeeded.
    pub fn query_platforms(
        &self,
        bbox: &BoundingBox,
        platforms: &[Platform],
        relative_orbit: Option<u32>,
    ) -> PrepResult<Vec<Vec<SceneRecord>>> {
        let responses = platforms
            .par_iter()
            .map(|platform| {
                self.fetch_metadata(&CatalogQuery::new(*bbox, *platform, relative_orbit))
                    .map(|response| (*platform, response))
            })
            .collect::<PrepResult<Vec<_>>>()?;

        responses
            .into_iter()
            .map(|(platform, (body, scenes))| {
                self.save_raw(platform, &body)?;
                Ok(scenes)
            })
            .collect()
    }

    fn fetch_metadata(&self, query: &CatalogQuery) -> PrepResult<(String, Vec<SceneRecord>)> {
        log::info!("Querying ASF catalog for {}...", query.platform);
        let params = self.build_params(query, CatalogFormat::Metadata);
        let body = self.fetcher.get_text(&self.search_url, &params)?;
        let scenes = Self::parse_scenes(&body)?;
        log::info!("{} returned {} scenes", query.platform, scenes.len());
        Ok((body, scenes))
    }

    fn save_raw(&self, platform: Platform, body: &str) -> PrepResult<()> {
        let raw_path = self.output_path(platform, CatalogFormat::Metadata);
        std::fs::write(&raw_path, body)?;
        log::debug!("Saved raw response to {}", raw_path.display());
        Ok(())
    }

    fn fetch_artifact(&self, query: &CatalogQuery, format: CatalogFormat) -> PrepResult<PathBuf> {
        log::info!("Requesting {} artifact for {}...", format, query.platform);
        let params = self.build_params(query, format);
        let body = self.fetcher.get_text(&self.search_url, &params)?;

        let path = self.output_path(query.platform, format);
        std::fs::write(&path, body)?;
        log::info!("Saved {}", path.display());
        Ok(path)
    }

    /// Parse a json search response (`[[granule, ...]]`).
    /// A single malformed granule rejects the whole response.
    pub fn parse_scenes(body: &str) -> PrepResult<Vec<SceneRecord>> {
        let pages: Vec<Vec<AsfGranule>> = serde_json::from_str(body)
            .map_err(|e| PrepError::InvalidFormat(format!("Unexpected catalog response: {}", e)))?;

        pages.into_iter()
            .flatten()
            .map(Self::to_record)
            .collect()
    }

    fn to_record(granule: AsfGranule) -> PrepResult<SceneRecord> {
        let name = granule.granule_name.as_str();
        let start_time = parse_catalog_time(&granule.start_time).ok_or_else(|| {
            PrepError::InvalidFormat(format!("Bad startTime for {}: {}", name, granule.start_time))
        })?;

        let footprint = Footprint::from_wkt(&granule.string_footprint)?;

        Ok(SceneRecord {
            identifier: granule.granule_name.clone(),
            platform: Platform::parse(&granule.platform)?,
            acquisition_date: start_time.date(),
            start_time,
            relative_orbit: granule.relative_orbit.to_u32("relativeOrbit", name)?,
            absolute_orbit: granule.absolute_orbit
                .as_ref()
                .map(|v| v.to_u32("absoluteOrbit", name))
                .transpose()?,
            frame_number: granule.frame_number
                .as_ref()
                .map(|v| v.to_u32("frameNumber", name))
                .transpose()?,
            flight_direction: granule.flight_direction.filter(|s| !s.is_empty()),
            footprint,
            download_url: granule.download_url,
            browse_url: granule.browse.filter(|s| !s.is_empty() && s != "NA"),
        })
    }
}

/// Catalog timestamps come with or without fractional seconds and a trailing `Z`
pub(crate) fn parse_catalog_time(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
