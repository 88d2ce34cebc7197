use crate::core::inventory::Inventory;
use crate::types::{PrepError, PrepResult, SceneRecord};
use chrono::NaiveDate;

/// A scene chosen for processing: where to download it and the file it becomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSource {
    pub identifier: String,
    pub url: String,
    pub basename: String,
}

/// Picks the scenes that make up one acquisition
pub struct SceneSelector;

impl SceneSelector {
    /// All scenes acquired on `date` along `relative_orbit`, in along-track order.
    ///
    /// A pass crossing frame boundaries yields several scenes; every one is returned.
    pub fn resolve_scenes(
        inventory: &Inventory,
        date: NaiveDate,
        relative_orbit: u32,
    ) -> PrepResult<Vec<SceneSource>> {
        let mut matching: Vec<&SceneRecord> = inventory
            .iter()
            .filter(|s| s.acquisition_date == date && s.relative_orbit == relative_orbit)
            .collect();

        if matching.is_empty() {
            log::warn!("No scenes for {} on path {} in inventory", date, relative_orbit);
            return Err(PrepError::SceneNotFound { date, orbit: relative_orbit });
        }

        matching.sort_by(|a, b| {
            a.start_time.cmp(&b.start_time).then_with(|| a.identifier.cmp(&b.identifier))
        });

        let sources: Vec<SceneSource> = matching
            .into_iter()
            .map(|scene| SceneSource {
                identifier: scene.identifier.clone(),
                url: scene.download_url.clone(),
                basename: url_basename(&scene.download_url).to_string(),
            })
            .collect();

        log::info!("Path {} on {}: {} scene(s)", relative_orbit, date, sources.len());
        for source in &sources {
            log::debug!("  {}", source.url);
        }
        Ok(sources)
    }
}

/// Last path segment of a URL, without query string or fragment
pub fn url_basename(url: &str) -> &str {
    let end = url.find(|c| c == '?' || c == '#').unwrap_or(url.len());
    let path = url[..end].trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}
