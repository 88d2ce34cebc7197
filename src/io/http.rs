use crate::config::PrepConfig;
use crate::types::{PrepError, PrepResult};
use std::time::Duration;

/// Text GET against a remote service.
///
/// The catalog client and the orbit resolver only ever need "fetch this URL
/// with these query parameters as text", so that is the whole seam.
pub trait Fetch: Send + Sync {
    fn get_text(&self, url: &str, params: &[(&str, String)]) -> PrepResult<String>;
}

/// Blocking reqwest implementation of [`Fetch`]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &PrepConfig) -> PrepResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PrepError::CatalogUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get_text(&self, url: &str, params: &[(&str, String)]) -> PrepResult<String> {
        log::debug!("GET {} {:?}", url, params);

        let response = self.client.get(url)
            .query(params)
            .send()
            .map_err(|e| PrepError::CatalogUnavailable(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PrepError::CatalogUnavailable(
                format!("{} returned status {}", url, response.status())
            ));
        }

        response.text()
            .map_err(|e| PrepError::CatalogUnavailable(format!("Failed to read response from {}: {}", url, e)))
    }
}
