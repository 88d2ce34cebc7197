//! topsprep: Sentinel-1 inventory and topsApp pair preparation
//!
//! Queries the ASF catalog for IW SLC scenes over a region, keeps a merged
//! GeoJSON inventory of what was found, and prepares per-pair processing
//! directories (`topsApp.xml`, scene and precise-orbit download links) for ISCE.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, Footprint, OrbitMode, Platform, PrepError, PrepResult, SceneRecord,
};
pub use config::PrepConfig;
pub use io::{
    CatalogFormat, CatalogQuery, CatalogQueryClient, Fetch, HttpFetcher, OrbitLookup,
    OrbitResolver, Region, RegionResolver,
};
pub use self::core::{
    ConfigDocument, ConfigDocumentBuilder, Inventory, InventoryMerger, PairPreparer,
    PairRequest, SceneSelector,
};
