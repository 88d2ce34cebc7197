//! I/O modules for the catalog, orbit server and region inputs

pub mod http;
pub mod catalog;
pub mod orbit;
pub mod region;

pub use http::{Fetch, HttpFetcher};
pub use catalog::{CatalogFormat, CatalogQuery, CatalogQueryClient, QueryResponse};
pub use orbit::{OrbitCatalog, OrbitLookup, OrbitResolver, OrbitType};
pub use region::{Region, RegionResolver};
