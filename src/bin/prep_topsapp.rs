//! Prepare an ISCE topsApp pair directory from a saved inventory.
//!
//! Usage:
//!     prep_topsapp -i query.geojson -r 20141106 -s 20141130 -p 64 -n 1 2
//!     prep_topsapp -r 20141106 -s 20141130 -p 64 -t template.yml --header-orbits

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use topsprep::core::OrbitPolicy;
use topsprep::{BoundingBox, Fetch, HttpFetcher, PairPreparer, PairRequest, PrepConfig};

#[derive(Parser, Debug)]
#[command(name = "prep_topsapp")]
#[command(about = "Write topsApp.xml and download links for an interferometric pair")]
struct Cli {
    /// Inventory GeoJSON written by get_inventory
    #[arg(short = 'i', long)]
    inventory: Option<PathBuf>,

    /// Reference date (YYYYMMDD)
    #[arg(short = 'r', long, value_parser = parse_date_arg)]
    reference: NaiveDate,

    /// Secondary date (YYYYMMDD)
    #[arg(short = 's', long, value_parser = parse_date_arg)]
    secondary: NaiveDate,

    /// Relative orbit (path)
    #[arg(short = 'p', long)]
    path: u32,

    /// Sub-swaths to process
    #[arg(short = 'n', long, num_args = 1..=3, value_parser = clap::value_parser!(u8).range(1..=3))]
    swaths: Option<Vec<u8>>,

    /// YAML template with a topsinsar mapping
    #[arg(short = 't', long)]
    template: Option<PathBuf>,

    /// DEM file
    #[arg(short = 'd', long)]
    dem: Option<String>,

    /// Region of interest as S N W E
    #[arg(short = 'b', long, num_args = 4, value_names = ["S", "N", "W", "E"], allow_negative_numbers = true)]
    roi: Option<Vec<f64>>,

    /// Geocode bounding box as S N W E
    #[arg(short = 'g', long, num_args = 4, value_names = ["S", "N", "W", "E"], allow_negative_numbers = true)]
    gbox: Option<Vec<f64>>,

    /// Azimuth looks
    #[arg(long)]
    alooks: Option<u32>,

    /// Range looks
    #[arg(long)]
    rlooks: Option<u32>,

    /// Interferogram filter strength
    #[arg(short = 'f', long)]
    filter_strength: Option<f64>,

    /// Skip the precise orbit lookup
    #[arg(long, conflicts_with = "strict_orbits")]
    header_orbits: bool,

    /// Fail when a precise orbit is not yet published
    #[arg(long)]
    strict_orbits: bool,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the pair directory is created in
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    topsprep::types::parse_date(value).map_err(|e| e.to_string())
}

fn bbox_arg(values: Option<Vec<f64>>) -> Result<Option<BoundingBox>> {
    values
        .map(|v| BoundingBox::from_snwe(&v))
        .transpose()
        .context("Invalid bounding box")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = PrepConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let inventory = cli
        .inventory
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.inventory_file));

    let mut request = PairRequest::new(inventory, cli.reference, cli.secondary, cli.path);
    request.template = cli.template;
    request.swaths = cli.swaths;
    request.dem = cli.dem;
    request.region_of_interest = bbox_arg(cli.roi)?;
    request.geocode_bbox = bbox_arg(cli.gbox)?;
    request.azimuth_looks = cli.alooks;
    request.range_looks = cli.rlooks;
    request.filter_strength = cli.filter_strength;
    request.orbit_policy = if cli.header_orbits {
        OrbitPolicy::HeaderOnly
    } else if cli.strict_orbits {
        OrbitPolicy::Strict
    } else {
        OrbitPolicy::Fallback
    };

    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config)?);
    let preparer = PairPreparer::new(&config, fetcher);
    let prepared = preparer
        .prepare(&request, &cli.outdir)
        .with_context(|| format!("Failed to prepare pair {} / {}", cli.reference, cli.secondary))?;

    println!("Pair directory: {}", prepared.workspace.path().display());
    println!("  {}", prepared.topsapp_path.display());
    println!("  {} ({} links)", prepared.manifest_path.display(), prepared.download_urls().len());
    Ok(())
}
