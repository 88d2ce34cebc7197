//! Query the ASF catalog for Sentinel-1 IW SLC scenes over a region and save
//! a merged inventory.
//!
//! Usage:
//!     get_inventory -r 46.40 46.60 -120.60 -120.40
//!     get_inventory -i roi.geojson -b 0.1 -o 64 -k -f

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use topsprep::{
    BoundingBox, CatalogFormat, CatalogQuery, CatalogQueryClient, Fetch, HttpFetcher,
    InventoryMerger, Platform, PrepConfig, Region, RegionResolver,
};

#[derive(Parser, Debug)]
#[command(name = "get_inventory")]
#[command(about = "Query ASF for Sentinel-1 SLC scenes covering a region")]
#[command(after_long_help = "\
OUTPUTS (in --outdir):
  snwe.txt             Resolved region as S N W E
  query_SA.json        Raw catalog responses per platform
  query.geojson        Merged scene inventory
  footprints/          Per path/date footprints (-f)

ENVIRONMENT:
  RUST_LOG=debug           Enable debug logging
  TOPSPREP_SEARCH_URL      Override the catalog endpoint")]
struct Cli {
    /// Region of interest as south north west east
    #[arg(short = 'r', long = "roi", num_args = 4, value_names = ["S", "N", "W", "E"],
          allow_negative_numbers = true, conflicts_with = "input")]
    roi: Option<Vec<f64>>,

    /// Polygon vector file whose envelope is the region (GeoJSON; other OGR
    /// formats with the `ogr` feature)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Buffer in degrees around the vector file envelope
    #[arg(short = 'b', long, requires = "input")]
    buffer: Option<f64>,

    /// Restrict to one relative orbit (path)
    #[arg(short = 'o', long = "relative-orbit")]
    relative_orbit: Option<u32>,

    /// Also save KML footprints
    #[arg(short = 'k', long)]
    kml: bool,

    /// Also save CSV spreadsheets
    #[arg(short = 'c', long)]
    csv: bool,

    /// Also save metalink download manifests
    #[arg(short = 'm', long)]
    metalink: bool,

    /// Export footprints per path and date
    #[arg(short = 'f', long)]
    footprints: bool,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let region = match (&cli.roi, &cli.input) {
        (Some(snwe), _) => Region::Bounds(BoundingBox::from_snwe(snwe)?),
        (None, Some(path)) => Region::VectorFile { path: path.clone(), buffer: cli.buffer },
        (None, None) => {
            eprintln!("error: a region is required, use -r S N W E or -i vector file");
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    };

    let config = PrepConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    std::fs::create_dir_all(&cli.outdir)
        .with_context(|| format!("Failed to create output directory {:?}", cli.outdir))?;

    let bbox = RegionResolver::resolve(&region).context("Failed to resolve region of interest")?;
    RegionResolver::persist(&bbox, cli.outdir.join(&config.snwe_file))?;

    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config)?);
    let client = CatalogQueryClient::new(&config, fetcher, &cli.outdir);

    let results = client
        .query_platforms(&bbox, &Platform::ALL, cli.relative_orbit)
        .context("Catalog search failed")?;
    let inventory = InventoryMerger::merge(results);

    println!("{}", InventoryMerger::summarize(&inventory));

    let inventory_path = cli.outdir.join(&config.inventory_file);
    InventoryMerger::persist(&inventory, &inventory_path)
        .with_context(|| format!("Failed to save inventory to {:?}", inventory_path))?;

    let extras = [
        (cli.kml, CatalogFormat::Footprint),
        (cli.csv, CatalogFormat::Spreadsheet),
        (cli.metalink, CatalogFormat::Manifest),
    ];
    for (_, format) in extras.iter().filter(|(wanted, _)| *wanted) {
        for platform in Platform::ALL {
            client
                .query(&CatalogQuery::new(bbox, platform, cli.relative_orbit), *format)
                .with_context(|| format!("Failed to fetch {} for {}", format, platform))?;
        }
    }

    if cli.footprints {
        InventoryMerger::export_footprints(&inventory, cli.outdir.join("footprints"))?;
    }

    Ok(())
}
