//! Refresh planet, Moon and Sun positions in a catalog file
//!
//! Queries JPL Horizons for every solar-system body in the catalog and
//! writes the new RA/Dec values back, stamping `last_update` on each object
//! and `metadata.last_full_update` on the document. Bodies that cannot be
//! fetched keep their previous coordinates.
//!
//! Usage:
//!   cargo run --bin ephem_update -- [--dry-run] [data/celestial_data.json]

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser};
use log::{error, warn};

use skytracker::ephemeris::{HorizonsClient, HORIZONS_URL};
use skytracker::{CatalogStore, Config};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Updates solar-system positions in a sky tracker catalog from JPL Horizons",
    long_about = None
)]
struct Args {
    /// Print the new positions without writing the catalog
    #[arg(short = 'n', long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Configuration file providing the observing site
    #[arg(short, long, default_value = "skytracker.json")]
    config: PathBuf,

    /// Instant to compute positions for, RFC 3339; defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Horizons API endpoint
    #[arg(long, default_value = HORIZONS_URL)]
    url: String,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Catalog file to update
    #[arg(default_value = "data/celestial_data.json")]
    catalog: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = Config::load(&args.config).unwrap_or_else(|e| {
        warn!("Ignoring {}: {}", args.config.display(), e);
        Config::default()
    });

    let store = match CatalogStore::load(&args.catalog) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot read catalog {}: {}", args.catalog.display(), e);
            process::exit(1);
        }
    };

    let when = args.at.unwrap_or_else(Utc::now);
    println!("Date: {}", when.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Site: {:.6}, {:.6}",
        config.site.latitude_degrees, config.site.longitude_degrees
    );
    println!("{}", "=".repeat(60));

    let client = HorizonsClient::with_base_url(config.site, &args.url)?;
    let updates = client.fetch_catalog(&store.snapshot(), when);
    if updates.is_empty() {
        error!("No positions could be fetched; check the network connection");
        process::exit(1);
    }

    for update in &updates {
        println!(
            "{:12} | RA: {:10.6} h | DEC: {:10.6} deg",
            update.name, update.position.ra_hours, update.position.dec_degrees
        );
    }

    if args.dry_run {
        println!("\nDry run, {} not modified", args.catalog.display());
        return Ok(());
    }

    let applied = store.apply_ephemeris(&updates, when)?;
    println!("\nUpdated {} objects in {}", applied, args.catalog.display());
    Ok(())
}
