//! Regridder command-line service.
//!
//! Reads a mapping file (or source and destination grid descriptions),
//! regrids every horizontal field of the input dataset and writes the
//! result with the destination-grid coordinates.

mod cli;
mod profile;

use anyhow::Result;
use clap::Parser;
use netcdf_io::{silence_hdf5_errors, NetCdfOpener, NetCdfWriter};
use regrid_core::{RegridConfig, Regridder};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use cli::Args;

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    silence_hdf5_errors();

    let config = args.into_config(RegridConfig::from_env()?)?;
    info!(
        map = ?config.map,
        input = ?config.input,
        output = ?config.output,
        threshold = %config.threshold,
        "Loaded configuration"
    );

    let outcome = Regridder::new(&config, &NetCdfOpener).run(|path| NetCdfWriter::create(path))?;

    match outcome.summary {
        Some(summary) => info!(
            strategy = %outcome.strategy,
            fields = outcome.fields,
            regridded = summary.regridded,
            copied = summary.copied,
            skipped = summary.skipped,
            "Regridder finished"
        ),
        None => info!(strategy = %outcome.strategy, "Regridder finished"),
    }

    Ok(())
}
