//! Command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use regrid_core::{RegridConfig, WeightThreshold};
use tracing::Level;

use crate::profile::load_profile;

#[derive(Parser, Debug)]
#[command(name = "regridder")]
#[command(about = "Regrid every horizontal field of a dataset with precomputed or generated weights")]
pub struct Args {
    /// Dataset holding the fields to regrid
    pub input: Option<PathBuf>,

    /// Mapping file with precomputed weights
    #[arg(short, long)]
    pub map: Option<PathBuf>,

    /// Grid description of the source grid
    #[arg(long)]
    pub grid_src: Option<PathBuf>,

    /// Grid description of the destination grid
    #[arg(long)]
    pub grid_dst: Option<PathBuf>,

    /// Output dataset
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Variable for special regridding treatment
    #[arg(long)]
    pub variable: Option<String>,

    /// Renormalization threshold in [0,1], or "none"
    #[arg(short, long)]
    pub threshold: Option<String>,

    /// Naming override key[,key...]=value (repeatable)
    #[arg(long = "rgr", value_name = "KEY=VALUE")]
    pub rgr: Vec<String>,

    /// Restrict processing to these variables (repeatable)
    #[arg(short = 'x', long)]
    pub extract: Vec<String>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// YAML run profile applied before command-line options
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Layer profile and command-line options over `base`.
    pub fn into_config(self, mut base: RegridConfig) -> Result<RegridConfig> {
        if let Some(path) = &self.profile {
            load_profile(path)?.apply(&mut base)?;
        }

        if self.input.is_some() {
            base.input = self.input;
        }
        if self.map.is_some() {
            base.map = self.map;
        }
        if self.grid_src.is_some() {
            base.grid_src = self.grid_src;
        }
        if self.grid_dst.is_some() {
            base.grid_dst = self.grid_dst;
        }
        if self.output.is_some() {
            base.output = self.output;
        }
        if let Some(variable) = self.variable {
            base.variable = variable;
        }
        if let Some(threshold) = &self.threshold {
            base.threshold = WeightThreshold::parse(threshold)?;
        }
        if let Some(threads) = self.threads {
            base.threads = threads;
        }
        if !self.extract.is_empty() {
            base.extract = self.extract;
        }
        base.apply_overrides(&self.rgr)?;
        base.validate()?;
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("regridder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_weight_file_invocation() {
        let args = parse(&[
            "--map",
            "map.nc",
            "--output",
            "out.nc",
            "in.nc",
            "--threshold",
            "0.5",
            "--rgr",
            "col_nm=cells",
            "-x",
            "T",
            "-x",
            "Q",
        ]);
        let config = args.into_config(RegridConfig::default()).unwrap();
        assert_eq!(config.map, Some(PathBuf::from("map.nc")));
        assert_eq!(config.input, Some(PathBuf::from("in.nc")));
        assert_eq!(config.output, Some(PathBuf::from("out.nc")));
        assert_eq!(config.threshold, WeightThreshold::Threshold(0.5));
        assert_eq!(config.names.col_nm, "cells");
        assert_eq!(config.extract, vec!["T".to_string(), "Q".to_string()]);
    }

    #[test]
    fn test_command_line_overrides_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "map: profile_map.nc\nthreshold: none\nvariable: PS").unwrap();
        let profile = file.path().display().to_string();

        let args = parse(&["--profile", &profile, "--threshold", "0.1", "in.nc"]);
        let config = args.into_config(RegridConfig::default()).unwrap();
        assert_eq!(config.map, Some(PathBuf::from("profile_map.nc")));
        assert_eq!(config.threshold, WeightThreshold::Threshold(0.1));
        assert_eq!(config.variable, "PS");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let args = parse(&["--threshold", "2.0", "in.nc"]);
        assert!(args.into_config(RegridConfig::default()).is_err());
    }

    #[test]
    fn test_log_level_fallback() {
        assert_eq!(parse(&["--log-level", "DEBUG"]).level(), Level::DEBUG);
        assert_eq!(parse(&["--log-level", "chatty"]).level(), Level::INFO);
    }
}
