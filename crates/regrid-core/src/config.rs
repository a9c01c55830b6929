//! Configuration for a regridding run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};

/// Default variable singled out for special treatment.
pub const DEFAULT_VARIABLE: &str = "ORO";

/// Working directory of the mesh-generation back-end when none is configured.
pub const DEFAULT_TEMPEST_DIR: &str = "/tmp";

/// Configuration for one regridding run.
///
/// Built once before any grid I/O and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegridConfig {
    /// Grid description of the source grid.
    pub grid_src: Option<PathBuf>,

    /// Grid description of the destination grid.
    pub grid_dst: Option<PathBuf>,

    /// Mapping file with precomputed weights.
    pub map: Option<PathBuf>,

    /// Dataset holding the fields to regrid.
    pub input: Option<PathBuf>,

    /// Dataset receiving the regridded fields.
    pub output: Option<PathBuf>,

    /// Variable for special regridding treatment.
    pub variable: String,

    /// Renormalization policy for destination cells with missing inputs.
    pub threshold: WeightThreshold,

    /// Directory where mesh-generation grids, meshes and weights are stored.
    pub tempest_dir: Option<PathBuf>,

    /// Worker threads for field processing (0 = one per core).
    pub threads: usize,

    /// Restrict extraction to these variables (empty = every variable).
    pub extract: Vec<String>,

    /// Names of dimensions and coordinate variables.
    pub names: RegridNames,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            grid_src: None,
            grid_dst: None,
            map: None,
            input: None,
            output: None,
            variable: DEFAULT_VARIABLE.to_string(),
            threshold: WeightThreshold::Disabled,
            tempest_dir: None,
            threads: 0,
            extract: Vec::new(),
            names: RegridNames::default(),
        }
    }
}

impl RegridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DATA_TEMPEST") {
            if !val.is_empty() {
                config.tempest_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("REGRID_MAP") {
            config.map = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("REGRID_GRID_SRC") {
            config.grid_src = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("REGRID_GRID_DST") {
            config.grid_dst = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("REGRID_THRESHOLD") {
            config.threshold = WeightThreshold::parse(&val)?;
        }

        if let Ok(val) = std::env::var("REGRID_THREADS") {
            if let Ok(threads) = val.parse() {
                config.threads = threads;
            }
        }

        if let Ok(val) = std::env::var("REGRID_VARIABLE") {
            config.variable = val;
        }

        Ok(config)
    }

    /// Apply `key[,key...]=value` naming overrides in order.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        for arg in args {
            self.names.apply_override(arg.as_ref())?;
        }
        Ok(())
    }

    /// Directory the mesh-generation back-end writes into.
    pub fn tempest_dir_or_default(&self) -> PathBuf {
        self.tempest_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPEST_DIR))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.threshold.validate()?;
        self.names.validate()?;
        if self.variable.is_empty() {
            return Err(RegridError::config("variable name must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Weight threshold
// ============================================================================

/// Renormalization policy.
///
/// `Disabled` keeps raw weighted sums and so conserves the global integral.
/// `Threshold(t)` divides each destination cell by its valid weight; with
/// `t > 0` cells whose valid weight falls below `t` become missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightThreshold {
    #[default]
    Disabled,
    Threshold(f64),
}

impl WeightThreshold {
    /// Parse `none`/`disabled` or a number.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "none" | "disabled" | "off" => Ok(Self::Disabled),
            _ => {
                let value: f64 = trimmed.parse().map_err(|_| {
                    RegridError::config(format!("invalid weight threshold: {}", s))
                })?;
                let threshold = Self::Threshold(value);
                threshold.validate()?;
                Ok(threshold)
            }
        }
    }

    /// Threshold value when renormalization is enabled.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Disabled => None,
            Self::Threshold(t) => Some(*t),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Threshold(_))
    }

    /// Thresholds must lie in [0.0, 1.0].
    pub fn validate(&self) -> Result<()> {
        if let Self::Threshold(t) = self {
            if !(0.0..=1.0).contains(t) {
                return Err(RegridError::config(format!(
                    "weight threshold must be in [0.0,1.0], got {}",
                    t
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for WeightThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Threshold(t) => write!(f, "{}", t),
        }
    }
}

// ============================================================================
// Names
// ============================================================================

/// Names of the dimensions and coordinate variables the engine recognizes and creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridNames {
    /// Variable containing gridcell area.
    pub area_nm: String,
    /// Dimension for spatial bounds.
    pub bnd_nm: String,
    /// Dimension for temporal bounds.
    pub bnd_tm_nm: String,
    /// Horizontal dimension of an unstructured grid.
    pub col_nm: String,
    /// Rectangular boundary variable for latitude.
    pub lat_bnd_nm: String,
    /// Dimension recognized as latitude.
    pub lat_nm: String,
    /// Non-rectangular boundary variable for latitude.
    pub lat_vrt_nm: String,
    /// Variable containing latitude weights.
    pub lat_wgt_nm: String,
    /// Rectangular boundary variable for longitude.
    pub lon_bnd_nm: String,
    /// Dimension recognized as longitude.
    pub lon_nm: String,
    /// Non-rectangular boundary variable for longitude.
    pub lon_vrt_nm: String,
    /// Dimension for vertices.
    pub vrt_nm: String,
}

impl Default for RegridNames {
    fn default() -> Self {
        Self {
            area_nm: "area".to_string(),
            // Two-endpoint bounds share one dimension unless overridden
            bnd_nm: "nbnd".to_string(),
            bnd_tm_nm: "nbnd".to_string(),
            col_nm: "ncol".to_string(),
            lat_bnd_nm: "lat_bnds".to_string(),
            lat_nm: "lat".to_string(),
            lat_vrt_nm: "lat_vertices".to_string(),
            lat_wgt_nm: "gw".to_string(),
            lon_bnd_nm: "lon_bnds".to_string(),
            lon_nm: "lon".to_string(),
            lon_vrt_nm: "lon_vertices".to_string(),
            vrt_nm: "nv".to_string(),
        }
    }
}

impl RegridNames {
    /// Recognized override keys.
    pub const KEYS: [&'static str; 12] = [
        "area_nm",
        "bnd_nm",
        "bnd_tm_nm",
        "col_nm",
        "lat_bnd_nm",
        "lat_nm",
        "lat_vrt_nm",
        "lat_wgt_nm",
        "lon_bnd_nm",
        "lon_nm",
        "lon_vrt_nm",
        "vrt_nm",
    ];

    /// Set one name by key (case-insensitive).
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key.trim().to_lowercase().as_str() {
            "area_nm" => &mut self.area_nm,
            "bnd_nm" => &mut self.bnd_nm,
            "bnd_tm_nm" => &mut self.bnd_tm_nm,
            "col_nm" => &mut self.col_nm,
            "lat_bnd_nm" => &mut self.lat_bnd_nm,
            "lat_nm" => &mut self.lat_nm,
            "lat_vrt_nm" => &mut self.lat_vrt_nm,
            "lat_wgt_nm" => &mut self.lat_wgt_nm,
            "lon_bnd_nm" => &mut self.lon_bnd_nm,
            "lon_nm" => &mut self.lon_nm,
            "lon_vrt_nm" => &mut self.lon_vrt_nm,
            "vrt_nm" => &mut self.vrt_nm,
            _ => {
                return Err(RegridError::config(format!(
                    "unrecognized key-value option to --rgr switch: {}",
                    key
                )))
            }
        };
        *slot = value.to_string();
        Ok(())
    }

    /// Apply one `key1[,key2...]=value` argument.
    ///
    /// Every listed key receives the same value.
    pub fn apply_override(&mut self, arg: &str) -> Result<()> {
        let (keys, value) = arg.split_once('=').ok_or_else(|| {
            RegridError::config(format!(
                "invalid --rgr specification: {}. Must contain \"=\" sign, e.g., \"key=value\"",
                arg
            ))
        })?;
        let value = value.trim();
        for key in keys.split(',').filter(|k| !k.trim().is_empty()) {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Every name must be non-empty.
    pub fn validate(&self) -> Result<()> {
        let all = [
            &self.area_nm,
            &self.bnd_nm,
            &self.bnd_tm_nm,
            &self.col_nm,
            &self.lat_bnd_nm,
            &self.lat_nm,
            &self.lat_vrt_nm,
            &self.lat_wgt_nm,
            &self.lon_bnd_nm,
            &self.lon_nm,
            &self.lon_vrt_nm,
            &self.vrt_nm,
        ];
        for (key, value) in Self::KEYS.iter().zip(all) {
            if value.is_empty() {
                return Err(RegridError::config(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegridConfig::default();
        assert_eq!(config.variable, "ORO");
        assert_eq!(config.threshold, WeightThreshold::Disabled);
        assert_eq!(config.threads, 0);
        assert!(config.map.is_none());
        assert_eq!(config.tempest_dir_or_default(), PathBuf::from("/tmp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_names() {
        let names = RegridNames::default();
        assert_eq!(names.area_nm, "area");
        assert_eq!(names.bnd_nm, "nbnd");
        assert_eq!(names.bnd_tm_nm, "nbnd");
        assert_eq!(names.col_nm, "ncol");
        assert_eq!(names.lat_bnd_nm, "lat_bnds");
        assert_eq!(names.lat_vrt_nm, "lat_vertices");
        assert_eq!(names.lat_wgt_nm, "gw");
        assert_eq!(names.lon_vrt_nm, "lon_vertices");
        assert_eq!(names.vrt_nm, "nv");
    }

    #[test]
    fn test_override_multiple_keys_share_value() {
        let mut names = RegridNames::default();
        names.apply_override("lat_bnd_nm,LON_BND_NM=bounds").unwrap();
        assert_eq!(names.lat_bnd_nm, "bounds");
        assert_eq!(names.lon_bnd_nm, "bounds");
        assert_eq!(names.lat_nm, "lat");
    }

    #[test]
    fn test_override_errors() {
        let mut names = RegridNames::default();
        let err = names.apply_override("col_nm").unwrap_err();
        assert!(err.to_string().contains("col_nm"));

        let err = names.apply_override("colnm=cells").unwrap_err();
        assert!(matches!(err, RegridError::Config(ref m) if m.contains("colnm")));
    }

    #[test]
    fn test_threshold_parse_and_validate() {
        assert_eq!(WeightThreshold::parse("none").unwrap(), WeightThreshold::Disabled);
        assert_eq!(WeightThreshold::parse("0").unwrap(), WeightThreshold::Threshold(0.0));
        assert_eq!(WeightThreshold::parse("0.5").unwrap().value(), Some(0.5));
        assert!(WeightThreshold::parse("1.5").is_err());
        assert!(WeightThreshold::parse("-0.1").is_err());
        assert!(WeightThreshold::parse("half").is_err());

        // Disabled and zero are different policies
        assert!(!WeightThreshold::Disabled.is_enabled());
        assert!(WeightThreshold::Threshold(0.0).is_enabled());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RegridConfig::default();
        config.threshold = WeightThreshold::Threshold(2.0);
        assert!(config.validate().is_err());

        config = RegridConfig::default();
        config.names.col_nm.clear();
        assert!(config.validate().is_err());
    }
}
