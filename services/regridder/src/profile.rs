//! YAML run profiles.
//!
//! A profile fixes the settings shared by a series of runs (mapping file,
//! threshold, name overrides) so only the input and output change on the
//! command line. Supports environment variable substitution using ${VAR}
//! and ${VAR:-default} syntax.

use anyhow::{Context, Result};
use regrid_core::{RegridConfig, WeightThreshold};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Profile
// ============================================================================

/// Settings read from a profile file. Absent keys leave the configuration
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunProfile {
    pub map: Option<PathBuf>,
    pub grid_src: Option<PathBuf>,
    pub grid_dst: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub variable: Option<String>,
    /// A weight in [0,1], or `none` to disable renormalization.
    pub threshold: Option<String>,
    pub threads: Option<usize>,
    pub tempest_dir: Option<PathBuf>,
    pub extract: Vec<String>,
    /// Naming overrides in `key[,key...]=value` form.
    pub rgr: Vec<String>,
}

impl RunProfile {
    /// Overlay the profile onto `config`.
    pub fn apply(&self, config: &mut RegridConfig) -> Result<()> {
        if let Some(map) = &self.map {
            config.map = Some(map.clone());
        }
        if let Some(grid) = &self.grid_src {
            config.grid_src = Some(grid.clone());
        }
        if let Some(grid) = &self.grid_dst {
            config.grid_dst = Some(grid.clone());
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if let Some(variable) = &self.variable {
            config.variable = variable.clone();
        }
        if let Some(threshold) = &self.threshold {
            config.threshold = WeightThreshold::parse(threshold)
                .with_context(|| format!("Invalid threshold in profile: {}", threshold))?;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(dir) = &self.tempest_dir {
            config.tempest_dir = Some(dir.clone());
        }
        if !self.extract.is_empty() {
            config.extract = self.extract.clone();
        }
        config.apply_overrides(&self.rgr)?;
        Ok(())
    }
}

/// Load and parse a profile with environment variable substitution.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<RunProfile> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read run profile from {:?}", path.as_ref()))?;

    let expanded = expand_env_vars(&content)?;

    serde_yaml::from_str(&expanded)
        .with_context(|| format!("Failed to parse run profile from {:?}", path.as_ref()))
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Tests
// ============================================================================
