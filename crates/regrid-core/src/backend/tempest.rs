//! External mesh-generation toolchain.
//!
//! Each tool is a standalone executable found on `PATH`, driven by a fixed
//! set of flags.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{RegridError, Result};

/// Mesh file written by the default strategy, relative to the working directory.
pub const RLL_MESH_FILE: &str = "outRLLMesh.g";

/// Latitudes of the default regular lat-lon mesh.
pub const RLL_MESH_LAT: usize = 180;

/// Longitudes of the default regular lat-lon mesh.
pub const RLL_MESH_LON: usize = 360;

/// Tools of the mesh-generation toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempestCommand {
    ApplyOfflineMap,
    CalculateDiffNorms,
    GenerateCSMesh,
    GenerateGLLMetaData,
    GenerateICOMesh,
    GenerateLambertConfConicMesh,
    GenerateOfflineMap,
    GenerateOverlapMesh,
    GenerateRLLMesh,
    GenerateTestData,
    MeshToTxt,
}

impl TempestCommand {
    pub const ALL: [TempestCommand; 11] = [
        Self::ApplyOfflineMap,
        Self::CalculateDiffNorms,
        Self::GenerateCSMesh,
        Self::GenerateGLLMetaData,
        Self::GenerateICOMesh,
        Self::GenerateLambertConfConicMesh,
        Self::GenerateOfflineMap,
        Self::GenerateOverlapMesh,
        Self::GenerateRLLMesh,
        Self::GenerateTestData,
        Self::MeshToTxt,
    ];

    /// Executable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApplyOfflineMap => "ApplyOfflineMap",
            Self::CalculateDiffNorms => "CalculateDiffNorms",
            Self::GenerateCSMesh => "GenerateCSMesh",
            Self::GenerateGLLMetaData => "GenerateGLLMetaData",
            Self::GenerateICOMesh => "GenerateICOMesh",
            Self::GenerateLambertConfConicMesh => "GenerateLambertConfConicMesh",
            Self::GenerateOfflineMap => "GenerateOfflineMap",
            Self::GenerateOverlapMesh => "GenerateOverlapMesh",
            Self::GenerateRLLMesh => "GenerateRLLMesh",
            Self::GenerateTestData => "GenerateTestData",
            Self::MeshToTxt => "MeshToTxt",
        }
    }

    /// Flags taking one value each, in command-line order.
    pub fn flags(&self) -> &'static [&'static str] {
        match self {
            Self::GenerateCSMesh => &["--res", "--file"],
            Self::GenerateOfflineMap => &["--in_mesh", "--out_mesh", "--ov_mesh", "--in_data", "--out_data"],
            Self::GenerateOverlapMesh => &["--a", "--b", "--out"],
            Self::GenerateRLLMesh => &["--lat", "--lon", "--file"],
            Self::GenerateTestData => &["--mesh", "--np", "--test", "--out"],
            _ => &[],
        }
    }

    /// Command-line template with one `{}` per flag value.
    pub fn template(&self) -> String {
        std::iter::once(self.name().to_string())
            .chain(self.flags().iter().map(|flag| format!("{} {{}}", flag)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for TempestCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A tool with its flag values filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempestInvocation {
    pub command: TempestCommand,
    pub values: Vec<String>,
    program: PathBuf,
}

impl TempestInvocation {
    /// Pair each flag of `command` with a value.
    pub fn new<S: ToString>(command: TempestCommand, values: &[S]) -> Result<Self> {
        if values.len() != command.flags().len() {
            return Err(RegridError::config(format!(
                "{} takes {} argument(s), got {}",
                command,
                command.flags().len(),
                values.len()
            )));
        }
        Ok(Self {
            command,
            values: values.iter().map(ToString::to_string).collect(),
            program: PathBuf::from(command.name()),
        })
    }

    /// Regular lat-lon mesh of `lat` by `lon` cells written to `file`.
    pub fn rll_mesh(lat: usize, lon: usize, file: &Path) -> Self {
        Self {
            command: TempestCommand::GenerateRLLMesh,
            values: vec![lat.to_string(), lon.to_string(), file.display().to_string()],
            program: PathBuf::from(TempestCommand::GenerateRLLMesh.name()),
        }
    }

    /// Run a different executable, e.g. one outside `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self) -> Vec<String> {
        self.command
            .flags()
            .iter()
            .zip(&self.values)
            .flat_map(|(flag, value)| [flag.to_string(), value.clone()])
            .collect()
    }

    /// The command line as it would be typed.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the tool and wait for it.
    pub fn run(&self) -> Result<()> {
        let cmd_line = self.command_line();
        info!(command = %cmd_line, "Running mesh generator");

        let output = Command::new(&self.program)
            .args(self.args())
            .output()
            .map_err(|e| {
                RegridError::backend(
                    self.command.name(),
                    e.raw_os_error().unwrap_or(-1),
                    format!("failed to run {}: {}", cmd_line, e),
                )
            })?;

        if !output.status.success() {
            return Err(RegridError::backend(
                self.command.name(),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Mesh generator finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates() {
        assert_eq!(
            TempestCommand::GenerateRLLMesh.template(),
            "GenerateRLLMesh --lat {} --lon {} --file {}"
        );
        assert_eq!(
            TempestCommand::GenerateOfflineMap.template(),
            "GenerateOfflineMap --in_mesh {} --out_mesh {} --ov_mesh {} --in_data {} --out_data {}"
        );
        assert_eq!(TempestCommand::MeshToTxt.template(), "MeshToTxt");
        assert_eq!(TempestCommand::ALL.len(), 11);
    }

    #[test]
    fn test_rll_mesh_command_line() {
        let inv = TempestInvocation::rll_mesh(RLL_MESH_LAT, RLL_MESH_LON, Path::new("/data/outRLLMesh.g"));
        assert_eq!(
            inv.command_line(),
            "GenerateRLLMesh --lat 180 --lon 360 --file /data/outRLLMesh.g"
        );
    }

    #[test]
    fn test_argument_count_checked() {
        assert!(TempestInvocation::new(TempestCommand::GenerateOverlapMesh, &["a.g", "b.g"]).is_err());
        let inv = TempestInvocation::new(TempestCommand::GenerateCSMesh, &["30", "cs.g"]).unwrap();
        assert_eq!(inv.args(), vec!["--res", "30", "--file", "cs.g"]);
    }

    #[test]
    fn test_missing_program_is_backend_error() {
        let inv = TempestInvocation::rll_mesh(2, 4, Path::new("mesh.g"))
            .with_program("/nonexistent/GenerateRLLMesh");
        let err = inv.run().unwrap_err();
        assert!(matches!(err, RegridError::Backend { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_backend_error() {
        let inv = TempestInvocation::rll_mesh(2, 4, Path::new("mesh.g")).with_program("false");
        match inv.run() {
            Err(RegridError::Backend { code, backend, .. }) => {
                assert_eq!(code, 1);
                assert_eq!(backend, "GenerateRLLMesh");
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }
}
