//! Temporary file layouts for tests that go through real netCDF files.

use std::path::PathBuf;

use netcdf_io::{MemoryDataset, NetCdfResult};
use tempfile::TempDir;

use crate::fixtures::persist;

/// Creates a temporary directory for test output, removed on drop.
pub fn temp_test_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("regrid_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Mapping, input and output paths of one file-backed run.
///
/// The files live in a temporary directory that is removed when this value
/// is dropped.
#[derive(Debug)]
pub struct RunFiles {
    pub dir: TempDir,
    pub map: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl RunFiles {
    pub fn new() -> Self {
        let dir = temp_test_dir();
        Self {
            map: dir.path().join("map.nc"),
            input: dir.path().join("in.nc"),
            output: dir.path().join("out.nc"),
            dir,
        }
    }

    /// Write the mapping file and the input dataset to disk.
    pub fn write(&self, map: &MemoryDataset, input: &MemoryDataset) -> NetCdfResult<()> {
        persist(map, &self.map)?;
        persist(input, &self.input)
    }
}

impl Default for RunFiles {
    fn default() -> Self {
        Self::new()
    }
}
