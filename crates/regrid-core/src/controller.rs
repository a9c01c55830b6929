//! Strategy selection and top-level run.

use std::path::Path;

use netcdf_io::{DatasetOpener, DatasetWriter, NetCdfResult};
use tracing::{info, warn};

use crate::backend::mesh::{generated_metadata, GridDescription, MeshOptions, WeightGenerator};
use crate::backend::tempest::{TempestInvocation, RLL_MESH_FILE, RLL_MESH_LAT, RLL_MESH_LON};
use crate::config::RegridConfig;
use crate::driver::{build_pool, process_fields, WeightContext};
use crate::error::{RegridError, Result};
use crate::grid::DestinationGrid;
use crate::map::{read_map, GridCoordinates, MapMetadata, SparseMap};
use crate::plan::TraversalTable;
use crate::schema::{define_schema, write_grid, Provenance, SchemaSummary};

/// Name reported when the mesh-interpolation back-end is missing.
pub const MESH_LIBRARY: &str = "mesh-interpolation library";

/// Where the weights of a run come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Precomputed mapping file.
    WeightFile,
    /// Weights computed in-process from source and destination grids.
    MeshLibrary,
    /// External mesh-generation toolchain.
    MeshGeneration,
}

impl Strategy {
    /// Select the single strategy the configuration asks for.
    pub fn select(config: &RegridConfig) -> Result<Self> {
        let weight_file = config.map.is_some();
        let mesh_library = config.grid_src.is_some() && config.grid_dst.is_some();
        let mesh_generation = config.tempest_dir.is_some() && !weight_file;

        if weight_file && mesh_library {
            return Err(RegridError::config(
                "a mapping file and source/destination grids were both given; choose one",
            ));
        }
        if mesh_library && mesh_generation {
            return Err(RegridError::config(
                "source/destination grids and a mesh-generation directory were both given; choose one",
            ));
        }

        if weight_file {
            Ok(Self::WeightFile)
        } else if mesh_library {
            Ok(Self::MeshLibrary)
        } else if mesh_generation {
            Ok(Self::MeshGeneration)
        } else {
            Err(RegridError::config(
                "no regridding strategy configured: give a mapping file, source and destination grids, or DATA_TEMPEST",
            ))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightFile => "weight-file",
            Self::MeshLibrary => "mesh-library",
            Self::MeshGeneration => "mesh-generation",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunOutcome<W> {
    pub strategy: Strategy,
    /// Layout counts; absent for mesh generation.
    pub summary: Option<SchemaSummary>,
    /// Fields written to the output.
    pub fields: usize,
    /// The output dataset, once finished.
    pub output: Option<W>,
}

/// Top-level entry point of a regridding run.
pub struct Regridder<'a> {
    config: &'a RegridConfig,
    opener: &'a dyn DatasetOpener,
    generator: Option<&'a dyn WeightGenerator>,
    mesh_options: MeshOptions,
}

impl<'a> Regridder<'a> {
    pub fn new(config: &'a RegridConfig, opener: &'a dyn DatasetOpener) -> Self {
        Self {
            config,
            opener,
            generator: None,
            mesh_options: MeshOptions::default(),
        }
    }

    /// Enable the mesh-library strategy.
    pub fn with_generator(mut self, generator: &'a dyn WeightGenerator, options: MeshOptions) -> Self {
        self.generator = Some(generator);
        self.mesh_options = options;
        self
    }

    /// Run the selected strategy. `create_output` is called once, only by
    /// strategies that write a dataset.
    pub fn run<W, F>(&self, create_output: F) -> Result<RunOutcome<W>>
    where
        W: DatasetWriter,
        F: FnOnce(&Path) -> NetCdfResult<W>,
    {
        self.config.validate()?;
        let strategy = Strategy::select(self.config)?;
        info!(strategy = %strategy, threshold = %self.config.threshold, "Starting regrid");

        match strategy {
            Strategy::WeightFile => {
                let path = self.config.map.as_deref().ok_or_else(|| RegridError::config("no mapping file"))?;
                let map = read_map(self.opener.open(path)?.as_ref())?;
                let provenance = Provenance {
                    mapping_file: Some(path.display().to_string()),
                    source_file: self.input()?.display().to_string(),
                };
                self.apply(
                    strategy,
                    &map.metadata,
                    &map.sparse,
                    &map.destination,
                    &self.config.extract,
                    provenance,
                    create_output,
                )
            }
            Strategy::MeshLibrary => {
                let generator = self
                    .generator
                    .ok_or_else(|| RegridError::BackendUnavailable(MESH_LIBRARY.to_string()))?;
                let (src, dst) = match (&self.config.grid_src, &self.config.grid_dst) {
                    (Some(src), Some(dst)) => (self.read_grid(src)?, self.read_grid(dst)?),
                    _ => return Err(RegridError::config("source and destination grids are required")),
                };
                let sparse = generator.compute_weights(&src, &dst, &self.mesh_options)?;
                sparse.check_bounds(src.size(), dst.size())?;
                let metadata = generated_metadata(&src, &dst, &self.mesh_options, sparse.len())?;
                info!(generator = generator.name(), links = sparse.len(), "Computed weights");

                let extract = if self.config.extract.is_empty() {
                    vec![self.config.variable.clone()]
                } else {
                    self.config.extract.clone()
                };
                let provenance = Provenance {
                    mapping_file: None,
                    source_file: self.input()?.display().to_string(),
                };
                self.apply(
                    strategy,
                    &metadata,
                    &sparse,
                    &dst.coordinates(),
                    &extract,
                    provenance,
                    create_output,
                )
            }
            Strategy::MeshGeneration => {
                let file = self.config.tempest_dir_or_default().join(RLL_MESH_FILE);
                TempestInvocation::rll_mesh(RLL_MESH_LAT, RLL_MESH_LON, &file).run()?;
                info!(mesh = %file.display(), "Generated mesh");
                Ok(RunOutcome {
                    strategy,
                    summary: None,
                    fields: 0,
                    output: None,
                })
            }
        }
    }

    fn input(&self) -> Result<&Path> {
        self.config
            .input
            .as_deref()
            .ok_or_else(|| RegridError::config("no input dataset given"))
    }

    fn read_grid(&self, path: &Path) -> Result<GridDescription> {
        GridDescription::read_scrip(self.opener.open(path)?.as_ref())
    }

    /// Lay out the output and regrid every selected field.
    #[allow(clippy::too_many_arguments)]
    fn apply<W, F>(
        &self,
        strategy: Strategy,
        metadata: &MapMetadata,
        sparse: &SparseMap,
        destination: &GridCoordinates,
        extract: &[String],
        provenance: Provenance,
        create_output: F,
    ) -> Result<RunOutcome<W>>
    where
        W: DatasetWriter,
        F: FnOnce(&Path) -> NetCdfResult<W>,
    {
        let input = self.input()?;
        let output_path = self
            .config
            .output
            .as_deref()
            .ok_or_else(|| RegridError::config("no output dataset given"))?;
        let names = &self.config.names;

        info!(conversion = %metadata.conversion, "Grid conversion");
        let grid = DestinationGrid::derive(metadata, destination)?;

        let mut table = {
            let reader = self.opener.open(input)?;
            TraversalTable::from_reader(reader.as_ref(), extract)?
        };
        let counts = table.plan(names, metadata.conversion);
        if counts.regridded == 0 {
            warn!(input = %input.display(), "Output will hold no regridded fields");
        }

        let mut output = create_output(output_path)?;
        let summary = define_schema(&mut output, &table, counts, &grid, names, &provenance)?;
        write_grid(&mut output, &grid, names)?;

        let pool = build_pool(self.config.threads)?;
        let weights = WeightContext {
            map: sparse,
            src_grid_size: metadata.src_grid_size,
            dst_grid_size: metadata.dst_grid_size,
            threshold: self.config.threshold,
        };
        let fields = process_fields(&pool, self.opener, input, &mut output, &table, weights)?;

        info!(output = %output_path.display(), fields, "Regrid complete");
        Ok(RunOutcome {
            strategy,
            summary: Some(summary),
            fields,
            output: Some(output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_io::{MemoryCatalog, MemoryDataset};

    fn config() -> RegridConfig {
        RegridConfig::default()
    }

    #[test]
    fn test_select_weight_file() {
        let mut cfg = config();
        cfg.map = Some("map.nc".into());
        assert_eq!(Strategy::select(&cfg).unwrap(), Strategy::WeightFile);

        // Mesh generation is ignored once a mapping file is given
        cfg.tempest_dir = Some("/data".into());
        assert_eq!(Strategy::select(&cfg).unwrap(), Strategy::WeightFile);
    }

    #[test]
    fn test_select_mesh_strategies() {
        let mut cfg = config();
        cfg.grid_src = Some("src.nc".into());
        assert!(Strategy::select(&cfg).is_err());
        cfg.grid_dst = Some("dst.nc".into());
        assert_eq!(Strategy::select(&cfg).unwrap(), Strategy::MeshLibrary);

        let mut cfg = config();
        cfg.tempest_dir = Some("/data".into());
        assert_eq!(Strategy::select(&cfg).unwrap(), Strategy::MeshGeneration);
    }

    #[test]
    fn test_ambiguous_selection_rejected() {
        let mut cfg = config();
        cfg.map = Some("map.nc".into());
        cfg.grid_src = Some("src.nc".into());
        cfg.grid_dst = Some("dst.nc".into());
        assert!(matches!(Strategy::select(&cfg), Err(RegridError::Config(_))));

        let mut cfg = config();
        cfg.grid_src = Some("src.nc".into());
        cfg.grid_dst = Some("dst.nc".into());
        cfg.tempest_dir = Some("/data".into());
        assert!(matches!(Strategy::select(&cfg), Err(RegridError::Config(_))));

        assert!(matches!(Strategy::select(&config()), Err(RegridError::Config(_))));
    }

    #[test]
    fn test_mesh_library_without_generator() {
        let mut cfg = config();
        cfg.grid_src = Some("src.nc".into());
        cfg.grid_dst = Some("dst.nc".into());
        let catalog = MemoryCatalog::new();
        let result = Regridder::new(&cfg, &catalog).run(|_| Ok(MemoryDataset::new("out.nc")));
        assert!(matches!(result, Err(RegridError::BackendUnavailable(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected_before_io() {
        let mut cfg = config();
        cfg.map = Some("map.nc".into());
        cfg.threshold = crate::config::WeightThreshold::Threshold(1.5);
        let catalog = MemoryCatalog::new();
        let result = Regridder::new(&cfg, &catalog).run(|_| Ok(MemoryDataset::new("out.nc")));
        assert!(matches!(result, Err(RegridError::Config(_))));
    }
}
