//! Weight-based regridding of gridded datasets.
//!
//! Moves every horizontal field of a dataset from a source grid to a
//! destination grid by applying a sparse matrix of precomputed weights.
//! Missing values are tracked per destination cell, and cells can optionally
//! be renormalized by the weight of their valid contributors.
//!
//! # Architecture
//!
//! ```text
//! Regridder::run
//!      │
//!      ├─► Strategy::select (mapping file │ grid pair │ mesh generation)
//!      │
//!      ├─► read_map ──────────► MapMetadata + SparseMap + GridCoordinates
//!      │        (or WeightGenerator::compute_weights)
//!      │
//!      ├─► DestinationGrid::derive
//!      │         └─► LatitudeGrid::diagnose ──► quadrature weights
//!      │
//!      ├─► TraversalTable::plan ──► FieldPlan per variable
//!      │
//!      ├─► define_schema + write_grid
//!      │
//!      └─► process_fields (rayon pool)
//!               ├─► Regrid: apply_weights, level by level
//!               └─► Copy: values passed through
//! ```
//!
//! # Example
//!
//! ```ignore
//! use netcdf_io::{NetCdfOpener, NetCdfWriter};
//! use regrid_core::{RegridConfig, Regridder};
//!
//! let mut config = RegridConfig::from_env()?;
//! config.map = Some("map_ne30np4_to_fv129x256.nc".into());
//! config.input = Some("in.nc".into());
//! config.output = Some("out.nc".into());
//!
//! let outcome = Regridder::new(&config, &NetCdfOpener).run(|path| NetCdfWriter::create(path))?;
//! println!("{} fields written", outcome.fields);
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod gaussian;
pub mod grid;
pub mod kernel;
pub mod map;
pub mod plan;
pub mod schema;

// Re-export commonly used types at crate root
pub use backend::{
    GridDescription, MeshMethod, MeshOptions, PoleMethod, TempestCommand, TempestInvocation, UnmappedAction,
    WeightGenerator,
};
pub use config::{RegridConfig, RegridNames, WeightThreshold};
pub use controller::{Regridder, RunOutcome, Strategy};
pub use driver::{build_pool, process_fields, WeightContext};
pub use error::{RegridError, Result};
pub use gaussian::{bessel_zeros, gaussian_latitudes};
pub use grid::{DestinationGrid, LatitudeGrid, RectangularGrid, UnstructuredGrid};
pub use kernel::apply_weights;
pub use map::{
    read_map, GridConversion, GridCoordinates, MapConvention, MapFile, MapMetadata, MapMethod, Normalization,
    SparseMap,
};
pub use plan::{FieldEntry, FieldPlan, PlanCounts, TraversalTable};
pub use schema::{define_schema, write_grid, Provenance, SchemaSummary};
