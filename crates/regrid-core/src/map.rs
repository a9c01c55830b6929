//! Mapping-file reader.
//!
//! A mapping file stores a sparse linear operator from a source grid to a
//! destination grid as triplets (source address, destination address, weight)
//! together with enough of the destination grid to rebuild its coordinates.
//! Two authoring conventions are understood:
//!
//! | semantic field        | SCRIP                 | ESMF     |
//! |-----------------------|-----------------------|----------|
//! | source grid size      | `src_grid_size`       | `n_a`    |
//! | destination grid size | `dst_grid_size`       | `n_b`    |
//! | links                 | `num_links`           | `n_s`    |
//! | weights               | `remap_matrix`        | `S`      |
//! | destination address   | `dst_address`         | `row`    |
//! | source address        | `src_address`         | `col`    |
//!
//! Addresses are 1-based on disk and 0-based once loaded.

use netcdf_io::{DatasetReader, Hyperslab};
use tracing::{debug, info};

use crate::error::{RegridError, Result};

/// Global attributes searched, in order, for the authoring convention.
pub const CONVENTION_ATTRS: [&str; 2] = ["Conventions", "conventions"];

/// Global attribute recording the normalization used to build the weights.
pub const NORMALIZATION_ATTR: &str = "normalization";

/// Global attribute recording the interpolation method.
pub const METHOD_ATTR: &str = "map_method";

/// Convention-specific names of the dimensions and variables of a mapping file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapNames {
    pub src_grid_size: &'static str,
    pub dst_grid_size: &'static str,
    pub src_grid_corners: &'static str,
    pub dst_grid_corners: &'static str,
    pub src_grid_rank: &'static str,
    pub dst_grid_rank: &'static str,
    pub num_links: &'static str,
    pub num_wgts: &'static str,
    pub dst_area: &'static str,
    pub dst_center_lon: &'static str,
    pub dst_center_lat: &'static str,
    pub dst_corner_lon: &'static str,
    pub dst_corner_lat: &'static str,
    pub dst_address: &'static str,
    pub src_address: &'static str,
    pub weights: &'static str,
    pub src_grid_dims: &'static str,
    pub dst_grid_dims: &'static str,
}

static SCRIP_NAMES: MapNames = MapNames {
    src_grid_size: "src_grid_size",
    dst_grid_size: "dst_grid_size",
    src_grid_corners: "src_grid_corners",
    dst_grid_corners: "dst_grid_corners",
    src_grid_rank: "src_grid_rank",
    dst_grid_rank: "dst_grid_rank",
    num_links: "num_links",
    num_wgts: "num_wgts",
    dst_area: "dst_grid_area",
    dst_center_lon: "dst_grid_center_lon",
    dst_center_lat: "dst_grid_center_lat",
    dst_corner_lon: "dst_grid_corner_lon",
    dst_corner_lat: "dst_grid_corner_lat",
    dst_address: "dst_address",
    src_address: "src_address",
    weights: "remap_matrix",
    src_grid_dims: "src_grid_dims",
    dst_grid_dims: "dst_grid_dims",
};

static ESMF_NAMES: MapNames = MapNames {
    src_grid_size: "n_a",
    dst_grid_size: "n_b",
    src_grid_corners: "nv_a",
    dst_grid_corners: "nv_b",
    src_grid_rank: "src_grid_rank",
    dst_grid_rank: "dst_grid_rank",
    num_links: "n_s",
    num_wgts: "num_wgts",
    dst_area: "area_b",
    dst_center_lon: "xc_b",
    dst_center_lat: "yc_b",
    dst_corner_lon: "xv_b",
    dst_corner_lat: "yv_b",
    dst_address: "row",
    src_address: "col",
    weights: "S",
    src_grid_dims: "src_grid_dims",
    dst_grid_dims: "dst_grid_dims",
};

/// Authoring convention of a mapping file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapConvention {
    /// Written by SCRIP (`Conventions = "SCRIP"`).
    Scrip,
    /// Written by ESMF_RegridWeightGen (`Conventions = "NCAR-CSM"`).
    Esmf,
}

impl MapConvention {
    /// Detect the convention from the text of the conventions attribute.
    ///
    /// A "SCRIP" signature wins over "NCAR-CSM" when both appear.
    pub fn detect(conventions: &str) -> Option<Self> {
        let mut found = None;
        if conventions.contains("NCAR-CSM") {
            found = Some(Self::Esmf);
        }
        if conventions.contains("SCRIP") {
            found = Some(Self::Scrip);
        }
        found
    }

    /// Field-name table for this convention.
    pub fn names(&self) -> &'static MapNames {
        match self {
            Self::Scrip => &SCRIP_NAMES,
            Self::Esmf => &ESMF_NAMES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrip => "SCRIP",
            Self::Esmf => "ESMF",
        }
    }
}

impl std::fmt::Display for MapConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalization recorded in the mapping file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    FracArea,
    DestArea,
    None,
}

impl Normalization {
    /// Detect by substring; later signatures take precedence.
    pub fn detect(text: &str) -> Option<Self> {
        let mut found = None;
        if text.contains("fracarea") {
            found = Some(Self::FracArea);
        }
        if text.contains("destarea") {
            found = Some(Self::DestArea);
        }
        if text.contains("none") {
            found = Some(Self::None);
        }
        found
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FracArea => "fracarea",
            Self::DestArea => "destarea",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interpolation method recorded in the mapping file. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMethod {
    Conservative,
    Bilinear,
    None,
}

impl MapMethod {
    /// Detect by substring; later signatures take precedence.
    pub fn detect(text: &str) -> Option<Self> {
        let mut found = None;
        if text.contains("Conservative remapping") {
            found = Some(Self::Conservative);
        }
        if text.contains("Bilinear remapping") {
            found = Some(Self::Bilinear);
        }
        if text.contains("none") {
            found = Some(Self::None);
        }
        found
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "Conservative remapping",
            Self::Bilinear => "Bilinear remapping",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for MapMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape change between source and destination grids.
///
/// Rank 1 grids are unstructured (a single column dimension), rank 2 grids
/// are rectangular latitude/longitude grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridConversion {
    OneToOne,
    OneToTwo,
    TwoToOne,
    TwoToTwo,
}

impl GridConversion {
    pub fn from_ranks(src_rank: usize, dst_rank: usize) -> Result<Self> {
        match (src_rank, dst_rank) {
            (1, 1) => Ok(Self::OneToOne),
            (1, 2) => Ok(Self::OneToTwo),
            (2, 1) => Ok(Self::TwoToOne),
            (2, 2) => Ok(Self::TwoToTwo),
            _ => Err(RegridError::config(format!(
                "unsupported grid conversion: source rank {}, destination rank {}",
                src_rank, dst_rank
            ))),
        }
    }

    pub fn source_rank(&self) -> usize {
        match self {
            Self::OneToOne | Self::OneToTwo => 1,
            Self::TwoToOne | Self::TwoToTwo => 2,
        }
    }

    pub fn destination_rank(&self) -> usize {
        match self {
            Self::OneToOne | Self::TwoToOne => 1,
            Self::OneToTwo | Self::TwoToTwo => 2,
        }
    }

    /// Destination is a single column dimension.
    pub fn destination_unstructured(&self) -> bool {
        self.destination_rank() == 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "1D_to_1D",
            Self::OneToTwo => "1D_to_2D",
            Self::TwoToOne => "2D_to_1D",
            Self::TwoToTwo => "2D_to_2D",
        }
    }
}

impl std::fmt::Display for GridConversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sizes and conventions of a mapping file.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMetadata {
    pub convention: MapConvention,
    pub normalization: Normalization,
    pub method: MapMethod,
    pub src_grid_size: usize,
    pub dst_grid_size: usize,
    pub src_grid_corners: usize,
    pub dst_grid_corners: usize,
    pub src_grid_rank: usize,
    pub dst_grid_rank: usize,
    pub num_links: usize,
    pub num_wgts: usize,
    /// Per-axis sizes of the source grid, longitude first for rank 2.
    pub src_grid_dims: Vec<usize>,
    /// Per-axis sizes of the destination grid, longitude first for rank 2.
    pub dst_grid_dims: Vec<usize>,
    pub conversion: GridConversion,
}

impl MapMetadata {
    /// Check sizes against each other and against the native index range.
    pub fn validate(&self) -> Result<()> {
        let limit = i32::MAX as usize;
        if self.src_grid_size >= limit || self.dst_grid_size >= limit {
            return Err(RegridError::config(format!(
                "grid sizes {} and {} exceed the supported index range",
                self.src_grid_size, self.dst_grid_size
            )));
        }
        check_grid_dims("source", &self.src_grid_dims, self.src_grid_rank, self.src_grid_size)?;
        check_grid_dims(
            "destination",
            &self.dst_grid_dims,
            self.dst_grid_rank,
            self.dst_grid_size,
        )?;
        Ok(())
    }
}

fn check_grid_dims(which: &str, dims: &[usize], rank: usize, size: usize) -> Result<()> {
    if dims.len() != rank {
        return Err(RegridError::config(format!(
            "{} grid has rank {} but {} dimension sizes",
            which,
            rank,
            dims.len()
        )));
    }
    let product: usize = dims.iter().product();
    if product != size {
        return Err(RegridError::config(format!(
            "{} grid dimensions {:?} do not multiply to grid size {}",
            which, dims, size
        )));
    }
    Ok(())
}

/// Sparse weight matrix in coordinate form with 0-based addresses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseMap {
    pub src_address: Vec<usize>,
    pub dst_address: Vec<usize>,
    pub weights: Vec<f64>,
}

impl SparseMap {
    /// Build from 0-based addresses.
    pub fn new(src_address: Vec<usize>, dst_address: Vec<usize>, weights: Vec<f64>) -> Result<Self> {
        if src_address.len() != weights.len() || dst_address.len() != weights.len() {
            return Err(RegridError::config(format!(
                "link arrays differ in length: {} source, {} destination, {} weights",
                src_address.len(),
                dst_address.len(),
                weights.len()
            )));
        }
        Ok(Self {
            src_address,
            dst_address,
            weights,
        })
    }

    /// Build from the 1-based addresses stored in mapping files.
    pub fn from_one_based(src: &[f64], dst: &[f64], weights: Vec<f64>) -> Result<Self> {
        let src_address = rebase(src, "source")?;
        let dst_address = rebase(dst, "destination")?;
        Self::new(src_address, dst_address, weights)
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Every address must fall inside its grid.
    pub fn check_bounds(&self, src_grid_size: usize, dst_grid_size: usize) -> Result<()> {
        if let Some(bad) = self.src_address.iter().find(|&&a| a >= src_grid_size) {
            return Err(RegridError::config(format!(
                "source address {} outside grid of {} cells",
                bad + 1,
                src_grid_size
            )));
        }
        if let Some(bad) = self.dst_address.iter().find(|&&a| a >= dst_grid_size) {
            return Err(RegridError::config(format!(
                "destination address {} outside grid of {} cells",
                bad + 1,
                dst_grid_size
            )));
        }
        Ok(())
    }
}

fn rebase(addresses: &[f64], which: &str) -> Result<Vec<usize>> {
    addresses
        .iter()
        .map(|&a| {
            if a < 1.0 || a.fract() != 0.0 || !a.is_finite() {
                Err(RegridError::config(format!("invalid {} address {}", which, a)))
            } else {
                Ok(a as usize - 1)
            }
        })
        .collect()
}

/// Destination-grid arrays as stored in the mapping file, unrolled to 1-D.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridCoordinates {
    /// Cell areas, `[dst_grid_size]`.
    pub area: Vec<f64>,
    /// Cell-center longitudes, `[dst_grid_size]`.
    pub center_lon: Vec<f64>,
    /// Cell-center latitudes, `[dst_grid_size]`.
    pub center_lat: Vec<f64>,
    /// Corner longitudes, `[dst_grid_size, corners]`.
    pub corner_lon: Vec<f64>,
    /// Corner latitudes, `[dst_grid_size, corners]`.
    pub corner_lat: Vec<f64>,
}

/// Everything a run needs from a mapping file.
#[derive(Debug, Clone)]
pub struct MapFile {
    pub location: String,
    pub metadata: MapMetadata,
    pub sparse: SparseMap,
    pub destination: GridCoordinates,
}

/// Read a mapping file.
pub fn read_map(reader: &dyn DatasetReader) -> Result<MapFile> {
    let location = reader.location();
    debug!(map = %location, "Obtaining mapping weights");

    let metadata = read_metadata(reader)?;
    let names = metadata.convention.names();

    let destination = GridCoordinates {
        area: read_exact(reader, names.dst_area, metadata.dst_grid_size)?,
        center_lon: read_exact(reader, names.dst_center_lon, metadata.dst_grid_size)?,
        center_lat: read_exact(reader, names.dst_center_lat, metadata.dst_grid_size)?,
        corner_lon: read_exact(
            reader,
            names.dst_corner_lon,
            metadata.dst_grid_size * metadata.dst_grid_corners,
        )?,
        corner_lat: read_exact(
            reader,
            names.dst_corner_lat,
            metadata.dst_grid_size * metadata.dst_grid_corners,
        )?,
    };

    let weights = read_weights(reader, names.weights, metadata.num_links)?;
    let src = read_exact(reader, names.src_address, metadata.num_links)?;
    let dst = read_exact(reader, names.dst_address, metadata.num_links)?;
    let sparse = SparseMap::from_one_based(&src, &dst, weights)?;
    sparse.check_bounds(metadata.src_grid_size, metadata.dst_grid_size)?;

    info!(
        map = %location,
        convention = %metadata.convention,
        conversion = %metadata.conversion,
        links = sparse.len(),
        "Loaded mapping weights"
    );

    Ok(MapFile {
        location,
        metadata,
        sparse,
        destination,
    })
}

/// Read and validate the sizes and conventions of a mapping file.
pub fn read_metadata(reader: &dyn DatasetReader) -> Result<MapMetadata> {
    let conventions = CONVENTION_ATTRS
        .iter()
        .find_map(|name| reader.global_text(name))
        .ok_or_else(|| {
            RegridError::config("mapping file has no Conventions attribute identifying its type")
        })?;
    let convention = MapConvention::detect(&conventions).ok_or_else(|| {
        RegridError::config(format!(
            "unrecognized map-type specified in attribute Conventions = {}",
            conventions
        ))
    })?;
    let names = convention.names();

    let normalization_text = reader.global_text(NORMALIZATION_ATTR).unwrap_or_default();
    let normalization = match Normalization::detect(&normalization_text) {
        Some(Normalization::DestArea) => Normalization::DestArea,
        _ => {
            return Err(RegridError::config(format!(
                "unsupported normalization \"{}\": only destarea weights are supported",
                normalization_text
            )))
        }
    };

    let method_text = reader.global_text(METHOD_ATTR).unwrap_or_default();
    let method = MapMethod::detect(&method_text).ok_or_else(|| {
        RegridError::config(format!("unrecognized map_method \"{}\"", method_text))
    })?;

    let src_grid_rank = reader.require_dimension(names.src_grid_rank)?;
    let dst_grid_rank = reader.require_dimension(names.dst_grid_rank)?;
    let conversion = GridConversion::from_ranks(src_grid_rank, dst_grid_rank)?;

    let metadata = MapMetadata {
        convention,
        normalization,
        method,
        src_grid_size: reader.require_dimension(names.src_grid_size)?,
        dst_grid_size: reader.require_dimension(names.dst_grid_size)?,
        src_grid_corners: reader.require_dimension(names.src_grid_corners)?,
        dst_grid_corners: reader.require_dimension(names.dst_grid_corners)?,
        src_grid_rank,
        dst_grid_rank,
        num_links: reader.require_dimension(names.num_links)?,
        num_wgts: reader.require_dimension(names.num_wgts)?,
        src_grid_dims: read_grid_dims(reader, names.src_grid_dims, src_grid_rank)?,
        dst_grid_dims: read_grid_dims(reader, names.dst_grid_dims, dst_grid_rank)?,
        conversion,
    };
    metadata.validate()?;

    info!(
        map_method = %metadata.method,
        normalization = %metadata.normalization,
        src_grid_size = metadata.src_grid_size,
        dst_grid_size = metadata.dst_grid_size,
        src_grid_corners = metadata.src_grid_corners,
        dst_grid_corners = metadata.dst_grid_corners,
        src_grid_rank = metadata.src_grid_rank,
        dst_grid_rank = metadata.dst_grid_rank,
        num_links = metadata.num_links,
        num_wgts = metadata.num_wgts,
        "Regridding input metadata and grid sizes"
    );
    Ok(metadata)
}

fn read_grid_dims(reader: &dyn DatasetReader, name: &str, rank: usize) -> Result<Vec<usize>> {
    grid_dims(&read_exact(reader, name, rank)?, name)
}

/// Convert stored grid sizes to counts; each must be a positive integer.
pub(crate) fn grid_dims(values: &[f64], name: &str) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|&v| {
            if v < 1.0 || v.fract() != 0.0 {
                Err(RegridError::config(format!("invalid {} entry {}", name, v)))
            } else {
                Ok(v as usize)
            }
        })
        .collect()
}

/// Read the first `count` values of a variable, failing if it holds fewer.
fn read_exact(reader: &dyn DatasetReader, name: &str, count: usize) -> Result<Vec<f64>> {
    let mut values = reader.read_f64(name)?;
    if values.len() < count {
        return Err(RegridError::config(format!(
            "{} holds {} values, expected {}",
            name,
            values.len(),
            count
        )));
    }
    values.truncate(count);
    Ok(values)
}

/// Read the first weight of every link.
///
/// SCRIP stores `remap_matrix[num_links, num_wgts]`; only column 0 is used.
fn read_weights(reader: &dyn DatasetReader, name: &str, num_links: usize) -> Result<Vec<f64>> {
    let info = reader.require_variable(name)?;
    if info.dimensions.len() == 2 {
        let slab = Hyperslab::contiguous(&[0, 0], &[num_links, 1]);
        return Ok(reader.read_slab_f64(name, &slab)?);
    }
    read_exact(reader, name, num_links)
}
