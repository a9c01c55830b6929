//! Weight generation from grid descriptions.
//!
//! A [`WeightGenerator`] turns a source and a destination grid into the same
//! [`SparseMap`] a mapping file provides, so generated weights go through
//! the regular grid, schema and kernel path. Grids are read from SCRIP grid
//! description files.

use netcdf_io::{AttrValue, DatasetReader};
use tracing::debug;

use crate::error::{RegridError, Result};
use crate::map::{
    grid_dims, GridConversion, GridCoordinates, MapConvention, MapMetadata, MapMethod, Normalization, SparseMap,
};

/// Interpolation method requested from a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshMethod {
    #[default]
    Bilinear,
    Conservative,
}

impl MeshMethod {
    pub fn map_method(&self) -> MapMethod {
        match self {
            Self::Bilinear => MapMethod::Bilinear,
            Self::Conservative => MapMethod::Conservative,
        }
    }
}

/// Treatment of destination points poleward of the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoleMethod {
    /// Average of all source points around the pole.
    #[default]
    AllAvg,
}

/// Treatment of destination points not covered by the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedAction {
    /// Fail the weight computation.
    #[default]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshOptions {
    pub method: MeshMethod,
    pub pole: PoleMethod,
    pub unmapped: UnmappedAction,
}

/// Computes interpolation weights between two grids.
pub trait WeightGenerator: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    fn compute_weights(
        &self,
        src: &GridDescription,
        dst: &GridDescription,
        options: &MeshOptions,
    ) -> Result<SparseMap>;
}

/// A grid read from a SCRIP grid description file. Angles are in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDescription {
    pub location: String,
    /// Per-axis sizes, longitude first for rectangular grids.
    pub dims: Vec<usize>,
    pub corners: usize,
    pub center_lat: Vec<f64>,
    pub center_lon: Vec<f64>,
    /// `[size, corners]`
    pub corner_lat: Vec<f64>,
    /// `[size, corners]`
    pub corner_lon: Vec<f64>,
    pub area: Option<Vec<f64>>,
}

impl GridDescription {
    /// Read a SCRIP grid description.
    pub fn read_scrip(reader: &dyn DatasetReader) -> Result<Self> {
        let size = reader.require_dimension("grid_size")?;
        let corners = reader.require_dimension("grid_corners")?;
        let rank = reader.require_dimension("grid_rank")?;

        let stored = reader.read_f64("grid_dims")?;
        let dims = grid_dims(&stored[..rank.min(stored.len())], "grid_dims")?;
        if dims.len() != rank || dims.iter().product::<usize>() != size {
            return Err(RegridError::config(format!(
                "grid_dims {:?} of {} do not describe {} cells",
                dims,
                reader.location(),
                size
            )));
        }

        let grid = Self {
            location: reader.location(),
            dims,
            corners,
            center_lat: read_degrees(reader, "grid_center_lat", size)?,
            center_lon: read_degrees(reader, "grid_center_lon", size)?,
            corner_lat: read_degrees(reader, "grid_corner_lat", size * corners)?,
            corner_lon: read_degrees(reader, "grid_corner_lon", size * corners)?,
            area: match reader.variable("grid_area") {
                Some(_) => Some(reader.read_f64("grid_area")?),
                None => None,
            },
        };
        debug!(grid = %grid.location, size, corners, rank, "Read grid description");
        Ok(grid)
    }

    pub fn size(&self) -> usize {
        self.center_lat.len()
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Cell areas in steradians, derived from the corner extents when the
    /// file carries none.
    pub fn cell_areas(&self) -> Vec<f64> {
        if let Some(area) = &self.area {
            return area.clone();
        }
        (0..self.size())
            .map(|i| {
                let lats = &self.corner_lat[i * self.corners..(i + 1) * self.corners];
                let lons = &self.corner_lon[i * self.corners..(i + 1) * self.corners];
                let (lat_min, lat_max) = extent(lats);
                let (lon_min, lon_max) = extent(lons);
                (lon_max - lon_min).to_radians() * (lat_max.to_radians().sin() - lat_min.to_radians().sin())
            })
            .collect()
    }

    /// The grid as destination coordinates.
    pub fn coordinates(&self) -> GridCoordinates {
        GridCoordinates {
            area: self.cell_areas(),
            center_lon: self.center_lon.clone(),
            center_lat: self.center_lat.clone(),
            corner_lon: self.corner_lon.clone(),
            corner_lat: self.corner_lat.clone(),
        }
    }
}

fn extent(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn read_degrees(reader: &dyn DatasetReader, name: &str, count: usize) -> Result<Vec<f64>> {
    let info = reader.require_variable(name)?;
    let values = reader.read_f64(name)?;
    if values.len() != count {
        return Err(RegridError::config(format!(
            "{} holds {} values, expected {}",
            name,
            values.len(),
            count
        )));
    }
    let radians = matches!(info.attribute("units").and_then(AttrValue::as_text), Some(u) if u.starts_with("radian"));
    Ok(if radians {
        values.into_iter().map(f64::to_degrees).collect()
    } else {
        values
    })
}

/// Metadata describing generated weights in the same terms as a mapping file.
pub fn generated_metadata(
    src: &GridDescription,
    dst: &GridDescription,
    options: &MeshOptions,
    links: usize,
) -> Result<MapMetadata> {
    let metadata = MapMetadata {
        convention: MapConvention::Scrip,
        normalization: Normalization::DestArea,
        method: options.method.map_method(),
        src_grid_size: src.size(),
        dst_grid_size: dst.size(),
        src_grid_corners: src.corners,
        dst_grid_corners: dst.corners,
        src_grid_rank: src.rank(),
        dst_grid_rank: dst.rank(),
        num_links: links,
        num_wgts: 1,
        src_grid_dims: src.dims.clone(),
        dst_grid_dims: dst.dims.clone(),
        conversion: GridConversion::from_ranks(src.rank(), dst.rank())?,
    };
    metadata.validate()?;
    Ok(metadata)
}
