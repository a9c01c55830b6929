//! Destination-grid coordinates and latitude quadrature.
//!
//! Mapping files store every destination grid unrolled to 1-D: all
//! longitudes of latitude row 0, then all longitudes of row 1, and so on.
//! Unstructured destinations are used as stored. Rectangular destinations are
//! folded back into per-axis centers, interfaces and bounds, and their
//! latitude family is diagnosed to pick the quadrature weights.

use netcdf_io::Hyperslab;
use tracing::{debug, info};

use crate::error::{RegridError, Result};
use crate::gaussian::gaussian_latitudes;
use crate::map::{GridCoordinates, MapMetadata};

/// Tolerance on the quadrature weight total.
pub const WEIGHT_SUM_EPS: f64 = 1.0e-14;

// ============================================================================
// Latitude families
// ============================================================================

/// Latitude discretization of a rectangular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatitudeGrid {
    /// Gaussian latitudes used by global spectral models.
    Gaussian,
    /// Equi-angle with poles at the centers of the first and last rows.
    EquiangleCentered,
    /// Equi-angle with poles at the outer edges of the first and last rows.
    EquiangleOffset,
}

impl LatitudeGrid {
    /// Classify from the latitude centers, ascending from the south pole.
    ///
    /// The second center is compared against the closed-form prediction of
    /// each family in single precision.
    pub fn diagnose(lat_ctr: &[f64]) -> Result<Self> {
        let count = lat_ctr.len();
        if count < 2 {
            return Err(RegridError::numerical(format!(
                "cannot diagnose latitude grid from {} latitude(s)",
                count
            )));
        }
        let n = count as f64;
        let second = lat_ctr[1] as f32;

        let mut found = None;
        if second == (-90.0 + 180.0 * 1.5 / n) as f32 {
            found = Some(Self::EquiangleOffset);
        }
        if second == (-90.0 + 180.0 / (n - 1.0)) as f32 {
            found = Some(Self::EquiangleCentered);
        }
        if found.is_none() {
            let (sin_lat, _) = gaussian_latitudes(count)?;
            if second == sin_lat[1].asin().to_degrees() as f32 {
                found = Some(Self::Gaussian);
            }
        }

        let grid = found.ok_or_else(|| {
            RegridError::numerical(format!(
                "unable to diagnose latitude grid type: second latitude {} of {} matches no known family",
                lat_ctr[1], count
            ))
        })?;
        info!(lat_grid = grid.as_str(), "Diagnosed latitude grid type");
        Ok(grid)
    }

    /// Quadrature weight of every latitude row.
    ///
    /// `lat_ntf` holds the `lat_ctr.len() + 1` row interfaces.
    pub fn weights(&self, lat_ctr: &[f64], lat_ntf: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::Gaussian => Ok(gaussian_latitudes(lat_ctr.len())?.1),
            Self::EquiangleCentered => {
                if lat_ntf.len() != lat_ctr.len() + 1 {
                    return Err(RegridError::numerical(format!(
                        "{} latitude interfaces for {} rows",
                        lat_ntf.len(),
                        lat_ctr.len()
                    )));
                }
                Ok(lat_ntf
                    .windows(2)
                    .map(|w| w[1].to_radians().sin() - w[0].to_radians().sin())
                    .collect())
            }
            Self::EquiangleOffset => Ok(lat_ctr.iter().map(|lat| lat.to_radians().cos()).collect()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaussian => "Gaussian latitude grid used by global spectral models",
            Self::EquiangleCentered => {
                "Equi-angle latitude grid with poles at centers of first and last gridpoints, aka FV scalar grid"
            }
            Self::EquiangleOffset => {
                "Equi-angle latitude grid with poles at edges of first and last gridpoints, aka FV staggered velocity grid"
            }
        }
    }
}

impl std::fmt::Display for LatitudeGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fail unless the weights reach the normalized sphere total of 2.
///
/// The check is one-sided: weight families whose total exceeds 2 pass.
pub fn check_weight_sum(weights: &[f64]) -> Result<f64> {
    let total: f64 = weights.iter().sum();
    if 1.0 - total / 2.0 >= WEIGHT_SUM_EPS {
        return Err(RegridError::numerical(format!(
            "latitude weights sum to {} instead of 2.0",
            total
        )));
    }
    Ok(total)
}

// ============================================================================
// Destination grids
// ============================================================================

/// Unstructured destination: one column dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredGrid {
    pub col_nbr: usize,
    pub corners: usize,
    pub lon_ctr: Vec<f64>,
    pub lat_ctr: Vec<f64>,
    /// Vertex longitudes, `[col_nbr, corners]`.
    pub lon_bnd: Vec<f64>,
    /// Vertex latitudes, `[col_nbr, corners]`.
    pub lat_bnd: Vec<f64>,
    pub area: Vec<f64>,
}

/// Rectangular destination: separate latitude and longitude axes.
#[derive(Debug, Clone, PartialEq)]
pub struct RectangularGrid {
    pub lat_nbr: usize,
    pub lon_nbr: usize,
    pub lat_ctr: Vec<f64>,
    pub lon_ctr: Vec<f64>,
    /// Row interfaces, `lat_nbr + 1` values.
    pub lat_ntf: Vec<f64>,
    /// Column interfaces, `lon_nbr + 1` values.
    pub lon_ntf: Vec<f64>,
    /// Row bounds, `[lat_nbr, 2]`.
    pub lat_bnd: Vec<f64>,
    /// Column bounds, `[lon_nbr, 2]`.
    pub lon_bnd: Vec<f64>,
    pub lat_grid: LatitudeGrid,
    /// Quadrature weights, one per row.
    pub lat_wgt: Vec<f64>,
    /// Cell areas, `[lat_nbr, lon_nbr]`.
    pub area: Vec<f64>,
}

/// Coordinates of the destination grid.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationGrid {
    Unstructured(UnstructuredGrid),
    Rectangular(RectangularGrid),
}

impl DestinationGrid {
    /// Build the destination grid from the arrays stored in a mapping file.
    pub fn derive(metadata: &MapMetadata, coords: &GridCoordinates) -> Result<Self> {
        let size = metadata.dst_grid_size;
        let corners = metadata.dst_grid_corners;
        check_len("destination area", &coords.area, size)?;
        check_len("destination center longitudes", &coords.center_lon, size)?;
        check_len("destination center latitudes", &coords.center_lat, size)?;
        check_len("destination corner longitudes", &coords.corner_lon, size * corners)?;
        check_len("destination corner latitudes", &coords.corner_lat, size * corners)?;

        if metadata.conversion.destination_unstructured() {
            debug!(col_nbr = size, corners, "Using unstructured destination grid");
            return Ok(Self::Unstructured(UnstructuredGrid {
                col_nbr: size,
                corners,
                lon_ctr: coords.center_lon.clone(),
                lat_ctr: coords.center_lat.clone(),
                lon_bnd: coords.corner_lon.clone(),
                lat_bnd: coords.corner_lat.clone(),
                area: coords.area.clone(),
            }));
        }

        let (lon_nbr, lat_nbr) = match metadata.dst_grid_dims.as_slice() {
            [lon, lat] => (*lon, *lat),
            dims => {
                return Err(RegridError::config(format!(
                    "rectangular destination needs two grid dimensions, found {:?}",
                    dims
                )))
            }
        };
        Self::rectangular(lat_nbr, lon_nbr, corners, coords).map(Self::Rectangular)
    }

    fn rectangular(
        lat_nbr: usize,
        lon_nbr: usize,
        corners: usize,
        coords: &GridCoordinates,
    ) -> Result<RectangularGrid> {
        // The closing interfaces come from the eastern and northern corners
        if corners < 2 {
            return Err(RegridError::config(format!(
                "rectangular destination needs at least 2 corners per cell, found {}",
                corners
            )));
        }
        let ctr_shape = [lat_nbr, lon_nbr];
        let crn_shape = [lat_nbr, lon_nbr, corners];

        // First row for longitudes, first column for latitudes
        let lon_ctr = Hyperslab::contiguous(&[0, 0], &[1, lon_nbr]).extract(&coords.center_lon, &ctr_shape)?;
        let lat_ctr = Hyperslab::contiguous(&[0, 0], &[lat_nbr, 1]).extract(&coords.center_lat, &ctr_shape)?;
        let lon_crn =
            Hyperslab::contiguous(&[0, 0, 0], &[1, lon_nbr, corners]).extract(&coords.corner_lon, &crn_shape)?;
        let lat_crn =
            Hyperslab::contiguous(&[0, 0, 0], &[lat_nbr, 1, corners]).extract(&coords.corner_lat, &crn_shape)?;

        // Western corner of each column plus the eastern corner of the last
        let mut lon_ntf: Vec<f64> = (0..lon_nbr).map(|i| lon_crn[corners * i]).collect();
        lon_ntf.push(lon_crn[corners * lon_nbr - (corners - 1)]);
        // Southern corner of each row plus the northern corner of the last
        let mut lat_ntf: Vec<f64> = (0..lat_nbr).map(|i| lat_crn[corners * i]).collect();
        lat_ntf.push(lat_crn[corners * lat_nbr - 1]);

        let lon_bnd = interface_bounds(&lon_ntf);
        let lat_bnd = interface_bounds(&lat_ntf);

        let lat_grid = LatitudeGrid::diagnose(&lat_ctr)?;
        let lat_wgt = lat_grid.weights(&lat_ctr, &lat_ntf)?;
        let lat_wgt_ttl = check_weight_sum(&lat_wgt)?;
        let area_ttl: f64 = coords.area.iter().sum();
        info!(lat_nbr, lon_nbr, lat_wgt_ttl, area_ttl, "Derived rectangular destination grid");

        Ok(RectangularGrid {
            lat_nbr,
            lon_nbr,
            lat_ctr,
            lon_ctr,
            lat_ntf,
            lon_ntf,
            lat_bnd,
            lon_bnd,
            lat_grid,
            lat_wgt,
            area: coords.area.clone(),
        })
    }

    /// Number of destination cells.
    pub fn size(&self) -> usize {
        match self {
            Self::Unstructured(g) => g.col_nbr,
            Self::Rectangular(g) => g.lat_nbr * g.lon_nbr,
        }
    }

    /// Length of the bounds dimension: vertex count or 2.
    pub fn bounds_len(&self) -> usize {
        match self {
            Self::Unstructured(g) => g.corners,
            Self::Rectangular(_) => 2,
        }
    }
}

fn interface_bounds(ntf: &[f64]) -> Vec<f64> {
    ntf.windows(2).flat_map(|w| [w[0], w[1]]).collect()
}

fn check_len(what: &str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(RegridError::config(format!(
            "{} hold {} values, expected {}",
            what,
            values.len(),
            expected
        )));
    }
    Ok(())
}
