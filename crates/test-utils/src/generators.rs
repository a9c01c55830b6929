//! Generators for synthetic grids and fields.
//!
//! Rectangular grids are unrolled the way mapping files store them: all
//! longitudes of the southernmost row first. Cell corners run
//! counterclockwise from the south-west corner.

/// Evenly spaced values `start, start + step, ...`.
///
/// # Example
///
/// ```
/// use test_utils::ramp;
///
/// assert_eq!(ramp(3, 1.0, 0.5), vec![1.0, 1.5, 2.0]);
/// ```
pub fn ramp(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Row interfaces of an equi-angle grid with the poles on the outer edges.
pub fn offset_latitude_interfaces(lat_nbr: usize) -> Vec<f64> {
    ramp(lat_nbr + 1, -90.0, 180.0 / lat_nbr as f64)
}

/// Row interfaces of an equi-angle grid with the poles at the centers of
/// the first and last rows. Polar rows are half-width.
pub fn centered_latitude_interfaces(lat_nbr: usize) -> Vec<f64> {
    let dlat = 180.0 / (lat_nbr - 1) as f64;
    let mut ntf = vec![-90.0];
    ntf.extend((1..lat_nbr).map(|i| -90.0 + dlat * (i as f64 - 0.5)));
    ntf.push(90.0);
    ntf
}

/// Column interfaces of a global grid starting at Greenwich.
pub fn longitude_interfaces(lon_nbr: usize) -> Vec<f64> {
    ramp(lon_nbr + 1, 0.0, 360.0 / lon_nbr as f64)
}

/// Cell arrays of a grid, unrolled to 1-D.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnrolledGrid {
    pub center_lat: Vec<f64>,
    pub center_lon: Vec<f64>,
    /// `[cells, 4]`
    pub corner_lat: Vec<f64>,
    /// `[cells, 4]`
    pub corner_lon: Vec<f64>,
    /// Steradians.
    pub area: Vec<f64>,
}

impl UnrolledGrid {
    pub fn size(&self) -> usize {
        self.center_lat.len()
    }
}

/// Unroll a rectangular grid given its row and column interfaces.
///
/// Centers are the midpoints of the interfaces unless `lat_ctr` is given.
pub fn unroll_rectangular(lat_ntf: &[f64], lon_ntf: &[f64], lat_ctr: Option<&[f64]>) -> UnrolledGrid {
    let mut grid = UnrolledGrid::default();
    for j in 0..lat_ntf.len() - 1 {
        let (south, north) = (lat_ntf[j], lat_ntf[j + 1]);
        let lat = lat_ctr.map_or(0.5 * (south + north), |c| c[j]);
        for i in 0..lon_ntf.len() - 1 {
            let (west, east) = (lon_ntf[i], lon_ntf[i + 1]);
            grid.center_lat.push(lat);
            grid.center_lon.push(0.5 * (west + east));
            grid.corner_lat.extend([south, south, north, north]);
            grid.corner_lon.extend([west, east, east, west]);
            grid.area
                .push((east - west).to_radians() * (north.to_radians().sin() - south.to_radians().sin()));
        }
    }
    grid
}

/// An unstructured grid of `cells` equal-width longitude bands pole to pole.
pub fn band_grid(cells: usize) -> UnrolledGrid {
    unroll_rectangular(&[-90.0, 90.0], &longitude_interfaces(cells), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_interfaces() {
        assert_eq!(offset_latitude_interfaces(4), vec![-90.0, -45.0, 0.0, 45.0, 90.0]);
    }

    #[test]
    fn test_centered_interfaces() {
        assert_eq!(
            centered_latitude_interfaces(5),
            vec![-90.0, -67.5, -22.5, 22.5, 67.5, 90.0]
        );
    }

    #[test]
    fn test_unrolled_areas_cover_sphere() {
        let grid = unroll_rectangular(&offset_latitude_interfaces(6), &longitude_interfaces(8), None);
        assert_eq!(grid.size(), 48);
        assert_eq!(grid.corner_lat.len(), 192);
        let total: f64 = grid.area.iter().sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-12);
        // Row-major: longitudes vary fastest
        assert_eq!(grid.center_lat[0], grid.center_lat[7]);
        assert_ne!(grid.center_lat[7], grid.center_lat[8]);
    }

    #[test]
    fn test_band_grid() {
        let grid = band_grid(4);
        assert_eq!(grid.center_lon, vec![45.0, 135.0, 225.0, 315.0]);
        assert!(grid.center_lat.iter().all(|&lat| lat == 0.0));
    }
}
