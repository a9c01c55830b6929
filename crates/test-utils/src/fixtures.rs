//! In-memory mapping files and input datasets.

use std::path::Path;

use netcdf_io::{DatasetReader, DatasetWriter, MemoryDataset, NetCdfResult, NetCdfWriter, Values};

use crate::generators::UnrolledGrid;

/// Naming scheme of a fixture mapping file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStyle {
    Scrip,
    Esmf,
}

/// One link of a sparse map with 1-based addresses, as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub src: usize,
    pub dst: usize,
    pub weight: f64,
}

impl Link {
    pub fn new(src: usize, dst: usize, weight: f64) -> Self {
        Self { src, dst, weight }
    }
}

/// Builder for mapping-file datasets.
///
/// # Example
///
/// ```
/// use test_utils::{band_grid, MapFixture, MapStyle};
///
/// let map = MapFixture::identity(MapStyle::Scrip, 4, band_grid(4)).build();
/// assert_eq!(map.values("src_address").map(|v| v.len()), Some(4));
/// ```
#[derive(Debug, Clone)]
pub struct MapFixture {
    pub style: MapStyle,
    pub src_dims: Vec<usize>,
    pub dst_dims: Vec<usize>,
    pub src_corners: usize,
    pub destination: UnrolledGrid,
    pub links: Vec<Link>,
    pub normalization: String,
    pub method: String,
    /// Weights per link; only column 0 carries the weight.
    pub num_wgts: usize,
}

impl MapFixture {
    pub fn new(style: MapStyle, src_dims: &[usize], dst_dims: &[usize], destination: UnrolledGrid) -> Self {
        Self {
            style,
            src_dims: src_dims.to_vec(),
            dst_dims: dst_dims.to_vec(),
            src_corners: 4,
            destination,
            links: Vec::new(),
            normalization: "destarea".to_string(),
            method: "Conservative remapping".to_string(),
            num_wgts: 1,
        }
    }

    /// Unstructured-to-unstructured identity map over `cells` cells.
    pub fn identity(style: MapStyle, cells: usize, destination: UnrolledGrid) -> Self {
        Self::new(style, &[cells], &[cells], destination)
            .with_links((1..=cells).map(|i| Link::new(i, i, 1.0)).collect())
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    pub fn with_normalization(mut self, normalization: &str) -> Self {
        self.normalization = normalization.to_string();
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn with_num_wgts(mut self, num_wgts: usize) -> Self {
        self.num_wgts = num_wgts.max(1);
        self
    }

    /// Build the dataset.
    pub fn build(&self) -> MemoryDataset {
        let names = match self.style {
            MapStyle::Scrip => [
                "src_grid_size",
                "dst_grid_size",
                "src_grid_corners",
                "dst_grid_corners",
                "num_links",
                "dst_grid_area",
                "dst_grid_center_lon",
                "dst_grid_center_lat",
                "dst_grid_corner_lon",
                "dst_grid_corner_lat",
                "src_address",
                "dst_address",
                "remap_matrix",
            ],
            MapStyle::Esmf => [
                "n_a", "n_b", "nv_a", "nv_b", "n_s", "area_b", "xc_b", "yc_b", "xv_b", "yv_b", "col", "row", "S",
            ],
        };
        let [src_size, dst_size, src_corners, dst_corners, num_links, area, xc, yc, xv, yv, src_addr, dst_addr, wgt] =
            names;

        let conventions = match self.style {
            MapStyle::Scrip => "SCRIP",
            MapStyle::Esmf => "NCAR-CSM",
        };
        let dst = &self.destination;
        let corners = if dst.size() == 0 { 4 } else { dst.corner_lat.len() / dst.size() };

        // ESMF files carry a single weight column
        let columns = match self.style {
            MapStyle::Scrip => self.num_wgts,
            MapStyle::Esmf => 1,
        };
        let mut weights = Vec::with_capacity(self.links.len() * columns);
        for link in &self.links {
            weights.push(link.weight);
            weights.extend(std::iter::repeat(0.0).take(columns - 1));
        }
        let weight_dims: Vec<&str> = if columns > 1 {
            vec![num_links, "num_wgts"]
        } else {
            vec![num_links]
        };
        let to_i32 = |v: Vec<usize>| Values::Int(v.into_iter().map(|x| x as i32).collect());

        MemoryDataset::new("map.nc")
            .with_attribute("Conventions", conventions)
            .with_attribute("normalization", self.normalization.as_str())
            .with_attribute("map_method", self.method.as_str())
            .with_dimension(src_size, self.src_dims.iter().product())
            .with_dimension(dst_size, self.dst_dims.iter().product())
            .with_dimension(src_corners, self.src_corners)
            .with_dimension(dst_corners, corners)
            .with_dimension("src_grid_rank", self.src_dims.len())
            .with_dimension("dst_grid_rank", self.dst_dims.len())
            .with_dimension(num_links, self.links.len())
            .with_dimension("num_wgts", columns)
            .with_variable("src_grid_dims", &["src_grid_rank"], to_i32(self.src_dims.clone()))
            .with_variable("dst_grid_dims", &["dst_grid_rank"], to_i32(self.dst_dims.clone()))
            .with_variable(area, &[dst_size], Values::Double(dst.area.clone()))
            .with_variable(xc, &[dst_size], Values::Double(dst.center_lon.clone()))
            .with_variable(yc, &[dst_size], Values::Double(dst.center_lat.clone()))
            .with_variable(xv, &[dst_size, dst_corners], Values::Double(dst.corner_lon.clone()))
            .with_variable(yv, &[dst_size, dst_corners], Values::Double(dst.corner_lat.clone()))
            .with_variable(src_addr, &[num_links], to_i32(self.links.iter().map(|l| l.src).collect()))
            .with_variable(dst_addr, &[num_links], to_i32(self.links.iter().map(|l| l.dst).collect()))
            .with_variable(wgt, &weight_dims, Values::Double(weights))
    }
}

/// Input dataset with one unstructured field `name(ncol)`.
pub fn column_dataset(name: &str, values: Vec<f64>) -> MemoryDataset {
    let cells = values.len();
    MemoryDataset::new("in.nc")
        .with_dimension("ncol", cells)
        .with_variable(name, &["ncol"], Values::Double(values))
}

/// Write an in-memory dataset to a netCDF file at `path`.
pub fn persist(dataset: &MemoryDataset, path: &Path) -> NetCdfResult<()> {
    let mut writer = NetCdfWriter::create(path)?;
    for dim in DatasetReader::dimensions(dataset) {
        writer.define_dimension(&dim.name, dim.len)?;
    }
    for attr in dataset.attributes() {
        writer.put_global_attribute(&attr.name, attr.value.clone())?;
    }
    for name in dataset.variable_names() {
        if let Some(def) = dataset.definition(&name) {
            writer.define_variable(def)?;
        }
        if let Some(values) = dataset.values(&name) {
            writer.write_values(&name, values)?;
        }
    }
    writer.sync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::band_grid;

    #[test]
    fn test_scrip_fixture_layout() {
        let map = MapFixture::identity(MapStyle::Scrip, 3, band_grid(3))
            .with_num_wgts(3)
            .build();
        assert_eq!(map.global_text("Conventions").as_deref(), Some("SCRIP"));
        assert_eq!(DatasetReader::dimension_len(&map, "dst_grid_corners"), Some(4));
        let matrix = map.require_variable("remap_matrix").unwrap();
        assert_eq!(matrix.shape(), vec![3, 3]);
        assert_eq!(map.read_f64("remap_matrix").unwrap()[..4], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_esmf_fixture_layout() {
        let map = MapFixture::identity(MapStyle::Esmf, 2, band_grid(2)).build();
        assert_eq!(map.global_text("Conventions").as_deref(), Some("NCAR-CSM"));
        assert_eq!(map.read_f64("row").unwrap(), vec![1.0, 2.0]);
        assert_eq!(map.read_f64("S").unwrap(), vec![1.0, 1.0]);
        assert_eq!(DatasetReader::dimension_len(&map, "n_b"), Some(2));
    }

    #[test]
    fn test_persisted_map_reads_back() {
        let dir = crate::paths::temp_test_dir();
        let path = dir.path().join("map.nc");
        let map = MapFixture::identity(MapStyle::Scrip, 2, band_grid(2)).build();
        persist(&map, &path).unwrap();

        let reader = netcdf_io::NetCdfReader::open(&path).unwrap();
        assert_eq!(reader.global_text("normalization").as_deref(), Some("destarea"));
        assert_eq!(reader.read_f64("src_address").unwrap(), vec![1.0, 2.0]);
    }
}
