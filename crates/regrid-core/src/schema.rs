//! Output dataset layout.
//!
//! Defines the destination-grid dimensions and coordinates, then one output
//! variable per regridded or copied field. No field data is written here;
//! [`write_grid`] fills the coordinate variables once the layout exists.

use chrono::Utc;
use netcdf_io::{AttrValue, DatasetWriter, Dimension, NcType, Values, VariableDef, MISSING_VALUE_ATTRS};
use tracing::{debug, info};

use crate::config::RegridNames;
use crate::error::{RegridError, Result};
use crate::grid::DestinationGrid;
use crate::plan::{FieldEntry, FieldPlan, PlanCounts, TraversalTable};

/// Length of the time-bounds dimension.
pub const TIME_BOUNDS_LEN: usize = 2;

/// Counts reported after laying out the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaSummary {
    pub regridded: usize,
    pub copied: usize,
    pub omitted: usize,
    /// Horizontal fields left out of the output.
    pub skipped: usize,
    /// Coordinate, bounds, weight and area variables created for the grid.
    pub created: usize,
}

/// Dataset-level provenance attributes.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Mapping file the weights came from, if any.
    pub mapping_file: Option<String>,
    pub source_file: String,
}

impl Provenance {
    pub fn history(&self) -> String {
        let stamp = Utc::now().format("%a %b %e %H:%M:%S %Y");
        match &self.mapping_file {
            Some(map) => format!("{}: regridder --map {} {}", stamp, map, self.source_file),
            None => format!("{}: regridder {}", stamp, self.source_file),
        }
    }
}

/// Output names of the destination-grid variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridVariables {
    pub lat: String,
    pub lon: String,
    pub lat_bnd: String,
    pub lon_bnd: String,
    pub area: String,
    /// Latitude weights, rectangular grids only.
    pub lat_wgt: Option<String>,
}

impl GridVariables {
    pub fn new(grid: &DestinationGrid, names: &RegridNames) -> Self {
        match grid {
            DestinationGrid::Unstructured(_) => Self {
                lat: names.lat_nm.clone(),
                lon: names.lon_nm.clone(),
                lat_bnd: names.lat_vrt_nm.clone(),
                lon_bnd: names.lon_vrt_nm.clone(),
                area: names.area_nm.clone(),
                lat_wgt: None,
            },
            DestinationGrid::Rectangular(_) => Self {
                lat: names.lat_nm.clone(),
                lon: names.lon_nm.clone(),
                lat_bnd: names.lat_bnd_nm.clone(),
                lon_bnd: names.lon_bnd_nm.clone(),
                area: names.area_nm.clone(),
                lat_wgt: Some(names.lat_wgt_nm.clone()),
            },
        }
    }
}

/// Define the complete output layout.
pub fn define_schema(
    writer: &mut dyn DatasetWriter,
    table: &TraversalTable,
    counts: PlanCounts,
    grid: &DestinationGrid,
    names: &RegridNames,
    provenance: &Provenance,
) -> Result<SchemaSummary> {
    let horizontal = define_grid_dimensions(writer, grid, names)?;
    let created = define_grid_variables(writer, grid, names)?;

    for entry in table.selected() {
        if writer.has_variable(entry.name()) {
            debug!(variable = %entry.name(), "Already defined in output, skipping");
            continue;
        }
        let def = match &entry.plan {
            FieldPlan::Regrid { output_dims } => {
                regrid_definition(writer, entry, output_dims, &horizontal, grid, names)?
            }
            FieldPlan::Copy => copy_definition(writer, entry)?,
            FieldPlan::Exclude => continue,
        };
        writer.define_variable(&def)?;
    }

    if let Some(map) = &provenance.mapping_file {
        writer.put_global_attribute("mapping_file", AttrValue::from(map.as_str()))?;
    }
    writer.put_global_attribute("source_file", AttrValue::from(provenance.source_file.as_str()))?;
    writer.put_global_attribute("history", AttrValue::from(provenance.history()))?;

    let summary = SchemaSummary {
        regridded: counts.regridded,
        copied: counts.copied,
        omitted: counts.omitted,
        skipped: counts.skipped,
        created,
    };
    info!(
        regridded = summary.regridded,
        copied = summary.copied,
        omitted = summary.omitted,
        skipped = summary.skipped,
        created = summary.created,
        "Defined output schema"
    );
    Ok(summary)
}

/// Define horizontal, bounds and time-bounds dimensions.
///
/// Returns the names of the horizontal output dimensions.
fn define_grid_dimensions(
    writer: &mut dyn DatasetWriter,
    grid: &DestinationGrid,
    names: &RegridNames,
) -> Result<Vec<String>> {
    let (horizontal, bnd_nm) = match grid {
        DestinationGrid::Unstructured(g) => {
            ensure_dimension(writer, &names.col_nm, g.col_nbr)?;
            (vec![names.col_nm.clone()], &names.vrt_nm)
        }
        DestinationGrid::Rectangular(g) => {
            ensure_dimension(writer, &names.lat_nm, g.lat_nbr)?;
            ensure_dimension(writer, &names.lon_nm, g.lon_nbr)?;
            (vec![names.lat_nm.clone(), names.lon_nm.clone()], &names.bnd_nm)
        }
    };
    ensure_dimension(writer, &names.bnd_tm_nm, TIME_BOUNDS_LEN)?;
    ensure_dimension(writer, bnd_nm, grid.bounds_len())?;
    Ok(horizontal)
}

fn ensure_dimension(writer: &mut dyn DatasetWriter, name: &str, len: usize) -> Result<()> {
    let defined = writer.ensure_dimension(name, len)?;
    if defined != len {
        return Err(RegridError::config(format!(
            "dimension {} already has length {}, need {}",
            name, defined, len
        )));
    }
    Ok(())
}

/// Define the coordinate, bounds, weight and area variables.
fn define_grid_variables(
    writer: &mut dyn DatasetWriter,
    grid: &DestinationGrid,
    names: &RegridNames,
) -> Result<usize> {
    let vars = GridVariables::new(grid, names);
    let mut defs = Vec::new();

    match grid {
        DestinationGrid::Unstructured(_) => {
            let coordinates = format!("{} {}", vars.lat, vars.lon);
            let col = [names.col_nm.as_str()];
            let col_vrt = [names.col_nm.as_str(), names.vrt_nm.as_str()];
            defs.push(
                area_definition(&vars.area, &col).with_attribute("coordinates", coordinates.as_str()),
            );
            defs.push(
                latitude_definition(&vars.lat, &col, &vars.lat_bnd)
                    .with_attribute("coordinates", coordinates.as_str()),
            );
            defs.push(
                longitude_definition(&vars.lon, &col, &vars.lon_bnd)
                    .with_attribute("coordinates", coordinates.as_str()),
            );
            defs.push(
                VariableDef::new(&vars.lat_bnd, NcType::Double, &col_vrt)
                    .with_attribute("long_name", "gridcell latitude vertices"),
            );
            defs.push(
                VariableDef::new(&vars.lon_bnd, NcType::Double, &col_vrt)
                    .with_attribute("long_name", "gridcell longitude vertices"),
            );
        }
        DestinationGrid::Rectangular(_) => {
            let lat = [names.lat_nm.as_str()];
            let lon = [names.lon_nm.as_str()];
            defs.push(area_definition(&vars.area, &[names.lat_nm.as_str(), names.lon_nm.as_str()]));
            defs.push(latitude_definition(&vars.lat, &lat, &vars.lat_bnd));
            defs.push(longitude_definition(&vars.lon, &lon, &vars.lon_bnd));
            defs.push(
                VariableDef::new(&vars.lat_bnd, NcType::Double, &[names.lat_nm.as_str(), names.bnd_nm.as_str()])
                    .with_attribute("long_name", "gridcell latitude interfaces"),
            );
            defs.push(
                VariableDef::new(&vars.lon_bnd, NcType::Double, &[names.lon_nm.as_str(), names.bnd_nm.as_str()])
                    .with_attribute("long_name", "gridcell longitude interfaces"),
            );
            if let Some(lat_wgt) = &vars.lat_wgt {
                defs.push(
                    VariableDef::new(lat_wgt, NcType::Double, &lat)
                        .with_attribute("long_name", "latitude quadrature weights (normalized to sum to 2.0)"),
                );
            }
        }
    }

    for def in &defs {
        writer.define_variable(def)?;
    }
    Ok(defs.len())
}

fn area_definition(name: &str, dims: &[&str]) -> VariableDef {
    VariableDef::new(name, NcType::Double, dims)
        .with_attribute("long_name", "solid angle subtended by grid cell")
        .with_attribute("standard_name", "cell_area")
        .with_attribute("units", "steradian")
        .with_attribute("cell_methods", "lat, lon: sum")
}

fn latitude_definition(name: &str, dims: &[&str], bounds: &str) -> VariableDef {
    VariableDef::new(name, NcType::Double, dims)
        .with_attribute("long_name", "latitude")
        .with_attribute("standard_name", "latitude")
        .with_attribute("units", "degrees_north")
        .with_attribute("axis", "Y")
        .with_attribute("bounds", bounds)
}

fn longitude_definition(name: &str, dims: &[&str], bounds: &str) -> VariableDef {
    VariableDef::new(name, NcType::Double, dims)
        .with_attribute("long_name", "longitude")
        .with_attribute("standard_name", "longitude")
        .with_attribute("units", "degrees_east")
        .with_attribute("axis", "X")
        .with_attribute("bounds", bounds)
}

/// Define any non-horizontal dimension of a field that the output lacks.
fn copy_dimension(writer: &mut dyn DatasetWriter, dim: &Dimension) -> Result<()> {
    ensure_dimension(writer, &dim.name, dim.len)
}

fn regrid_definition(
    writer: &mut dyn DatasetWriter,
    entry: &FieldEntry,
    output_dims: &[String],
    horizontal: &[String],
    grid: &DestinationGrid,
    names: &RegridNames,
) -> Result<VariableDef> {
    for name in output_dims {
        if horizontal.contains(name) {
            continue;
        }
        let dim = entry
            .dimensions()
            .iter()
            .find(|d| &d.name == name)
            .ok_or_else(|| {
                RegridError::config(format!(
                    "output dimension {} of {} has no source dimension",
                    name,
                    entry.name()
                ))
            })?;
        copy_dimension(writer, dim)?;
    }

    let mut def = VariableDef::new(entry.name(), NcType::Double, output_dims);
    def.attributes = entry.info.attributes.clone();
    for attr in &mut def.attributes {
        if MISSING_VALUE_ATTRS.contains(&attr.name.as_str()) {
            if let AttrValue::Numeric(values) = &attr.value {
                attr.value = AttrValue::Numeric(Values::Double(values.to_f64()));
            }
        }
    }
    match grid {
        DestinationGrid::Unstructured(_) => {
            def.set_attribute("coordinates", format!("{} {}", names.lat_nm, names.lon_nm))
        }
        DestinationGrid::Rectangular(_) => def.remove_attribute("coordinates"),
    }
    Ok(def)
}

fn copy_definition(writer: &mut dyn DatasetWriter, entry: &FieldEntry) -> Result<VariableDef> {
    for dim in entry.dimensions() {
        copy_dimension(writer, dim)?;
    }
    let dims: Vec<&str> = entry.dimensions().iter().map(|d| d.name.as_str()).collect();
    let mut def = VariableDef::new(entry.name(), entry.dtype(), &dims);
    def.attributes = entry.info.attributes.clone();
    Ok(def)
}

/// Write the destination-grid coordinate, bounds, weight and area values.
pub fn write_grid(writer: &mut dyn DatasetWriter, grid: &DestinationGrid, names: &RegridNames) -> Result<()> {
    let vars = GridVariables::new(grid, names);
    let (lat, lon, lat_bnd, lon_bnd, area) = match grid {
        DestinationGrid::Unstructured(g) => (&g.lat_ctr, &g.lon_ctr, &g.lat_bnd, &g.lon_bnd, &g.area),
        DestinationGrid::Rectangular(g) => (&g.lat_ctr, &g.lon_ctr, &g.lat_bnd, &g.lon_bnd, &g.area),
    };
    writer.write_values(&vars.lat, &Values::Double(lat.clone()))?;
    writer.write_values(&vars.lon, &Values::Double(lon.clone()))?;
    writer.write_values(&vars.lat_bnd, &Values::Double(lat_bnd.clone()))?;
    writer.write_values(&vars.lon_bnd, &Values::Double(lon_bnd.clone()))?;
    writer.write_values(&vars.area, &Values::Double(area.clone()))?;
    if let (DestinationGrid::Rectangular(g), Some(lat_wgt)) = (grid, &vars.lat_wgt) {
        writer.write_values(lat_wgt, &Values::Double(g.lat_wgt.clone()))?;
    }
    debug!(cells = grid.size(), "Wrote destination grid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{LatitudeGrid, RectangularGrid, UnstructuredGrid};
    use crate::map::GridConversion;
    use netcdf_io::{DatasetReader, MemoryDataset};

    fn unstructured(cells: usize) -> DestinationGrid {
        DestinationGrid::Unstructured(UnstructuredGrid {
            col_nbr: cells,
            corners: 3,
            lon_ctr: vec![0.0; cells],
            lat_ctr: vec![0.0; cells],
            lon_bnd: vec![0.0; cells * 3],
            lat_bnd: vec![0.0; cells * 3],
            area: vec![1.0; cells],
        })
    }

    fn rectangular() -> DestinationGrid {
        DestinationGrid::Rectangular(RectangularGrid {
            lat_nbr: 2,
            lon_nbr: 3,
            lat_ctr: vec![-45.0, 45.0],
            lon_ctr: vec![60.0, 180.0, 300.0],
            lat_ntf: vec![-90.0, 0.0, 90.0],
            lon_ntf: vec![0.0, 120.0, 240.0, 360.0],
            lat_bnd: vec![-90.0, 0.0, 0.0, 90.0],
            lon_bnd: vec![0.0, 120.0, 120.0, 240.0, 240.0, 360.0],
            lat_grid: LatitudeGrid::EquiangleOffset,
            lat_wgt: vec![1.0, 1.0],
            area: vec![1.0; 6],
        })
    }

    fn rectangular_input() -> MemoryDataset {
        MemoryDataset::new("in.nc")
            .with_dimension("time", 2)
            .with_dimension("lat", 4)
            .with_dimension("lon", 5)
            .with_variable("T", &["time", "lat", "lon"], Values::Float(vec![0.0; 40]))
            .with_variable_attribute("T", "_FillValue", 1.0e36_f32)
            .with_variable_attribute("T", "coordinates", "lat lon")
            .with_variable("date", &["time"], Values::Int(vec![1, 2]))
            .with_variable("lat", &["lat"], Values::Double(vec![0.0; 4]))
    }

    fn provenance() -> Provenance {
        Provenance {
            mapping_file: Some("map.nc".to_string()),
            source_file: "in.nc".to_string(),
        }
    }

    fn layout(
        input: &MemoryDataset,
        grid: &DestinationGrid,
        conversion: GridConversion,
    ) -> (MemoryDataset, SchemaSummary) {
        let names = RegridNames::default();
        let mut table = TraversalTable::from_reader(input, &[]).unwrap();
        let counts = table.plan(&names, conversion);
        let mut output = MemoryDataset::new("out.nc");
        let summary = define_schema(&mut output, &table, counts, grid, &names, &provenance()).unwrap();
        (output, summary)
    }

    #[test]
    fn test_rectangular_to_unstructured_schema() {
        let (output, summary) = layout(&rectangular_input(), &unstructured(7), GridConversion::TwoToOne);
        assert_eq!(
            summary,
            SchemaSummary {
                regridded: 1,
                copied: 1,
                omitted: 1,
                skipped: 0,
                created: 5
            }
        );
        assert_eq!(DatasetReader::dimension_len(&output, "ncol"), Some(7));
        assert_eq!(DatasetReader::dimension_len(&output, "nv"), Some(3));
        assert_eq!(DatasetReader::dimension_len(&output, "nbnd"), Some(2));
        assert_eq!(DatasetReader::dimension_len(&output, "time"), Some(2));

        let t = output.definition("T").unwrap();
        assert_eq!(t.dtype, NcType::Double);
        assert_eq!(t.dimensions, vec!["time", "ncol"]);
        assert_eq!(t.attribute("_FillValue"), Some(&AttrValue::Numeric(Values::Double(vec![1.0e36_f32 as f64]))));
        assert_eq!(t.attribute("coordinates").and_then(AttrValue::as_text), Some("lat lon"));

        let date = output.definition("date").unwrap();
        assert_eq!(date.dtype, NcType::Int);

        let area = output.definition("area").unwrap();
        assert_eq!(area.attribute("units").and_then(AttrValue::as_text), Some("steradian"));
        assert_eq!(area.attribute("coordinates").and_then(AttrValue::as_text), Some("lat lon"));
        assert!(output.definition("lat_vertices").is_some());
        assert!(output.definition("gw").is_none());
        assert_eq!(output.global_text("mapping_file").as_deref(), Some("map.nc"));
        assert!(output.global_text("history").is_some());
    }

    #[test]
    fn test_rectangular_to_rectangular_schema() {
        let (mut output, summary) = layout(&rectangular_input(), &rectangular(), GridConversion::TwoToTwo);
        assert_eq!(summary.created, 6);
        assert_eq!(DatasetReader::dimension_len(&output, "lat"), Some(2));
        assert_eq!(DatasetReader::dimension_len(&output, "lon"), Some(3));

        let t = output.definition("T").unwrap();
        assert_eq!(t.dimensions, vec!["time", "lat", "lon"]);
        assert!(t.attribute("coordinates").is_none());
        assert_eq!(
            output.definition("lat").unwrap().attribute("bounds").and_then(AttrValue::as_text),
            Some("lat_bnds")
        );

        write_grid(&mut output, &rectangular(), &RegridNames::default()).unwrap();
        assert_eq!(output.read_f64("lon_bnds").unwrap().len(), 6);
        assert_eq!(output.read_f64("gw").unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_unstructured_to_rectangular_schema() {
        let input = MemoryDataset::new("in.nc")
            .with_dimension("ncol", 10)
            .with_dimension("lev", 3)
            .with_variable("Q", &["lev", "ncol"], Values::Double(vec![0.0; 30]));
        let (output, _) = layout(&input, &rectangular(), GridConversion::OneToTwo);
        assert_eq!(output.definition("Q").unwrap().dimensions, vec!["lev", "lat", "lon"]);
        assert_eq!(DatasetReader::dimension_len(&output, "lev"), Some(3));
        assert!(DatasetReader::dimension_len(&output, "ncol").is_none());
    }

    #[test]
    fn test_conflicting_dimension_length() {
        let input = MemoryDataset::new("in.nc")
            .with_dimension("ncol", 4)
            .with_dimension("nbnd", 3)
            .with_variable("x", &["ncol"], Values::Double(vec![0.0; 4]))
            .with_variable("odd_bnds", &["nbnd"], Values::Double(vec![0.0; 3]));
        let names = RegridNames::default();
        let mut table = TraversalTable::from_reader(&input, &[]).unwrap();
        let counts = table.plan(&names, GridConversion::OneToOne);
        let mut output = MemoryDataset::new("out.nc");
        let result = define_schema(&mut output, &table, counts, &unstructured(4), &names, &provenance());
        assert!(matches!(result, Err(RegridError::Config(_))));
    }
}
