//! Traversal table and per-field regrid decisions.

use netcdf_io::{DatasetReader, Dimension, NcType, VariableInfo};
use tracing::{debug, warn};

use crate::config::RegridNames;
use crate::error::{RegridError, Result};
use crate::map::GridConversion;

/// Coordinate, bounds and area variables that are always regenerated.
pub const EXCLUDED_VARIABLES: [&str; 13] = [
    "/area",
    "/gridcell_area",
    "/gw",
    "/lat",
    "/latitude",
    "/lat_bnds",
    "/lat_vertices",
    "/bounds_lat",
    "/lon",
    "/longitude",
    "/lon_bnds",
    "/lon_vertices",
    "/bounds_lon",
];

/// What happens to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPlan {
    /// Apply the weights; the output uses these dimensions.
    Regrid { output_dims: Vec<String> },
    /// Copy values and attributes unchanged.
    Copy,
    /// Leave out of the output.
    Exclude,
}

/// One variable of the input dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub info: VariableInfo,
    /// Selected for extraction.
    pub extract: bool,
    pub plan: FieldPlan,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn full_name(&self) -> String {
        self.info.full_name()
    }

    pub fn dtype(&self) -> NcType {
        self.info.dtype
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.info.dimensions
    }
}

/// Counts produced by planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub regridded: usize,
    pub copied: usize,
    /// Extracted variables dropped because they are regenerated.
    pub omitted: usize,
    /// Horizontal fields left out because their layout cannot be regridded.
    pub skipped: usize,
}

/// Ordered list of input variables with their extraction state and plan.
#[derive(Debug, Clone, Default)]
pub struct TraversalTable {
    entries: Vec<FieldEntry>,
}

impl TraversalTable {
    /// Enumerate the input. An empty `extract` list selects every variable.
    pub fn from_reader(reader: &dyn DatasetReader, extract: &[String]) -> Result<Self> {
        let variables = reader.variables();
        if let Some(unknown) = extract
            .iter()
            .find(|name| !variables.iter().any(|v| &v.name == *name))
        {
            return Err(RegridError::config(format!(
                "extraction list names {} which is not in {}",
                unknown,
                reader.location()
            )));
        }

        let entries = variables
            .into_iter()
            .map(|info| {
                let extract = extract.is_empty() || extract.iter().any(|n| n == &info.name);
                FieldEntry {
                    info,
                    extract,
                    plan: FieldPlan::Exclude,
                }
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.iter().find(|e| e.info.name == name)
    }

    /// Entries that end up in the output, in input order.
    pub fn selected(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter().filter(|e| e.plan != FieldPlan::Exclude)
    }

    /// Decide the plan of every entry.
    ///
    /// Regenerated coordinates are dropped from extraction. A remaining
    /// field is regridded when its trailing dimensions are the source
    /// horizontal dimensions, copied when it has none of them, and left out
    /// otherwise.
    pub fn plan(&mut self, names: &RegridNames, conversion: GridConversion) -> PlanCounts {
        let mut counts = PlanCounts::default();
        let horizontal = source_horizontal(names, conversion);

        for entry in &mut self.entries {
            if entry.extract && EXCLUDED_VARIABLES.contains(&entry.full_name().as_str()) {
                entry.extract = false;
                counts.omitted += 1;
            }
            entry.plan = if !entry.extract {
                FieldPlan::Exclude
            } else {
                match layout(entry.dimensions(), &horizontal) {
                    Layout::Trailing => {
                        counts.regridded += 1;
                        FieldPlan::Regrid {
                            output_dims: output_dimensions(entry.dimensions(), names, conversion),
                        }
                    }
                    Layout::Absent => {
                        counts.copied += 1;
                        FieldPlan::Copy
                    }
                    Layout::Unsupported => {
                        warn!(
                            variable = %entry.name(),
                            dims = ?entry.info.dimension_names(),
                            horizontal = ?horizontal,
                            "Horizontal dimensions are incomplete or not fastest-varying, leaving field out"
                        );
                        counts.skipped += 1;
                        FieldPlan::Exclude
                    }
                }
            };
            debug!(variable = %entry.name(), plan = ?entry.plan, "Planned field");
        }

        if counts.regridded == 0 {
            warn!("no variables fit regridding criteria");
        }
        counts
    }
}

/// Where the source horizontal dimensions sit in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// All of them, last and in order.
    Trailing,
    /// None of them.
    Absent,
    Unsupported,
}

/// Horizontal dimension names of the source grid, slowest first.
fn source_horizontal(names: &RegridNames, conversion: GridConversion) -> Vec<&str> {
    if conversion.source_rank() == 1 {
        vec![names.col_nm.as_str()]
    } else {
        vec![names.lat_nm.as_str(), names.lon_nm.as_str()]
    }
}

fn layout(dims: &[Dimension], horizontal: &[&str]) -> Layout {
    let is_horizontal = |d: &Dimension| horizontal.contains(&d.name.as_str());
    if !dims.iter().any(is_horizontal) {
        return Layout::Absent;
    }
    if dims.len() < horizontal.len() {
        return Layout::Unsupported;
    }
    let (outer, trailing) = dims.split_at(dims.len() - horizontal.len());
    let in_order = trailing.iter().zip(horizontal).all(|(d, h)| d.name == *h);
    if in_order && !outer.iter().any(is_horizontal) {
        Layout::Trailing
    } else {
        Layout::Unsupported
    }
}

/// Output dimensions of a regridded field.
///
/// 2-D to 1-D replaces latitude with the column and drops longitude; 1-D to
/// 2-D expands the column into latitude and longitude. Other dimensions are
/// kept by name.
pub fn output_dimensions(
    dims: &[Dimension],
    names: &RegridNames,
    conversion: GridConversion,
) -> Vec<String> {
    let mut out = Vec::with_capacity(dims.len() + 1);
    for dim in dims {
        match conversion {
            GridConversion::TwoToOne if dim.name == names.lat_nm => out.push(names.col_nm.clone()),
            GridConversion::TwoToOne if dim.name == names.lon_nm => {}
            GridConversion::OneToTwo if dim.name == names.col_nm => {
                out.push(names.lat_nm.clone());
                out.push(names.lon_nm.clone());
            }
            _ => out.push(dim.name.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcdf_io::{MemoryDataset, Values};

    fn input() -> MemoryDataset {
        MemoryDataset::new("in.nc")
            .with_dimension("time", 2)
            .with_dimension("lat", 3)
            .with_dimension("lon", 4)
            .with_dimension("nbnd", 2)
            .with_variable("T", &["time", "lat", "lon"], Values::Float(vec![0.0; 24]))
            .with_variable("lat", &["lat"], Values::Double(vec![0.0; 3]))
            .with_variable("lon", &["lon"], Values::Double(vec![0.0; 4]))
            .with_variable("gw", &["lat"], Values::Double(vec![0.0; 3]))
            .with_variable("time", &["time"], Values::Double(vec![0.0; 2]))
            .with_variable("time_bnds", &["time", "nbnd"], Values::Double(vec![0.0; 4]))
    }

    fn dims(names: &[(&str, usize)]) -> Vec<Dimension> {
        names.iter().map(|(n, l)| Dimension::new(*n, *l)).collect()
    }

    #[test]
    fn test_plan_marks_regrid_copy_and_exclude() {
        let mut table = TraversalTable::from_reader(&input(), &[]).unwrap();
        let counts = table.plan(&RegridNames::default(), GridConversion::TwoToOne);
        assert_eq!(
            counts,
            PlanCounts {
                regridded: 1,
                copied: 2,
                omitted: 3,
                skipped: 0
            }
        );
        assert_eq!(
            table.get("T").unwrap().plan,
            FieldPlan::Regrid {
                output_dims: vec!["time".to_string(), "ncol".to_string()]
            }
        );
        assert_eq!(table.get("time_bnds").unwrap().plan, FieldPlan::Copy);
        assert_eq!(table.get("lat").unwrap().plan, FieldPlan::Exclude);
        assert_eq!(table.selected().count(), 3);
    }

    #[test]
    fn test_extraction_list_restricts_fields() {
        let extract = vec!["T".to_string(), "gw".to_string()];
        let mut table = TraversalTable::from_reader(&input(), &extract).unwrap();
        let counts = table.plan(&RegridNames::default(), GridConversion::TwoToTwo);
        // Only extracted variables count as omitted
        assert_eq!(counts.omitted, 1);
        assert_eq!(counts.copied, 0);
        assert_eq!(table.get("time").unwrap().plan, FieldPlan::Exclude);

        let unknown = vec!["PS".to_string()];
        assert!(matches!(
            TraversalTable::from_reader(&input(), &unknown),
            Err(RegridError::Config(_))
        ));
    }

    #[test]
    fn test_no_regrid_fields() {
        let extract = vec!["time".to_string()];
        let mut table = TraversalTable::from_reader(&input(), &extract).unwrap();
        let counts = table.plan(&RegridNames::default(), GridConversion::TwoToTwo);
        assert_eq!(counts.regridded, 0);
        assert_eq!(counts.copied, 1);
    }

    #[test]
    fn test_partial_horizontal_fields_left_out() {
        let input = input()
            .with_variable("T_zm", &["time", "lat"], Values::Float(vec![0.0; 6]))
            .with_variable("T_lev", &["lat", "lon", "time"], Values::Float(vec![0.0; 24]))
            .with_variable("T_swap", &["time", "lon", "lat"], Values::Float(vec![0.0; 24]));
        let mut table = TraversalTable::from_reader(&input, &[]).unwrap();
        let counts = table.plan(&RegridNames::default(), GridConversion::TwoToOne);
        assert_eq!(counts.regridded, 1);
        assert_eq!(counts.skipped, 3);
        for name in ["T_zm", "T_lev", "T_swap"] {
            assert_eq!(table.get(name).unwrap().plan, FieldPlan::Exclude, "{}", name);
        }
        assert!(table.selected().all(|e| e.name() != "T_zm"));
    }

    #[test]
    fn test_column_source_ignores_rectangular_dimensions() {
        let input = MemoryDataset::new("in.nc")
            .with_dimension("ncol", 6)
            .with_dimension("lat", 3)
            .with_variable("PS", &["ncol"], Values::Double(vec![0.0; 6]))
            .with_variable("zonal", &["lat"], Values::Double(vec![0.0; 3]));
        let mut table = TraversalTable::from_reader(&input, &[]).unwrap();
        let counts = table.plan(&RegridNames::default(), GridConversion::OneToTwo);
        assert_eq!(counts.regridded, 1);
        assert_eq!(counts.copied, 1);
        assert_eq!(table.get("zonal").unwrap().plan, FieldPlan::Copy);
    }

    #[test]
    fn test_output_dimensions_per_conversion() {
        let names = RegridNames::default();
        let rect = dims(&[("time", 2), ("lev", 5), ("lat", 3), ("lon", 4)]);
        let col = dims(&[("time", 2), ("ncol", 12)]);

        assert_eq!(
            output_dimensions(&rect, &names, GridConversion::TwoToOne),
            vec!["time", "lev", "ncol"]
        );
        assert_eq!(
            output_dimensions(&rect, &names, GridConversion::TwoToTwo),
            vec!["time", "lev", "lat", "lon"]
        );
        assert_eq!(
            output_dimensions(&col, &names, GridConversion::OneToTwo),
            vec!["time", "lat", "lon"]
        );
        assert_eq!(
            output_dimensions(&col, &names, GridConversion::OneToOne),
            vec!["time", "ncol"]
        );
    }

    #[test]
    fn test_renamed_column_dimension() {
        let mut names = RegridNames::default();
        names.set("col_nm", "cell").unwrap();
        let col = dims(&[("cell", 12)]);
        assert_eq!(
            output_dimensions(&col, &names, GridConversion::OneToTwo),
            vec!["lat", "lon"]
        );
    }
}
