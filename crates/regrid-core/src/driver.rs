//! Parallel field processing.
//!
//! Every selected field is an independent job: read the input, apply the
//! weights or pass the values through, write the output. Jobs run on a
//! dedicated rayon pool. Each worker opens its own read handle on the input;
//! the output handle is shared and guarded by a mutex, so numeric work
//! happens outside the lock and only the write happens inside it. The first
//! failing job aborts the run.

use std::path::Path;
use std::sync::Mutex;

use netcdf_io::{DatasetOpener, DatasetReader, DatasetWriter, NetCdfError, Values};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::WeightThreshold;
use crate::error::{RegridError, Result};
use crate::kernel::apply_weights;
use crate::map::SparseMap;
use crate::plan::{FieldEntry, FieldPlan, TraversalTable};

/// Weights and grid sizes shared read-only by all jobs.
#[derive(Debug, Clone, Copy)]
pub struct WeightContext<'a> {
    pub map: &'a SparseMap,
    pub src_grid_size: usize,
    pub dst_grid_size: usize,
    pub threshold: WeightThreshold,
}

/// Build the worker pool. Zero threads selects the rayon default.
pub fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("regrid-worker-{}", i))
        .build()
        .map_err(|e| RegridError::config(format!("failed to build worker pool: {}", e)))
}

/// Regrid or copy every selected field of `input` into `writer`.
///
/// Returns the number of fields written.
pub fn process_fields(
    pool: &rayon::ThreadPool,
    opener: &dyn DatasetOpener,
    input: &Path,
    writer: &mut dyn DatasetWriter,
    table: &TraversalTable,
    weights: WeightContext<'_>,
) -> Result<usize> {
    let jobs: Vec<&FieldEntry> = table.selected().collect();
    let output = Mutex::new(writer);

    pool.install(|| {
        jobs.par_iter().try_for_each_init(
            || opener.open(input).map_err(|e| e.to_string()),
            |reader, entry| {
                let reader = reader.as_deref().map_err(|msg| {
                    RegridError::Dataset(NetCdfError::IoError(std::io::Error::other(format!(
                        "{}: {}",
                        input.display(),
                        msg
                    ))))
                })?;
                process_field(reader, &output, entry, &weights)
            },
        )
    })?;

    let writer = output.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    writer.sync()?;
    info!(fields = jobs.len(), "Processed fields");
    Ok(jobs.len())
}

fn process_field(
    reader: &dyn DatasetReader,
    output: &Mutex<&mut dyn DatasetWriter>,
    entry: &FieldEntry,
    weights: &WeightContext<'_>,
) -> Result<()> {
    let name = entry.name();
    match &entry.plan {
        FieldPlan::Regrid { .. } => {
            let input = reader.read_f64(name)?;
            let (has_mss, mss) = reader.missing_value(name)?;
            let regridded = apply_weights(
                weights.map,
                weights.src_grid_size,
                weights.dst_grid_size,
                &input,
                has_mss.then_some(mss),
                weights.threshold,
            )?;
            debug!(variable = %name, values = regridded.len(), missing = has_mss, "Regridded field");

            let mut writer = output.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            writer.write_values(name, &Values::Double(regridded))?;
        }
        FieldPlan::Copy => {
            let mut writer = output.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let values = reader.read_values(name)?;
            writer.write_values(name, &values)?;
            debug!(variable = %name, "Copied field");
        }
        FieldPlan::Exclude => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegridNames;
    use crate::map::GridConversion;
    use netcdf_io::{MemoryCatalog, MemoryDataset, NcType, VariableDef};

    fn input() -> MemoryDataset {
        MemoryDataset::new("in.nc")
            .with_dimension("time", 2)
            .with_dimension("ncol", 3)
            .with_variable("T", &["time", "ncol"], Values::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .with_variable("date", &["time"], Values::Int(vec![20000101, 20000102]))
    }

    fn output() -> MemoryDataset {
        let mut out = MemoryDataset::new("out.nc");
        out.define_dimension("time", 2).unwrap();
        out.define_dimension("ncol", 2).unwrap();
        out.define_variable(&VariableDef::new("T", NcType::Double, &["time", "ncol"])).unwrap();
        out.define_variable(&VariableDef::new("date", NcType::Int, &["time"])).unwrap();
        out
    }

    #[test]
    fn test_process_fields_regrids_and_copies() {
        let catalog = MemoryCatalog::new().with("in.nc", input());
        let mut table = TraversalTable::from_reader(&input(), &[]).unwrap();
        table.plan(&RegridNames::default(), GridConversion::OneToOne);
        let map = SparseMap::new(vec![0, 1, 2], vec![0, 0, 1], vec![0.5, 0.5, 1.0]).unwrap();
        let weights = WeightContext {
            map: &map,
            src_grid_size: 3,
            dst_grid_size: 2,
            threshold: WeightThreshold::Disabled,
        };

        let mut out = output();
        let pool = build_pool(2).unwrap();
        let written = process_fields(&pool, &catalog, Path::new("in.nc"), &mut out, &table, weights).unwrap();
        assert_eq!(written, 2);
        assert_eq!(out.values("T"), Some(&Values::Double(vec![1.5, 3.0, 4.5, 6.0])));
        assert_eq!(out.values("date"), Some(&Values::Int(vec![20000101, 20000102])));
    }

    #[test]
    fn test_unreadable_input_aborts() {
        let catalog = MemoryCatalog::new();
        let mut table = TraversalTable::from_reader(&input(), &[]).unwrap();
        table.plan(&RegridNames::default(), GridConversion::OneToOne);
        let map = SparseMap::default();
        let weights = WeightContext {
            map: &map,
            src_grid_size: 3,
            dst_grid_size: 2,
            threshold: WeightThreshold::Disabled,
        };
        let pool = build_pool(1).unwrap();
        let result = process_fields(&pool, &catalog, Path::new("in.nc"), &mut output(), &table, weights);
        assert!(matches!(result, Err(RegridError::Dataset(_))));
    }
}
