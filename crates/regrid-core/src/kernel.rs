//! Sparse weight application.

use crate::config::WeightThreshold;
use crate::error::{RegridError, Result};
use crate::map::SparseMap;

/// Apply the sparse map to every level of a field.
///
/// `input` holds `levels * src_grid_size` values with the horizontal grid
/// varying fastest. Values equal to `missing` are skipped; destination cells
/// that receive no valid contribution are set to `missing`. With a threshold
/// configured, cells are divided by their valid weight mass when that mass
/// reaches the threshold and set to `missing` otherwise. A threshold of 0
/// divides every cell with at least one valid contribution.
pub fn apply_weights(
    map: &SparseMap,
    src_grid_size: usize,
    dst_grid_size: usize,
    input: &[f64],
    missing: Option<f64>,
    threshold: WeightThreshold,
) -> Result<Vec<f64>> {
    if src_grid_size == 0 || dst_grid_size == 0 {
        return Err(RegridError::config("grid sizes must be positive"));
    }
    map.check_bounds(src_grid_size, dst_grid_size)?;
    if input.len() % src_grid_size != 0 {
        return Err(RegridError::config(format!(
            "field of {} values is not a whole number of {}-cell source levels",
            input.len(),
            src_grid_size
        )));
    }
    let levels = input.len() / src_grid_size;
    let mut output = vec![0.0; levels * dst_grid_size];

    let Some(mss) = missing else {
        for lvl in 0..levels {
            let src = &input[lvl * src_grid_size..(lvl + 1) * src_grid_size];
            let dst = &mut output[lvl * dst_grid_size..(lvl + 1) * dst_grid_size];
            for ((&s, &d), &w) in map.src_address.iter().zip(&map.dst_address).zip(&map.weights) {
                dst[d] += src[s] * w;
            }
        }
        return Ok(output);
    };

    let renormalize = threshold.value();
    let track_weight = threshold.is_enabled();
    let mut wgt_vld = vec![0.0; dst_grid_size];
    let mut tally = vec![0usize; dst_grid_size];
    for lvl in 0..levels {
        let src = &input[lvl * src_grid_size..(lvl + 1) * src_grid_size];
        let dst = &mut output[lvl * dst_grid_size..(lvl + 1) * dst_grid_size];
        wgt_vld.iter_mut().for_each(|w| *w = 0.0);
        tally.iter_mut().for_each(|t| *t = 0);

        for ((&s, &d), &w) in map.src_address.iter().zip(&map.dst_address).zip(&map.weights) {
            let value = src[s];
            if value == mss {
                continue;
            }
            dst[d] += value * w;
            if track_weight {
                wgt_vld[d] += w;
            }
            tally[d] += 1;
        }

        for (j, cell) in dst.iter_mut().enumerate() {
            if tally[j] == 0 {
                *cell = mss;
                continue;
            }
            match renormalize {
                Some(t) if t == 0.0 => *cell /= wgt_vld[j],
                Some(t) if wgt_vld[j] >= t => *cell /= wgt_vld[j],
                Some(_) => *cell = mss,
                None => {}
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    const MSS: f64 = -999.0;

    fn identity(n: usize) -> SparseMap {
        SparseMap::new((0..n).collect(), (0..n).collect(), vec![1.0; n]).unwrap()
    }

    /// Two destination cells averaging source cells {0,1} and {1,2}.
    fn pairs() -> SparseMap {
        SparseMap::new(vec![0, 1, 1, 2], vec![0, 0, 1, 1], vec![0.5; 4]).unwrap()
    }

    #[test]
    fn test_identity_reproduces_input() {
        let input = [1.5, -2.0, 3.25, 4.0];
        let out = apply_weights(&identity(4), 4, 4, &input, None, WeightThreshold::Disabled).unwrap();
        assert_eq!(out, input.to_vec());
    }

    #[test]
    fn test_missing_with_threshold_renormalizes() {
        let input = [10.0, MSS, 30.0];
        let out = apply_weights(&pairs(), 3, 2, &input, Some(MSS), WeightThreshold::Threshold(0.5)).unwrap();
        // Valid mass of each cell is exactly the threshold
        assert_eq!(out, vec![10.0, 30.0]);
    }

    #[test]
    fn test_missing_without_renormalization_keeps_raw_sum() {
        let input = [10.0, MSS, 30.0];
        let out = apply_weights(&pairs(), 3, 2, &input, Some(MSS), WeightThreshold::Disabled).unwrap();
        assert_eq!(out, vec![5.0, 15.0]);
    }

    #[test]
    fn test_zero_threshold_divides_any_valid_cell() {
        let map = SparseMap::new(vec![0, 1], vec![0, 0], vec![0.01, 0.99]).unwrap();
        let out = apply_weights(&map, 2, 1, &[7.0, MSS], Some(MSS), WeightThreshold::Threshold(0.0)).unwrap();
        assert_approx_eq!(out[0], 7.0, 1e-12);

        let out = apply_weights(&map, 2, 1, &[7.0, MSS], Some(MSS), WeightThreshold::Threshold(0.02)).unwrap();
        assert_eq!(out[0], MSS);
    }

    #[test]
    fn test_cells_without_valid_links_get_sentinel() {
        let input = [MSS, MSS, 30.0];
        for threshold in [
            WeightThreshold::Disabled,
            WeightThreshold::Threshold(0.0),
            WeightThreshold::Threshold(0.5),
        ] {
            let out = apply_weights(&pairs(), 3, 2, &input, Some(MSS), threshold).unwrap();
            assert_eq!(out[0], MSS);
        }

        // Unreached destination cell
        let map = SparseMap::new(vec![0], vec![0], vec![1.0]).unwrap();
        let out = apply_weights(&map, 1, 2, &[4.0], Some(MSS), WeightThreshold::Disabled).unwrap();
        assert_eq!(out, vec![4.0, MSS]);
    }

    #[test]
    fn test_levels_use_per_level_offsets() {
        // Two levels, source cells {0,1} averaged into one destination cell
        let map = SparseMap::new(vec![0, 1], vec![0, 0], vec![0.5, 0.5]).unwrap();
        let input = [1.0, 3.0, 10.0, MSS];
        let out = apply_weights(&map, 2, 1, &input, Some(MSS), WeightThreshold::Threshold(0.5)).unwrap();
        assert_eq!(out, vec![2.0, 10.0]);

        let out = apply_weights(&map, 2, 1, &[1.0, 3.0, 10.0, 20.0], None, WeightThreshold::Disabled).unwrap();
        assert_eq!(out, vec![2.0, 15.0]);
    }

    #[test]
    fn test_partial_levels_rejected() {
        let result = apply_weights(&identity(4), 4, 4, &[1.0; 6], None, WeightThreshold::Disabled);
        assert!(matches!(result, Err(RegridError::Config(_))));
    }

    #[test]
    fn test_conservation_without_missing() {
        let map = SparseMap::new(
            vec![0, 1, 2, 2, 3, 4],
            vec![0, 0, 1, 2, 2, 2],
            vec![0.3, 0.7, 0.4, 0.6, 0.25, 0.75],
        )
        .unwrap();
        let input = [2.0, 4.0, 8.0, 16.0, 32.0];
        let out = apply_weights(&map, 5, 3, &input, None, WeightThreshold::Threshold(0.5)).unwrap();
        let expected: f64 = map
            .src_address
            .iter()
            .zip(&map.weights)
            .map(|(&s, &w)| input[s] * w)
            .sum();
        assert_approx_eq!(out.iter().sum::<f64>(), expected, 1e-12);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let map = SparseMap::new(
            vec![0, 1, 2, 1, 2, 3, 3],
            vec![0, 0, 0, 1, 1, 1, 2],
            vec![0.2, 0.3, 0.5, 0.6, 0.1, 0.3, 1.0],
        )
        .unwrap();
        let input = [1.0, MSS, 3.0, 4.0];
        let mut previous: Option<Vec<f64>> = None;
        for t in [0.0, 0.2, 0.4, 0.7, 0.9, 1.0] {
            let out = apply_weights(&map, 4, 3, &input, Some(MSS), WeightThreshold::Threshold(t)).unwrap();
            if let Some(prev) = &previous {
                for (p, o) in prev.iter().zip(&out) {
                    if *p == MSS {
                        assert_eq!(*o, MSS, "cell revived at threshold {}", t);
                    }
                }
            }
            previous = Some(out);
        }
    }
}
