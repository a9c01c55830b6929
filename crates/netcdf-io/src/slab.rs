//! Hyperslab extraction from row-major buffers.

use crate::error::{NetCdfError, NetCdfResult};

/// Start/count/stride selection along every dimension of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    pub stride: Vec<usize>,
}

impl Hyperslab {
    /// Contiguous selection (stride 1 everywhere).
    pub fn contiguous(start: &[usize], count: &[usize]) -> Self {
        Self {
            start: start.to_vec(),
            count: count.to_vec(),
            stride: vec![1; count.len()],
        }
    }

    pub fn strided(start: &[usize], count: &[usize], stride: &[usize]) -> Self {
        Self {
            start: start.to_vec(),
            count: count.to_vec(),
            stride: stride.to_vec(),
        }
    }

    /// Number of selected elements.
    pub fn size(&self) -> usize {
        self.count.iter().product()
    }

    /// Check the selection against a variable shape.
    pub fn validate(&self, shape: &[usize]) -> NetCdfResult<()> {
        let rank = shape.len();
        if self.start.len() != rank || self.count.len() != rank || self.stride.len() != rank {
            return Err(NetCdfError::invalid(format!(
                "hyperslab rank mismatch: variable has {} dimensions",
                rank
            )));
        }
        for d in 0..rank {
            if self.stride[d] == 0 {
                return Err(NetCdfError::invalid(format!("zero stride in dimension {}", d)));
            }
            if self.count[d] == 0 {
                continue;
            }
            let last = self.start[d] + (self.count[d] - 1) * self.stride[d];
            if last >= shape[d] {
                return Err(NetCdfError::invalid(format!(
                    "hyperslab index {} exceeds dimension {} of length {}",
                    last, d, shape[d]
                )));
            }
        }
        Ok(())
    }

    /// Copy the selected elements out of a full row-major buffer.
    pub fn extract<T: Copy>(&self, data: &[T], shape: &[usize]) -> NetCdfResult<Vec<T>> {
        self.validate(shape)?;
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(NetCdfError::invalid(format!(
                "buffer holds {} values, shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }

        let total = self.size();
        let mut out = Vec::with_capacity(total);
        if total == 0 {
            return Ok(out);
        }

        // Row-major element strides of the full array
        let rank = shape.len();
        let mut pitch = vec![1usize; rank];
        for d in (0..rank.saturating_sub(1)).rev() {
            pitch[d] = pitch[d + 1] * shape[d + 1];
        }

        let mut counter = vec![0usize; rank];
        for _ in 0..total {
            let offset: usize = (0..rank)
                .map(|d| (self.start[d] + counter[d] * self.stride[d]) * pitch[d])
                .sum();
            out.push(data[offset]);

            for d in (0..rank).rev() {
                counter[d] += 1;
                if counter[d] < self.count[d] {
                    break;
                }
                counter[d] = 0;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_contiguous_row() {
        let data: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let slab = Hyperslab::contiguous(&[1, 0], &[1, 4]);
        assert_eq!(slab.extract(&data, &[3, 4]).unwrap(), vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_extract_strided_column() {
        // 3 latitudes x 4 longitudes unrolled; every 4th value is one latitude
        let data: Vec<f64> = (0..12).map(|x| x as f64).collect();
        let slab = Hyperslab::strided(&[0], &[3], &[4]);
        assert_eq!(slab.extract(&data, &[12]).unwrap(), vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_extract_strided_rows_of_corners() {
        // 6 cells x 2 corners, take corners of every 3rd cell
        let data: Vec<i32> = (0..12).collect();
        let slab = Hyperslab::strided(&[0, 0], &[2, 2], &[3, 1]);
        assert_eq!(slab.extract(&data, &[6, 2]).unwrap(), vec![0, 1, 6, 7]);
    }

    #[test]
    fn test_extract_out_of_range() {
        let data = vec![0.0; 4];
        let slab = Hyperslab::strided(&[0], &[3], &[2]);
        assert!(slab.extract(&data, &[4]).is_err());
    }

    #[test]
    fn test_extract_scalar() {
        let data = vec![42.0];
        let slab = Hyperslab::contiguous(&[], &[]);
        assert_eq!(slab.extract(&data, &[]).unwrap(), vec![42.0]);
    }
}
