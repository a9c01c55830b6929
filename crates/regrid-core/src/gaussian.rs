//! Gaussian quadrature latitudes and weights.
//!
//! Latitudes are the roots of the Legendre polynomial of degree N, found by
//! Newton iteration seeded from the zeros of the Bessel function J0.

use std::f64::consts::PI;

use crate::error::{RegridError, Result};

/// Tabulated zeros of J0. Further zeros are spaced by pi.
const BESSEL_ZEROS: [f64; 50] = [
    2.4048255577,
    5.5200781103,
    8.6537279129,
    11.7915344391,
    14.9309177086,
    18.0710639679,
    21.2116366299,
    24.3524715308,
    27.4934791320,
    30.6346064684,
    33.7758202136,
    36.9170983537,
    40.0584257646,
    43.1997917132,
    46.3411883717,
    49.4826098974,
    52.6240518411,
    55.7655107550,
    58.9069839261,
    62.0484691902,
    65.1899648002,
    68.3314693299,
    71.4729816036,
    74.6145006437,
    77.7560256304,
    80.8975558711,
    84.0390907769,
    87.1806298436,
    90.3221726372,
    93.4637187819,
    96.6052679510,
    99.7468198587,
    102.8883742542,
    106.0299309165,
    109.1714896498,
    112.3130502805,
    115.4546126537,
    118.5961766309,
    121.7377420880,
    124.8793089132,
    128.0208770059,
    131.1624462752,
    134.3040166383,
    137.4455880203,
    140.5871603528,
    143.7287335737,
    146.8703076258,
    150.0118824570,
    153.1534580192,
    156.2950342685,
];

/// Newton iterations allowed per root.
pub const MAX_ITERATIONS: usize = 20;

/// Newton step size below which a root is converged.
pub const CONVERGENCE_EPS: f64 = 1.0e-15;

/// First `count` positive zeros of J0.
pub fn bessel_zeros(count: usize) -> Vec<f64> {
    let mut zeros = Vec::with_capacity(count);
    for i in 0..count {
        let zero = match BESSEL_ZEROS.get(i) {
            Some(&z) => z,
            None => zeros[i - 1] + PI,
        };
        zeros.push(zero);
    }
    zeros
}

/// Gaussian latitudes and weights for `count` latitudes.
///
/// Returns `(sin_lat, weights)` ordered from south to north. The weights sum
/// to 2.
pub fn gaussian_latitudes(count: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if count == 0 {
        return Err(RegridError::numerical("Gaussian grid needs at least one latitude"));
    }

    let n = count as f64;
    let half = count / 2;
    let c = 0.25 * (1.0 - 4.0 / (PI * PI));
    let zeros = bessel_zeros(half);

    // North-to-south work arrays, 1-based to keep the symmetry arithmetic plain
    let mut sin_p1 = vec![0.0; count + 1];
    let mut wgt_p1 = vec![0.0; count + 1];

    for i in 1..=half {
        let mut xz = (zeros[i - 1] / ((n + 0.5) * (n + 0.5) + c).sqrt()).cos();
        let mut pkm1;
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return Err(RegridError::numerical(format!(
                    "Gaussian root {} of {} did not converge in {} iterations",
                    i, count, MAX_ITERATIONS
                )));
            }
            let mut pkm2 = 1.0;
            pkm1 = xz;
            let mut pk = xz;
            for k in 2..=count {
                let kf = k as f64;
                pk = ((2.0 * kf - 1.0) * xz * pkm1 - (kf - 1.0) * pkm2) / kf;
                pkm2 = pkm1;
                pkm1 = pk;
            }
            pkm1 = pkm2;
            let pkmrk = n * (pkm1 - xz * pk) / (1.0 - xz * xz);
            let step = pk / pkmrk;
            xz -= step;
            if step.abs() <= CONVERGENCE_EPS {
                break;
            }
        }
        sin_p1[i] = xz;
        wgt_p1[i] = 2.0 * (1.0 - xz * xz) / ((n * pkm1) * (n * pkm1));
    }

    if count % 2 == 1 {
        // Equator
        sin_p1[half + 1] = 0.0;
        let mut pk = 2.0 / (n * n);
        let mut k = 2;
        while k <= count {
            let kf = k as f64;
            pk = pk * kf * kf / ((kf - 1.0) * (kf - 1.0));
            k += 2;
        }
        wgt_p1[half + 1] = pk;
    }

    for i in 1..=half {
        sin_p1[count - i + 1] = -sin_p1[i];
        wgt_p1[count - i + 1] = wgt_p1[i];
    }

    let sin_lat = (0..count).map(|i| sin_p1[count - i]).collect();
    let weights = (0..count).map(|i| wgt_p1[count - i]).collect();
    Ok((sin_lat, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_bessel_zeros_extend_by_pi() {
        let zeros = bessel_zeros(52);
        assert_eq!(zeros.len(), 52);
        assert_eq!(zeros[0], 2.4048255577);
        assert_eq!(zeros[49], 156.2950342685);
        assert_approx_eq!(zeros[50], 156.2950342685 + PI, 1e-12);
        assert_approx_eq!(zeros[51], 156.2950342685 + 2.0 * PI, 1e-12);
        assert!(bessel_zeros(0).is_empty());
    }

    #[test]
    fn test_single_latitude() {
        let (sin_lat, weights) = gaussian_latitudes(1).unwrap();
        assert_eq!(sin_lat, vec![0.0]);
        assert_approx_eq!(weights[0], 2.0, 1e-15);
    }

    #[test]
    fn test_two_point_rule() {
        let (sin_lat, weights) = gaussian_latitudes(2).unwrap();
        let root = 1.0 / 3.0_f64.sqrt();
        assert_approx_eq!(sin_lat[0], -root, 1e-14);
        assert_approx_eq!(sin_lat[1], root, 1e-14);
        assert_approx_eq!(weights[0], 1.0, 1e-14);
        assert_approx_eq!(weights[1], 1.0, 1e-14);
    }

    #[test]
    fn test_three_point_rule() {
        let (sin_lat, weights) = gaussian_latitudes(3).unwrap();
        let root = (3.0_f64 / 5.0).sqrt();
        assert_approx_eq!(sin_lat[0], -root, 1e-14);
        assert_eq!(sin_lat[1], 0.0);
        assert_approx_eq!(weights[1], 8.0 / 9.0, 1e-14);
        assert_approx_eq!(weights[0], 5.0 / 9.0, 1e-14);
    }

    #[test]
    fn test_weights_sum_to_two() {
        for count in (1..=64).chain([94, 128, 192, 256]) {
            let (sin_lat, weights) = gaussian_latitudes(count).unwrap();
            let total: f64 = weights.iter().sum();
            assert!((total - 2.0).abs() < 1e-12, "N={} sum={}", count, total);
            assert!(weights.iter().all(|&w| w > 0.0));
            assert!(sin_lat.windows(2).all(|p| p[0] < p[1]), "N={} not ascending", count);
        }
    }

    #[test]
    fn test_antisymmetry() {
        for count in [7, 8, 64, 65] {
            let (sin_lat, weights) = gaussian_latitudes(count).unwrap();
            for i in 0..count {
                assert_eq!(sin_lat[i], -sin_lat[count - 1 - i]);
                assert_eq!(weights[i], weights[count - 1 - i]);
            }
        }
    }

    #[test]
    fn test_zero_latitudes_rejected() {
        assert!(matches!(gaussian_latitudes(0), Err(RegridError::Numerical(_))));
    }
}
