//! Periodic-lattice affinity regimes (`1D` and `Circulant`).
//!
//! Sites sit on a ring of `S` positions. The kernel's first column is a
//! Gaussian density sampled at `x = linspace(-S/2, S/2, S) / niche_width`,
//! and the full matrix is circulant: `K[i, j] = k[(i - j) mod S]`.
//! A receptor placed at lattice position `p` takes row `p` of `K`.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use rand::{Rng, RngCore};

use super::{AffinityMatrices, AffinitySampler};
use crate::config::AffinityParameters;

/// Standard normal density.
#[inline]
fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Periodic Gaussian kernel on `num_sites` lattice positions.
///
/// With `normalize_peak` the density is divided by its value at zero, so a
/// receptor sitting exactly on a site has affinity 1.
pub fn periodic_kernel(num_sites: usize, niche_width: f64, normalize_peak: bool) -> DMatrix<f64> {
    let s = num_sites as f64;
    let peak = if normalize_peak { normal_pdf(0.0) } else { 1.0 };

    let column: Vec<f64> = (0..num_sites)
        .map(|m| {
            let x = if num_sites == 1 {
                -s / 2.0
            } else {
                -s / 2.0 + s * m as f64 / (s - 1.0)
            };
            normal_pdf(x / niche_width) / peak
        })
        .collect();

    DMatrix::from_fn(num_sites, num_sites, |i, j| {
        column[(i + num_sites - j) % num_sites]
    })
}

/// Copy the selected kernel rows into a new matrix, optionally scaled.
fn select_rows(kernel: &DMatrix<f64>, rows: &[usize], scale: f64) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), kernel.ncols(), |r, j| scale * kernel[(rows[r], j)])
}

/// `1D`: peak-normalised kernel, positions drawn uniformly with replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneDimensionalSampler;

impl AffinitySampler for OneDimensionalSampler {
    fn sample(&self, params: &AffinityParameters, rng: &mut dyn RngCore) -> AffinityMatrices {
        let kernel = periodic_kernel(params.num_sites, params.niche_width, true);

        let tcell_choice: Vec<usize> = (0..params.num_tcell)
            .map(|_| rng.gen_range(0..params.num_sites))
            .collect();
        let treg_choice: Vec<usize> = (0..params.num_treg)
            .map(|_| rng.gen_range(0..params.num_sites))
            .collect();

        AffinityMatrices {
            pix: select_rows(&kernel, &tcell_choice, 1.0),
            palphax: select_rows(&kernel, &treg_choice, params.c),
        }
    }
}

/// `Circulant`: raw density kernel, positions evenly spaced over the ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct CirculantSampler;

impl AffinitySampler for CirculantSampler {
    fn sample(&self, params: &AffinityParameters, _rng: &mut dyn RngCore) -> AffinityMatrices {
        let kernel = periodic_kernel(params.num_sites, params.niche_width, false);

        let tcell_rows = evenly_spaced(params.num_sites, params.num_tcell);
        let treg_rows = evenly_spaced(params.num_sites, params.num_treg);

        AffinityMatrices {
            pix: select_rows(&kernel, &tcell_rows, 1.0),
            palphax: select_rows(&kernel, &treg_rows, params.c),
        }
    }
}

/// `count` indices from 0 to `num_sites - 1` inclusive, truncated toward zero.
pub(crate) fn evenly_spaced(num_sites: usize, count: usize) -> Vec<usize> {
    if count == 1 {
        return vec![0];
    }
    (0..count)
        .map(|k| k * (num_sites - 1) / (count - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_kernel_is_circulant() {
        let k = periodic_kernel(7, 1.5, true);
        for i in 0..7 {
            for j in 0..7 {
                assert_eq!(k[(i, j)], k[((i + 1) % 7, (j + 1) % 7)]);
            }
        }
    }

    #[test]
    fn test_normalized_peak_is_one_for_odd_lattice() {
        // Odd S puts a grid point exactly at x = 0.
        let k = periodic_kernel(9, 2.0, true);
        let max = k.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
        assert!(k.iter().all(|&x| x > 0.0 && x <= 1.0 + 1e-12));
    }

    #[test]
    fn test_unnormalized_peak_is_density() {
        let k = periodic_kernel(9, 2.0, false);
        let max = k.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max - normal_pdf(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_evenly_spaced_endpoints() {
        assert_eq!(evenly_spaced(10, 4), vec![0, 3, 6, 9]);
        assert_eq!(evenly_spaced(10, 1), vec![0]);
        assert_eq!(evenly_spaced(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_one_dimensional_rows_come_from_kernel() {
        let params = AffinityParameters {
            num_tcell: 5,
            num_treg: 4,
            num_sites: 11,
            niche_width: 1.0,
            c: 3.0,
            ..Default::default()
        };
        let kernel = periodic_kernel(11, 1.0, true);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let m = OneDimensionalSampler.sample(&params, &mut rng);

        let matches_kernel_row = |m: &DMatrix<f64>, i: usize, scale: f64| {
            (0..11).any(|p| (0..11).all(|j| (scale * kernel[(p, j)] - m[(i, j)]).abs() < 1e-12))
        };
        for i in 0..5 {
            assert!(matches_kernel_row(&m.pix, i, 1.0));
        }
        for i in 0..4 {
            assert!(matches_kernel_row(&m.palphax, i, 3.0));
        }
    }

    #[test]
    fn test_circulant_is_deterministic() {
        let params = AffinityParameters {
            num_tcell: 4,
            num_treg: 3,
            num_sites: 10,
            ..Default::default()
        };
        let a = CirculantSampler.sample(&params, &mut ChaCha8Rng::seed_from_u64(1));
        let b = CirculantSampler.sample(&params, &mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(a, b);
    }
}
