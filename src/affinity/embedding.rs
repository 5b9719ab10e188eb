//! Multidimensional shape-space affinity regime.
//!
//! Sites and receptors are standard-normal points in `shape_dim` dimensions.
//! Affinity = exp(-|r - a|² / (2σ²)); Treg rows are scaled by `c`.

use nalgebra::DMatrix;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use super::{AffinityMatrices, AffinitySampler};
use crate::config::AffinityParameters;

#[derive(Debug, Clone, Copy, Default)]
pub struct MultidimensionalSampler;

impl AffinitySampler for MultidimensionalSampler {
    fn sample(&self, params: &AffinityParameters, rng: &mut dyn RngCore) -> AffinityMatrices {
        let dim = params.shape_dim;
        // Draw order: antigens, T-cell receptors, Treg receptors.
        let antigens = standard_normal_points(params.num_sites, dim, rng);
        let receptors = standard_normal_points(params.num_tcell, dim, rng);
        let receptors_reg = standard_normal_points(params.num_treg, dim, rng);

        AffinityMatrices {
            pix: gaussian_kernel(&receptors, &antigens, params.sigma, 1.0),
            palphax: gaussian_kernel(&receptors_reg, &antigens, params.sigma, params.c),
        }
    }
}

/// `n × dim` matrix of independent standard-normal coordinates.
fn standard_normal_points(n: usize, dim: usize, rng: &mut dyn RngCore) -> DMatrix<f64> {
    let mut points = DMatrix::zeros(n, dim);
    for i in 0..n {
        for k in 0..dim {
            points[(i, k)] = rng.sample(StandardNormal);
        }
    }
    points
}

/// `scale · exp(-d²(x_i, y_j) / (2σ²))` for every row pair.
pub fn gaussian_kernel(x: &DMatrix<f64>, y: &DMatrix<f64>, sigma: f64, scale: f64) -> DMatrix<f64> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    DMatrix::from_fn(x.nrows(), y.nrows(), |i, j| {
        let sq_dist = (x.row(i) - y.row(j)).norm_squared();
        scale * (-sq_dist / two_sigma_sq).exp()
    })
}
