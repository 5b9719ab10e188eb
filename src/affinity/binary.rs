//! Binary (Bernoulli) affinity regime.
//!
//! pix[i,j] = 1 with probability `pval_cell`.
//! palphax[a,j] = (c + N(0, sigma_cp)) with probability `pval_treg`, else 0.

use nalgebra::DMatrix;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use super::{binary_random_matrix, AffinityMatrices, AffinitySampler};
use crate::config::AffinityParameters;

#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySampler;

impl AffinitySampler for BinarySampler {
    fn sample(&self, params: &AffinityParameters, rng: &mut dyn RngCore) -> AffinityMatrices {
        let pix = binary_random_matrix(params.num_tcell, params.num_sites, params.pval_cell, rng);

        // Strength noise is drawn for every entry before the mask.
        let strengths = noisy_strengths(
            params.num_treg,
            params.num_sites,
            params.c,
            params.sigma_cp,
            rng,
        );
        let mask = binary_random_matrix(params.num_treg, params.num_sites, params.pval_treg, rng);

        AffinityMatrices {
            pix,
            palphax: strengths.component_mul(&mask),
        }
    }
}

/// `c + N(0, sigma)` for every entry, drawn row by row.
pub(crate) fn noisy_strengths(
    rows: usize,
    cols: usize,
    c: f64,
    sigma: f64,
    rng: &mut dyn RngCore,
) -> DMatrix<f64> {
    let mut m = DMatrix::from_element(rows, cols, c);
    for i in 0..rows {
        for j in 0..cols {
            let z: f64 = rng.sample(StandardNormal);
            m[(i, j)] += sigma * z;
        }
    }
    m
}
