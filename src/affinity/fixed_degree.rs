//! Fixed-degree affinity regime.
//!
//! T-cells are Binary-sampled. Each site column of the Treg matrix gets a
//! noisy number of non-zero entries, each `c + N(0, sigma_c)`, placed at
//! random Tregs.
//!
//! Degree rule: `round(max(0, degree + N(0, sigma_degree)))`, capped at the
//! number of Tregs. Rounding is half away from zero.

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use super::{binary_random_matrix, AffinityMatrices, AffinitySampler};
use crate::config::AffinityParameters;

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDegreeSampler;

impl AffinitySampler for FixedDegreeSampler {
    fn sample(&self, params: &AffinityParameters, rng: &mut dyn RngCore) -> AffinityMatrices {
        let pix = binary_random_matrix(params.num_tcell, params.num_sites, params.pval_cell, rng);

        let degrees: Vec<usize> = (0..params.num_sites)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                clip_degree(params.degree + z * params.sigma_degree, params.num_treg)
            })
            .collect();

        let mut palphax = DMatrix::zeros(params.num_treg, params.num_sites);
        let mut column = vec![0.0; params.num_treg];
        for (j, &d) in degrees.iter().enumerate() {
            column.iter_mut().for_each(|x| *x = 0.0);
            for entry in column.iter_mut().take(d) {
                let z: f64 = rng.sample(StandardNormal);
                *entry = params.c + z * params.sigma_c;
            }
            column.shuffle(&mut *rng);
            for (a, &value) in column.iter().enumerate() {
                palphax[(a, j)] = value;
            }
        }

        AffinityMatrices { pix, palphax }
    }
}

/// Floor a noisy degree at zero, round it, cap it at `max`.
pub fn clip_degree(raw: f64, max: usize) -> usize {
    if !(raw > 0.0) {
        return 0;
    }
    (raw.round() as usize).min(max)
}
