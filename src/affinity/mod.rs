//! Affinity sampling between cell receptors and antigen/niche sites.
//!
//! Five regimes are supported, each an [`AffinitySampler`]:
//! - `Binary`: independent Bernoulli interactions, noisy Treg strengths
//! - `1D`: Gaussian niches on a periodic lattice, random placement
//! - `Multidimensional`: Gaussian kernel between standard-normal embeddings
//! - `Circulant`: unnormalised periodic kernel, evenly spaced placement
//! - `Fixed_degree`: Binary T-cells, fixed number of Tregs per site
//!
//! All randomness goes through the caller's RNG so runs are reproducible.

pub mod binary;
pub mod embedding;
pub mod fixed_degree;
pub mod lattice;

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::AffinityParameters;
use crate::error::{Result, SimError};

pub use binary::BinarySampler;
pub use embedding::MultidimensionalSampler;
pub use fixed_degree::FixedDegreeSampler;
pub use lattice::{periodic_kernel, CirculantSampler, OneDimensionalSampler};

/// Sampling regime selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SamplingMode {
    Binary,
    OneDimensional,
    Multidimensional,
    Circulant,
    FixedDegree,
}

impl SamplingMode {
    pub const ALL: [SamplingMode; 5] = [
        SamplingMode::Binary,
        SamplingMode::OneDimensional,
        SamplingMode::Multidimensional,
        SamplingMode::Circulant,
        SamplingMode::FixedDegree,
    ];

    /// Name used in parameter files
    pub fn name(self) -> &'static str {
        match self {
            SamplingMode::Binary => "Binary",
            SamplingMode::OneDimensional => "1D",
            SamplingMode::Multidimensional => "Multidimensional",
            SamplingMode::Circulant => "Circulant",
            SamplingMode::FixedDegree => "Fixed_degree",
        }
    }

    /// Strategy object for this regime
    pub fn sampler(self) -> Box<dyn AffinitySampler> {
        match self {
            SamplingMode::Binary => Box::new(BinarySampler),
            SamplingMode::OneDimensional => Box::new(OneDimensionalSampler),
            SamplingMode::Multidimensional => Box::new(MultidimensionalSampler),
            SamplingMode::Circulant => Box::new(CirculantSampler),
            SamplingMode::FixedDegree => Box::new(FixedDegreeSampler),
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SamplingMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match SamplingMode::ALL.iter().find(|mode| mode.name() == s) {
            Some(mode) => Ok(*mode),
            None => {
                log::error!(
                    "Invalid sampling choice {:?}. Valid choices are Binary, 1D, Multidimensional, Circulant or Fixed_degree.",
                    s
                );
                Err(SimError::config(format!("unknown sampling mode {:?}", s)))
            }
        }
    }
}

impl TryFrom<String> for SamplingMode {
    type Error = SimError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SamplingMode> for String {
    fn from(mode: SamplingMode) -> Self {
        mode.name().to_string()
    }
}

/// T-cell and Treg affinity matrices for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityMatrices {
    /// `num_tcell × num_sites`
    pub pix: DMatrix<f64>,
    /// `num_treg × num_sites`, scaled by the coupling `c`
    pub palphax: DMatrix<f64>,
}

impl AffinityMatrices {
    pub fn num_tcell(&self) -> usize {
        self.pix.nrows()
    }

    pub fn num_treg(&self) -> usize {
        self.palphax.nrows()
    }

    pub fn num_sites(&self) -> usize {
        self.pix.ncols()
    }
}

/// One affinity sampling regime.
pub trait AffinitySampler {
    /// Draw `(pix, palphax)` for the given parameters.
    ///
    /// Parameters are assumed validated; implementors read only the options
    /// their regime uses.
    fn sample(&self, params: &AffinityParameters, rng: &mut dyn RngCore) -> AffinityMatrices;
}

/// Validate `params` and draw affinities with the configured regime.
pub fn generate(params: &AffinityParameters, rng: &mut dyn RngCore) -> Result<AffinityMatrices> {
    params.validate()?;
    let matrices = params.sampling.sampler().sample(params, rng);
    log::debug!(
        "Sampled {} affinities: pix {}x{}, palphax {}x{}",
        params.sampling,
        matrices.pix.nrows(),
        matrices.pix.ncols(),
        matrices.palphax.nrows(),
        matrices.palphax.ncols()
    );
    Ok(matrices)
}

/// Parse a sampling name and draw affinities; unknown names are configuration errors.
pub fn generate_named(
    sampling: &str,
    params: &AffinityParameters,
    rng: &mut dyn RngCore,
) -> Result<AffinityMatrices> {
    let mode: SamplingMode = sampling.parse()?;
    let params = AffinityParameters {
        sampling: mode,
        ..params.clone()
    };
    generate(&params, rng)
}

/// 0/1 matrix with each entry set independently with probability `p`.
pub fn binary_random_matrix(
    rows: usize,
    cols: usize,
    p: f64,
    rng: &mut dyn RngCore,
) -> DMatrix<f64> {
    // Row-major draw order so the stream matches a row-by-row scan.
    let mut m = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            if rng.gen::<f64>() < p {
                m[(i, j)] = 1.0;
            }
        }
    }
    m
}
