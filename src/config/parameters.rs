//! Parameter structures for one simulation run.
//!
//! Every section has a `Default` and a `validate` that reports the first
//! out-of-range option as a configuration error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::affinity::SamplingMode;
use crate::dynamics::IntegratorConfig;
use crate::equilibrium::SolverConfig;
use crate::error::{Result, SimError};

/// Top-level parameters container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Affinity sampling regime and population sizes
    pub affinity: AffinityParameters,
    /// Site abundance weights `vx`
    pub site_weights: SiteWeights,
    /// Initial populations, time span and model choice
    pub dynamics: DynamicsParameters,
    /// Adaptive integrator tolerances and budget
    pub integrator: IntegratorConfig,
    /// Interior-point solver tolerances and iteration cap
    pub solver: SolverConfig,
    /// Seed for every random draw in the run
    pub seed: u64,
}

impl SimulationParameters {
    /// Load parameters from a JSON file.
    ///
    /// Missing files, unreadable files and malformed JSON are all
    /// configuration errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SimError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let params: Self = serde_json::from_str(&contents)
            .map_err(|e| SimError::config(format!("cannot parse {}: {}", path.display(), e)))?;
        params.validate()?;
        log::info!("Loaded simulation parameters from {:?}", path);
        Ok(params)
    }

    /// Load from JSON, or use defaults if the file does not exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::info!("Parameter file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.affinity.validate()?;
        self.site_weights.validate(self.affinity.num_sites)?;
        self.dynamics.validate()?;
        self.integrator.validate()?;
        self.solver.validate()
    }
}

/// Affinity sampling options.
///
/// Only the options read by the active `sampling` mode matter; the rest are
/// still validated so a parameter file cannot carry nonsense.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityParameters {
    /// Sampling regime
    pub sampling: SamplingMode,
    /// Number of effector T-cell clones
    #[serde(alias = "Num_tcell")]
    pub num_tcell: usize,
    /// Number of regulatory T-cell clones
    #[serde(alias = "Num_treg")]
    pub num_treg: usize,
    /// Number of antigen/niche sites
    #[serde(alias = "Num_sites")]
    pub num_sites: usize,
    /// Bernoulli probability of a T-cell/site interaction (Binary, Fixed_degree)
    pub pval_cell: f64,
    /// Bernoulli probability of a Treg/site interaction (Binary)
    pub pval_treg: f64,
    /// Global Treg coupling scale
    pub c: f64,
    /// Std dev of Treg affinity noise (Binary)
    pub sigma_cp: f64,
    /// Gaussian kernel width on the periodic lattice (1D, Circulant)
    pub niche_width: f64,
    /// Embedding dimension (Multidimensional)
    pub shape_dim: usize,
    /// Gaussian kernel width in the embedding (Multidimensional)
    pub sigma: f64,
    /// Mean number of Tregs per site (Fixed_degree)
    pub degree: f64,
    /// Std dev of the per-site degree (Fixed_degree)
    pub sigma_degree: f64,
    /// Std dev of Treg affinity around `c` (Fixed_degree)
    pub sigma_c: f64,
}

impl Default for AffinityParameters {
    fn default() -> Self {
        Self {
            sampling: SamplingMode::Binary,
            num_tcell: 20,
            num_treg: 20,
            num_sites: 100,
            pval_cell: 0.1,
            pval_treg: 0.1,
            c: 1.0,
            sigma_cp: 0.1,
            niche_width: 1.0,
            shape_dim: 2,
            sigma: 1.0,
            degree: 5.0,
            sigma_degree: 1.0,
            sigma_c: 0.1,
        }
    }
}

impl AffinityParameters {
    pub fn validate(&self) -> Result<()> {
        for (name, n) in [
            ("num_tcell", self.num_tcell),
            ("num_treg", self.num_treg),
            ("num_sites", self.num_sites),
            ("shape_dim", self.shape_dim),
        ] {
            if n == 0 {
                return Err(SimError::config(format!("{} must be positive", name)));
            }
        }

        for (name, p) in [("pval_cell", self.pval_cell), ("pval_treg", self.pval_treg)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, p
                )));
            }
        }

        for (name, w) in [("niche_width", self.niche_width), ("sigma", self.sigma)] {
            if !(w.is_finite() && w > 0.0) {
                return Err(SimError::config(format!("{} must be positive, got {}", name, w)));
            }
        }

        for (name, s) in [
            ("sigma_cp", self.sigma_cp),
            ("sigma_degree", self.sigma_degree),
            ("sigma_c", self.sigma_c),
        ] {
            if !(s.is_finite() && s >= 0.0) {
                return Err(SimError::config(format!(
                    "{} must be a non-negative std dev, got {}",
                    name, s
                )));
            }
        }

        if !(self.degree.is_finite() && self.degree >= 0.0) {
            return Err(SimError::config(format!(
                "degree must be non-negative, got {}",
                self.degree
            )));
        }
        if !self.c.is_finite() {
            return Err(SimError::config("c must be finite"));
        }

        Ok(())
    }
}

/// Site abundance weights `vx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteWeights {
    /// Every site gets the same weight
    Uniform(f64),
    /// One weight per site
    Explicit(Vec<f64>),
}

impl Default for SiteWeights {
    fn default() -> Self {
        SiteWeights::Uniform(1.0)
    }
}

impl SiteWeights {
    /// Materialise the weight vector for `num_sites` sites.
    pub fn to_vector(&self, num_sites: usize) -> Result<Vec<f64>> {
        match self {
            SiteWeights::Uniform(w) => Ok(vec![*w; num_sites]),
            SiteWeights::Explicit(v) => {
                if v.len() != num_sites {
                    return Err(SimError::dimension("site weights", num_sites, v.len()));
                }
                Ok(v.clone())
            }
        }
    }

    pub fn validate(&self, num_sites: usize) -> Result<()> {
        let weights = self.to_vector(num_sites)?;
        if let Some((j, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(SimError::config(format!(
                "site weight {} must be finite and non-negative, got {}",
                j, w
            )));
        }
        Ok(())
    }
}

/// Which right-hand side drives the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Replicator dynamics on precomputed overlaps
    #[default]
    #[serde(alias = "simple")]
    Reduced,
    /// Per-site dynamics on the raw affinity matrices
    Full,
}

/// Dynamics section: initial condition, time span, sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsParameters {
    pub model: ModelKind,
    /// Initial size of every T-cell clone
    pub initial_tcell: f64,
    /// Initial size of every Treg clone
    pub initial_treg: f64,
    pub t_start: f64,
    pub t_end: f64,
    /// Evenly spaced output samples over `[t_start, t_end]`, endpoints included
    pub n_samples: usize,
    /// Clones below this size count as extinct in the report
    pub survival_threshold: f64,
}

impl Default for DynamicsParameters {
    fn default() -> Self {
        Self {
            model: ModelKind::Reduced,
            initial_tcell: 0.1,
            initial_treg: 0.1,
            t_start: 0.0,
            t_end: 200.0,
            n_samples: 201,
            survival_threshold: 1e-6,
        }
    }
}

impl DynamicsParameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_tcell.is_finite() && self.initial_tcell >= 0.0)
            || !(self.initial_treg.is_finite() && self.initial_treg >= 0.0)
        {
            return Err(SimError::config("initial populations must be non-negative"));
        }
        if !(self.t_start.is_finite() && self.t_end.is_finite() && self.t_end > self.t_start) {
            return Err(SimError::config(format!(
                "time span [{}, {}] must be finite and increasing",
                self.t_start, self.t_end
            )));
        }
        if self.n_samples < 2 {
            return Err(SimError::config("n_samples must be at least 2"));
        }
        if !(self.survival_threshold >= 0.0) {
            return Err(SimError::config("survival_threshold must be non-negative"));
        }
        Ok(())
    }

    /// Output sample times, endpoints included.
    pub fn sample_times(&self) -> Vec<f64> {
        let span = self.t_end - self.t_start;
        let last = (self.n_samples - 1) as f64;
        (0..self.n_samples)
            .map(|k| {
                if k + 1 == self.n_samples {
                    self.t_end
                } else {
                    self.t_start + span * k as f64 / last
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = SimulationParameters::default();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let params = SimulationParameters::default();
        let json = serde_json::to_string_pretty(&params).unwrap();
        let parsed: SimulationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.affinity.num_sites, params.affinity.num_sites);
        assert_eq!(parsed.affinity.sampling, params.affinity.sampling);
        assert_eq!(parsed.site_weights, params.site_weights);
    }

    #[test]
    fn test_capitalised_key_aliases() {
        let json = r#"{
            "affinity": {"sampling": "1D", "Num_tcell": 3, "Num_treg": 4, "Num_sites": 7}
        }"#;
        let parsed: SimulationParameters = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.affinity.sampling, SamplingMode::OneDimensional);
        assert_eq!(parsed.affinity.num_tcell, 3);
        assert_eq!(parsed.affinity.num_treg, 4);
        assert_eq!(parsed.affinity.num_sites, 7);
    }

    #[test]
    fn test_unknown_sampling_rejected_by_parser() {
        let json = r#"{"affinity": {"sampling": "bogus"}}"#;
        assert!(serde_json::from_str::<SimulationParameters>(json).is_err());
    }

    #[test]
    fn test_probability_out_of_range() {
        let params = AffinityParameters {
            pval_cell: 1.5,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let params = AffinityParameters {
            num_sites: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_explicit_weights_length_checked() {
        let weights = SiteWeights::Explicit(vec![1.0, 2.0]);
        assert!(matches!(
            weights.to_vector(3),
            Err(SimError::DimensionMismatch { .. })
        ));
        assert_eq!(weights.to_vector(2).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_sample_times_cover_span() {
        let dynamics = DynamicsParameters {
            t_start: 1.0,
            t_end: 3.0,
            n_samples: 5,
            ..Default::default()
        };
        let times = dynamics.sample_times();
        assert_eq!(times.len(), 5);
        assert_eq!(times[0], 1.0);
        assert_eq!(times[4], 3.0);
        assert!((times[2] - 2.0).abs() < 1e-12);
    }
}
