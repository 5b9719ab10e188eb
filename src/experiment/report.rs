//! Run summary for display and export.

use serde::{Deserialize, Serialize};

use crate::affinity::SamplingMode;
use crate::config::ModelKind;
use crate::dynamics::Trajectory;
use crate::equilibrium::Equilibrium;

/// Everything one experiment produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    // === Setup ===
    pub sampling: SamplingMode,
    pub model: ModelKind,
    pub seed: u64,
    pub num_tcell: usize,
    pub num_treg: usize,
    pub num_sites: usize,

    // === Equilibrium ===
    pub equilibrium: Equilibrium,

    // === Dynamics ===
    /// States at the requested sample times
    pub trajectory: Trajectory,
    pub final_tcell: Vec<f64>,
    pub final_treg: Vec<f64>,

    // === Comparison ===
    /// Clones of each kind above the survival threshold at the end of the run
    pub surviving_tcell: usize,
    pub surviving_treg: usize,
    /// Tregs above the survival threshold in Treg*
    pub equilibrium_treg_support: usize,
    /// max |Treg(t_end) − Treg*|
    pub treg_deviation: f64,
}

impl ExperimentReport {
    /// One-line description for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} / {:?}: {}/{} T-cells and {}/{} Tregs survive, {} Tregs in Treg*, max deviation {:.3e} ({:?})",
            self.sampling,
            self.model,
            self.surviving_tcell,
            self.num_tcell,
            self.surviving_treg,
            self.num_treg,
            self.equilibrium_treg_support,
            self.treg_deviation,
            self.equilibrium.status
        )
    }
}

/// Count entries strictly above `threshold`.
pub fn count_above(values: &[f64], threshold: f64) -> usize {
    values.iter().filter(|&&v| v > threshold).count()
}

/// Largest absolute componentwise difference; lengths must agree.
pub fn max_abs_deviation(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
