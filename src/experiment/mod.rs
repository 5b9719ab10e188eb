//! End-to-end experiment: sample, solve, integrate, compare.
//!
//! ## Pipeline
//! 1. Seed a `ChaCha8Rng` from `params.seed`
//! 2. Draw `pix` / `palphax` with the configured sampling mode
//! 3. Build site weights and overlaps
//! 4. Solve the equilibrium QP
//! 5. Integrate the chosen model from uniform initial populations
//! 6. Compare the final state against the equilibrium
//!
//! ## Usage
//! ```ignore
//! let report = Experiment::new(SimulationParameters::default()).run()?;
//! println!("{}", report.summary());
//! ```

mod report;

use nalgebra::DVector;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::affinity;
use crate::config::{ModelKind, SimulationParameters};
use crate::dynamics::{self, FullModel, PopulationModel, ReducedModel, Trajectory};
use crate::equilibrium::EquilibriumSolver;
use crate::error::{Result, SimError};
use crate::overlap::compute_overlaps;

pub use report::{count_above, max_abs_deviation, ExperimentReport};

/// A configured run of the whole pipeline
#[derive(Debug, Clone)]
pub struct Experiment {
    pub params: SimulationParameters,
}

impl Experiment {
    pub fn new(params: SimulationParameters) -> Self {
        Self { params }
    }

    /// Run with an RNG seeded from `params.seed`.
    pub fn run(&self) -> Result<ExperimentReport> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        self.run_with_rng(&mut rng)
    }

    /// Run drawing all randomness from `rng`.
    pub fn run_with_rng(&self, rng: &mut dyn RngCore) -> Result<ExperimentReport> {
        let params = &self.params;
        params.validate()?;

        let matrices = affinity::generate(&params.affinity, rng)?;
        let vx = DVector::from_vec(params.site_weights.to_vector(params.affinity.num_sites)?);
        let overlaps = compute_overlaps(&matrices.pix, &matrices.palphax, &vx)?;

        let solver = EquilibriumSolver::new(params.solver.clone());
        let equilibrium = solver.solve(&overlaps)?;

        let num_tcell = matrices.num_tcell();
        let num_treg = matrices.num_treg();
        let mut y0 = vec![params.dynamics.initial_tcell; num_tcell];
        y0.extend(std::iter::repeat(params.dynamics.initial_treg).take(num_treg));

        let t_span = (params.dynamics.t_start, params.dynamics.t_end);
        let t_eval = params.dynamics.sample_times();
        let trajectory = match params.dynamics.model {
            ModelKind::Reduced => {
                let model = ReducedModel::new(&overlaps)?;
                self.integrate(&model, &y0, t_span, &t_eval)?
            }
            ModelKind::Full => {
                let model = FullModel::new(&matrices.pix, &matrices.palphax, &vx)?;
                self.integrate(&model, &y0, t_span, &t_eval)?
            }
        };

        let final_state = trajectory
            .final_state()
            .ok_or_else(|| SimError::config("integration produced no samples"))?;
        let (final_tcell, final_treg) = dynamics::split_state(final_state, num_tcell);
        let (final_tcell, final_treg) = (final_tcell.to_vec(), final_treg.to_vec());
        let threshold = params.dynamics.survival_threshold;

        let report = ExperimentReport {
            sampling: params.affinity.sampling,
            model: params.dynamics.model,
            seed: params.seed,
            num_tcell,
            num_treg,
            num_sites: matrices.num_sites(),
            surviving_tcell: count_above(&final_tcell, threshold),
            surviving_treg: count_above(&final_treg, threshold),
            equilibrium_treg_support: count_above(&equilibrium.treg, threshold),
            treg_deviation: max_abs_deviation(&final_treg, &equilibrium.treg),
            final_tcell,
            final_treg,
            equilibrium,
            trajectory,
        };

        log::info!("Experiment finished: {}", report.summary());
        Ok(report)
    }

    fn integrate<M: PopulationModel>(
        &self,
        model: &M,
        y0: &[f64],
        t_span: (f64, f64),
        t_eval: &[f64],
    ) -> Result<Trajectory> {
        dynamics::simulate(model, y0, t_span, &self.params.integrator, Some(t_eval))
    }
}
