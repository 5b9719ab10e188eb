//! Population dynamics of T-cells and Tregs.
//!
//! Two right-hand sides share the state layout `y = [Tcell | Treg]`:
//! - [`ReducedModel`]: replicator dynamics on precomputed overlaps
//! - [`FullModel`]: per-site occupancy dynamics on the raw affinities
//!
//! Both are integrated by the adaptive [`DormandPrince`] integrator.

pub mod full;
pub mod integrator;
pub mod simple;

pub use full::{ddt_full, FullModel};
pub use integrator::{DormandPrince, IntegratorConfig, Trajectory};
pub use simple::{ddt_simple, ReducedModel};

use crate::error::{Result, SimError};

/// A population right-hand side over `y = [Tcell | Treg]`.
///
/// Implementations are pure: `derivatives` may be called at any state the
/// integrator proposes, including rejected trial stages.
pub trait PopulationModel {
    fn num_tcell(&self) -> usize;

    fn num_treg(&self) -> usize;

    fn dimension(&self) -> usize {
        self.num_tcell() + self.num_treg()
    }

    /// Write dy/dt at `(t, y)` into `dydt`.
    fn derivatives(&self, t: f64, y: &[f64], dydt: &mut [f64]) -> Result<()>;

    /// Allocating convenience form of [`derivatives`](Self::derivatives).
    fn evaluate(&self, t: f64, y: &[f64]) -> Result<Vec<f64>> {
        let mut dydt = vec![0.0; self.dimension()];
        self.derivatives(t, y, &mut dydt)?;
        Ok(dydt)
    }
}

/// Check that `y` and `dydt` both match the model's state length.
pub(crate) fn check_state(expected: usize, y: &[f64], dydt: &[f64]) -> Result<()> {
    if y.len() != expected {
        return Err(SimError::dimension("population state", expected, y.len()));
    }
    if dydt.len() != expected {
        return Err(SimError::dimension("derivative buffer", expected, dydt.len()));
    }
    Ok(())
}

/// Split `y` into its T-cell and Treg parts.
pub fn split_state(y: &[f64], num_tcell: usize) -> (&[f64], &[f64]) {
    y.split_at(num_tcell)
}

/// Integrate `model` from a non-negative `y0` over `t_span`.
pub fn simulate<M: PopulationModel + ?Sized>(
    model: &M,
    y0: &[f64],
    t_span: (f64, f64),
    config: &IntegratorConfig,
    t_eval: Option<&[f64]>,
) -> Result<Trajectory> {
    if y0.len() != model.dimension() {
        return Err(SimError::dimension("initial state", model.dimension(), y0.len()));
    }
    if let Some((i, v)) = y0.iter().enumerate().find(|(_, v)| !(**v >= 0.0)) {
        return Err(SimError::config(format!(
            "initial population {} must be non-negative, got {}",
            i, v
        )));
    }

    let mut integrator = DormandPrince::new(config.clone());
    let trajectory = integrator.integrate(
        |t, y, dydt| model.derivatives(t, y, dydt),
        t_span,
        y0,
        t_eval,
    )?;

    log::info!(
        "Simulated {} T-cells + {} Tregs over [{}, {}]: {} samples, {} steps",
        model.num_tcell(),
        model.num_treg(),
        t_span.0,
        t_span.1,
        trajectory.len(),
        integrator.accepted_steps
    );
    Ok(trajectory)
}
