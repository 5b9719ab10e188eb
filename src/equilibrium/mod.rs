//! Equilibrium populations from a convex quadratic program.
//!
//! minimize    ½ Tregᵀ · phi_reg_reg · Treg
//! subject to  (phi_cell_reg / rvals) · Treg ≥ 1     (one row per T-cell)
//!             Treg ≥ 0
//!
//! Treg* is the primal optimum. T-cell abundances are the multipliers of the
//! coverage constraints divided by `rvals`. The QP is handed to the
//! `clarabel` interior-point solver in the conic form
//! `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ≥ 0`, whose dual `z` on the
//! non-negative cone is exactly the multiplier vector above.

mod problem;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError, SolverFailure};
use crate::overlap::Overlaps;

pub use problem::QpProblem;

/// Interior-point solver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration cap
    pub max_iter: u32,
    /// Absolute duality-gap tolerance
    pub tol_gap_abs: f64,
    /// Relative duality-gap tolerance
    pub tol_gap_rel: f64,
    /// Primal/dual feasibility tolerance
    pub tol_feas: f64,
    /// Print solver progress to stdout
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol_gap_abs: 1e-7,
            tol_gap_rel: 1e-7,
            tol_feas: 1e-7,
            verbose: false,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(SimError::config("solver max_iter must be positive"));
        }
        for (name, tol) in [
            ("tol_gap_abs", self.tol_gap_abs),
            ("tol_gap_rel", self.tol_gap_rel),
            ("tol_feas", self.tol_feas),
        ] {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(SimError::config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

/// How the solver terminated when it produced an iterate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Full-accuracy optimum
    Converged,
    /// Optimum within the solver's reduced tolerances
    ReducedAccuracy,
    /// Iteration or time cap reached; the best iterate is returned
    IterationLimit,
}

/// Equilibrium population pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equilibrium {
    /// T-cell abundances (duals of the coverage constraints / rvals)
    pub tcell: Vec<f64>,
    /// Treg abundances (primal optimum)
    pub treg: Vec<f64>,
    pub status: SolveStatus,
    pub iterations: u32,
    /// ½ Treg*ᵀ phi_reg_reg Treg*
    pub objective: f64,
}

impl Equilibrium {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    /// Reject anything short of a full-accuracy optimum.
    pub fn require_converged(self) -> Result<Self> {
        if self.is_converged() {
            Ok(self)
        } else {
            Err(SimError::Solver(SolverFailure::NotConverged {
                status: self.status,
                iterations: self.iterations,
            }))
        }
    }

    /// Concatenated `[Tcell | Treg]` state vector.
    pub fn state(&self) -> Vec<f64> {
        self.tcell.iter().chain(self.treg.iter()).copied().collect()
    }
}

/// Equilibrium solver
#[derive(Debug, Clone, Default)]
pub struct EquilibriumSolver {
    pub config: SolverConfig,
}

impl EquilibriumSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solve for the equilibrium of the given overlaps.
    pub fn solve(&self, overlaps: &Overlaps) -> Result<Equilibrium> {
        let problem = QpProblem::build(overlaps)?;
        let equilibrium = problem.solve(&self.config)?;

        match equilibrium.status {
            SolveStatus::Converged => log::debug!(
                "Equilibrium converged in {} iterations, objective {:.6e}",
                equilibrium.iterations,
                equilibrium.objective
            ),
            status => log::warn!(
                "Equilibrium solve ended with {:?} after {} iterations",
                status,
                equilibrium.iterations
            ),
        }
        Ok(equilibrium)
    }
}

/// Convenience wrapper with default solver settings.
pub fn solve_equilibrium(overlaps: &Overlaps) -> Result<Equilibrium> {
    EquilibriumSolver::default().solve(overlaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn scalar_overlaps(phi_rr: f64, phi_cr: f64, r: f64) -> Overlaps {
        Overlaps {
            phi_reg_reg: DMatrix::from_element(1, 1, phi_rr),
            phi_cell_reg: DMatrix::from_element(1, 1, phi_cr),
            rvals: DVector::from_element(1, r),
        }
    }

    #[test]
    fn test_tight_single_constraint() {
        let eq = solve_equilibrium(&scalar_overlaps(1.0, 1.0, 1.0)).unwrap();
        assert!(eq.is_converged());
        assert!((eq.treg[0] - 1.0).abs() < 1e-5, "treg {}", eq.treg[0]);
        assert!((eq.tcell[0] - 1.0).abs() < 1e-5, "tcell {}", eq.tcell[0]);
        assert!((eq.objective - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_scaled_single_constraint() {
        // Treg ≥ r / phi_cr = 2; stationarity: phi_rr·Treg = z·phi_cr / r
        let eq = solve_equilibrium(&scalar_overlaps(3.0, 2.0, 4.0)).unwrap();
        assert!((eq.treg[0] - 2.0).abs() < 1e-5);
        // z = phi_rr·Treg·r / phi_cr = 12, Tcell = z / r = 3
        assert!((eq.tcell[0] - 3.0).abs() < 1e-4, "tcell {}", eq.tcell[0]);
    }

    #[test]
    fn test_require_converged_rejects_limit() {
        let eq = Equilibrium {
            tcell: vec![1.0],
            treg: vec![1.0],
            status: SolveStatus::IterationLimit,
            iterations: 100,
            objective: 0.5,
        };
        assert!(matches!(
            eq.require_converged(),
            Err(SimError::Solver(SolverFailure::NotConverged { .. }))
        ));
    }

    #[test]
    fn test_state_concatenates() {
        let eq = Equilibrium {
            tcell: vec![1.0, 2.0],
            treg: vec![3.0],
            status: SolveStatus::Converged,
            iterations: 5,
            objective: 0.0,
        };
        assert_eq!(eq.state(), vec![1.0, 2.0, 3.0]);
    }
}
