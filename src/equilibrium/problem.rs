//! Conic form of the equilibrium QP and the `clarabel` call.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::{DMatrix, SymmetricEigen};

use super::{Equilibrium, SolveStatus, SolverConfig};
use crate::error::{Result, SimError, SolverFailure};
use crate::overlap::Overlaps;

/// QP data in `min ½xᵀPx  s.t.  Ax + s = b, s ≥ 0` form.
///
/// Rows `0..num_tcell` of `A` are the coverage constraints
/// `-(phi_cell_reg[i, :] / rvals[i]) · x ≤ -1`; the remaining `num_treg`
/// rows are `-x ≤ 0`.
#[derive(Debug)]
pub struct QpProblem {
    p: CscMatrix<f64>,
    a: CscMatrix<f64>,
    b: Vec<f64>,
    rvals: Vec<f64>,
    num_tcell: usize,
    num_treg: usize,
}

impl QpProblem {
    /// Validate overlaps and assemble the sparse problem data.
    pub fn build(overlaps: &Overlaps) -> Result<Self> {
        overlaps.check_dimensions()?;

        for (i, &r) in overlaps.rvals.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(SimError::degenerate("rvals", i, r));
            }
        }
        if let Some(bad) = overlaps
            .phi_reg_reg
            .iter()
            .chain(overlaps.phi_cell_reg.iter())
            .find(|x| !x.is_finite())
        {
            return Err(SimError::config(format!(
                "overlap matrices must be finite, found {}",
                bad
            )));
        }

        check_curvature(&overlaps.phi_reg_reg)?;

        let num_tcell = overlaps.num_tcell();
        let num_treg = overlaps.num_treg();
        let rvals: Vec<f64> = overlaps.rvals.iter().copied().collect();

        // P: upper triangle of phi_reg_reg, column-major.
        let mut p_colptr = Vec::with_capacity(num_treg + 1);
        let mut p_rowval = Vec::new();
        let mut p_nzval = Vec::new();
        p_colptr.push(0);
        for j in 0..num_treg {
            for i in 0..=j {
                let v = overlaps.phi_reg_reg[(i, j)];
                if v != 0.0 {
                    p_rowval.push(i);
                    p_nzval.push(v);
                }
            }
            p_colptr.push(p_rowval.len());
        }

        // A: [-(phi_cell_reg / rvals); -I]
        let mut a_colptr = Vec::with_capacity(num_treg + 1);
        let mut a_rowval = Vec::new();
        let mut a_nzval = Vec::new();
        a_colptr.push(0);
        for j in 0..num_treg {
            for (i, &r) in rvals.iter().enumerate() {
                let v = overlaps.phi_cell_reg[(i, j)];
                if v != 0.0 {
                    a_rowval.push(i);
                    a_nzval.push(-v / r);
                }
            }
            a_rowval.push(num_tcell + j);
            a_nzval.push(-1.0);
            a_colptr.push(a_rowval.len());
        }

        let mut b = vec![-1.0; num_tcell];
        b.extend(std::iter::repeat(0.0).take(num_treg));

        Ok(Self {
            p: CscMatrix::new(num_treg, num_treg, p_colptr, p_rowval, p_nzval),
            a: CscMatrix::new(
                num_tcell + num_treg,
                num_treg,
                a_colptr,
                a_rowval,
                a_nzval,
            ),
            b,
            rvals,
            num_tcell,
            num_treg,
        })
    }

    pub fn num_constraints(&self) -> usize {
        self.num_tcell + self.num_treg
    }

    /// Run the interior-point solver and interpret its result.
    pub fn solve(&self, config: &SolverConfig) -> Result<Equilibrium> {
        let settings = DefaultSettings::<f64> {
            max_iter: config.max_iter,
            tol_gap_abs: config.tol_gap_abs,
            tol_gap_rel: config.tol_gap_rel,
            tol_feas: config.tol_feas,
            verbose: config.verbose,
            ..DefaultSettings::default()
        };

        let q = vec![0.0; self.num_treg];
        let cones = [SupportedConeT::NonnegativeConeT(self.num_constraints())];

        let mut solver = DefaultSolver::new(&self.p, &q, &self.a, &self.b, &cones, settings);
        solver.solve();

        let solution = &solver.solution;
        let status = match solution.status {
            SolverStatus::Solved => SolveStatus::Converged,
            SolverStatus::AlmostSolved => SolveStatus::ReducedAccuracy,
            SolverStatus::MaxIterations | SolverStatus::MaxTime => SolveStatus::IterationLimit,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolverFailure::Infeasible.into())
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(SolverFailure::Unbounded.into())
            }
            _ => {
                return Err(SolverFailure::Numerical(format!("{:?}", solution.status)).into())
            }
        };

        let treg = solution.x.clone();
        let tcell: Vec<f64> = solution.z[..self.num_tcell]
            .iter()
            .zip(self.rvals.iter())
            .map(|(z, r)| z / r)
            .collect();

        Ok(Equilibrium {
            tcell,
            treg,
            status,
            iterations: solution.iterations,
            objective: solution.obj_val,
        })
    }
}

/// Relative tolerance for the symmetry and curvature checks on `phi_reg_reg`.
const CURVATURE_TOL: f64 = 1e-9;

/// `phi_reg_reg` must be symmetric (only its upper triangle reaches the
/// solver) and positive semidefinite.
fn check_curvature(phi: &DMatrix<f64>) -> Result<()> {
    let scale = phi.amax();
    let asymmetry = (phi - phi.transpose()).amax();
    if asymmetry > CURVATURE_TOL * scale {
        return Err(SimError::config(format!(
            "phi_reg_reg must be symmetric, max |phi - phiᵀ| = {:e}",
            asymmetry
        )));
    }

    let min_eigenvalue = SymmetricEigen::new(phi.clone())
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if min_eigenvalue < -CURVATURE_TOL * scale {
        log::warn!(
            "phi_reg_reg has eigenvalue {:e}; objective is unbounded below",
            min_eigenvalue
        );
        return Err(SolverFailure::Unbounded.into());
    }
    Ok(())
}
