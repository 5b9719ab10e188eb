//! Equilibrium solver tests
//!
//! Tests verify that:
//! - The optimum satisfies every coverage constraint and Treg ≥ 0
//! - The equilibrium is a fixed point of the reduced dynamics
//! - The single-cell scenario reproduces Treg* = Tcell* = 1
//! - Degenerate growth rates are rejected before solving
//! - Indefinite overlaps are reported as unbounded, asymmetric ones rejected

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use treg_simulator::affinity::{generate, SamplingMode};
use treg_simulator::config::AffinityParameters;
use treg_simulator::dynamics::ddt_simple;
use treg_simulator::equilibrium::{solve_equilibrium, EquilibriumSolver, SolveStatus, SolverConfig};
use treg_simulator::overlap::{compute_overlaps, Overlaps};
use treg_simulator::{SimError, SolverFailure};

fn random_overlaps(seed: u64, mode: SamplingMode) -> Overlaps {
    let params = AffinityParameters {
        sampling: mode,
        num_tcell: 8,
        num_treg: 6,
        num_sites: 20,
        sigma: 2.0,
        niche_width: 3.0,
        ..Default::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let m = generate(&params, &mut rng).unwrap();
    compute_overlaps(&m.pix, &m.palphax, &DVector::from_element(20, 1.0)).unwrap()
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, v| acc.max(v.abs()))
}

#[test]
fn test_constraints_hold_at_optimum() {
    for (seed, mode) in [
        (1, SamplingMode::Multidimensional),
        (2, SamplingMode::OneDimensional),
        (3, SamplingMode::Circulant),
    ] {
        let o = random_overlaps(seed, mode);
        let eq = solve_equilibrium(&o).unwrap();
        assert_eq!(eq.status, SolveStatus::Converged, "{}", mode);

        assert!(eq.treg.iter().all(|&x| x >= -1e-7), "{}: negative Treg*", mode);
        assert!(eq.tcell.iter().all(|&x| x >= -1e-7), "{}: negative Tcell*", mode);

        let coverage = &o.phi_cell_reg * DVector::from_vec(eq.treg.clone());
        for i in 0..o.num_tcell() {
            let ratio = coverage[i] / o.rvals[i];
            assert!(ratio >= 1.0 - 1e-5, "{}: T-cell {} coverage {}", mode, i, ratio);
        }
    }
}

#[test]
fn test_equilibrium_is_fixed_point_of_reduced_model() {
    for (seed, mode) in [
        (4, SamplingMode::Multidimensional),
        (5, SamplingMode::OneDimensional),
    ] {
        let o = random_overlaps(seed, mode);
        let eq = solve_equilibrium(&o).unwrap();
        let y = eq.state();

        let dydt = ddt_simple(0.0, &y, &o).unwrap();
        let scale = (1.0 + max_abs(y.iter().copied()))
            * (1.0 + max_abs(o.phi_reg_reg.iter().chain(o.phi_cell_reg.iter()).copied()));
        let residual = max_abs(dydt.iter().copied());
        assert!(residual < 1e-4 * scale, "{}: |dy/dt| = {}", mode, residual);
    }
}

#[test]
fn test_single_cell_single_site() {
    let o = Overlaps {
        phi_reg_reg: DMatrix::from_element(1, 1, 1.0),
        phi_cell_reg: DMatrix::from_element(1, 1, 1.0),
        rvals: DVector::from_element(1, 1.0),
    };
    let eq = solve_equilibrium(&o).unwrap();
    assert!((eq.treg[0] - 1.0).abs() < 1e-5);
    assert!((eq.tcell[0] - 1.0).abs() < 1e-5);
}

#[test]
fn test_zero_rvals_is_degenerate() {
    let o = Overlaps {
        phi_reg_reg: DMatrix::identity(2, 2),
        phi_cell_reg: DMatrix::from_element(1, 2, 1.0),
        rvals: DVector::from_element(1, 0.0),
    };
    assert!(matches!(
        solve_equilibrium(&o),
        Err(SimError::NumericalDegeneracy { quantity: "rvals", .. })
    ));
}

#[test]
fn test_iteration_cap_returns_best_iterate() {
    let o = random_overlaps(6, SamplingMode::Multidimensional);
    let solver = EquilibriumSolver::new(SolverConfig {
        max_iter: 1,
        ..Default::default()
    });
    let eq = solver.solve(&o).unwrap();
    assert_eq!(eq.status, SolveStatus::IterationLimit);
    assert_eq!(eq.treg.len(), 6);
    assert!(eq.require_converged().is_err());
}

#[test]
fn test_indefinite_overlap_is_unbounded() {
    let o = Overlaps {
        phi_reg_reg: DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.0, 1.0]),
        phi_cell_reg: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
        rvals: DVector::from_element(1, 1.0),
    };
    assert!(matches!(
        solve_equilibrium(&o),
        Err(SimError::Solver(SolverFailure::Unbounded))
    ));

    let scalar = Overlaps {
        phi_reg_reg: DMatrix::from_element(1, 1, -1.0),
        phi_cell_reg: DMatrix::from_element(1, 1, 1.0),
        rvals: DVector::from_element(1, 1.0),
    };
    assert!(matches!(
        solve_equilibrium(&scalar),
        Err(SimError::Solver(SolverFailure::Unbounded))
    ));
}

#[test]
fn test_asymmetric_overlap_rejected() {
    let o = Overlaps {
        phi_reg_reg: DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 5.0, 1.0]),
        phi_cell_reg: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
        rvals: DVector::from_element(1, 1.0),
    };
    assert!(matches!(solve_equilibrium(&o), Err(SimError::Config(_))));
}

#[test]
fn test_objective_matches_supplied_quadratic() {
    let o = random_overlaps(7, SamplingMode::Multidimensional);
    let eq = solve_equilibrium(&o).unwrap();
    let x = DVector::from_vec(eq.treg.clone());
    let objective = 0.5 * x.dot(&(&o.phi_reg_reg * &x));
    assert!(
        (objective - eq.objective).abs() < 1e-5 * (1.0 + objective.abs()),
        "reported {} vs evaluated {}",
        eq.objective,
        objective
    );
}
