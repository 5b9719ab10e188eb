//! Error types for the simulator core.
//!
//! Every failure mode of the pipeline has its own variant so callers can
//! branch on configuration problems, shape mismatches, numerical degeneracy,
//! solver status and integration failures without inspecting matrices for
//! NaN sentinels.

use thiserror::Error;

use crate::dynamics::Trajectory;
use crate::equilibrium::SolveStatus;

/// Unified error type for all simulator operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Unrecognised sampling mode, missing or out-of-range option
    #[error("Configuration error: {0}")]
    Config(String),

    /// Matrix or vector shapes that do not agree
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// A value used as a divisor is zero, negative or non-finite
    #[error("Numerical degeneracy: {quantity}[{index}] = {value}")]
    NumericalDegeneracy {
        quantity: &'static str,
        index: usize,
        value: f64,
    },

    /// The equilibrium QP did not produce a usable optimum
    #[error("Equilibrium solver failed: {0}")]
    Solver(#[from] SolverFailure),

    /// The adaptive integrator gave up; carries everything computed so far
    #[error("Integration failed at t = {t}: {reason}")]
    Integration {
        t: f64,
        reason: IntegrationFailure,
        trajectory: Box<Trajectory>,
    },
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SimError::Config(message.into())
    }

    /// Creates a dimension-mismatch error.
    pub fn dimension(context: impl Into<String>, expected: usize, found: usize) -> Self {
        SimError::DimensionMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Creates a numerical-degeneracy error.
    pub fn degenerate(quantity: &'static str, index: usize, value: f64) -> Self {
        SimError::NumericalDegeneracy {
            quantity,
            index,
            value,
        }
    }

    /// Partial trajectory attached to an integration failure, if any.
    pub fn partial_trajectory(&self) -> Option<&Trajectory> {
        match self {
            SimError::Integration { trajectory, .. } => Some(trajectory),
            _ => None,
        }
    }
}

/// Ways the equilibrium QP can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverFailure {
    /// No non-negative Treg vector covers every T-cell
    #[error("problem is primal infeasible")]
    Infeasible,

    /// Objective unbounded below (non-PSD overlap matrix)
    #[error("problem is unbounded (dual infeasible)")]
    Unbounded,

    /// Interior-point iterations broke down
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Returned by `Equilibrium::require_converged` for non-converged iterates
    #[error("not converged after {iterations} iterations (status {status:?})")]
    NotConverged { status: SolveStatus, iterations: u32 },
}

/// Why the adaptive integrator stopped early.
#[derive(Error, Debug)]
pub enum IntegrationFailure {
    #[error("step budget of {max_steps} steps exhausted")]
    StepBudgetExhausted { max_steps: usize },

    #[error("step size {step:e} fell below the minimum")]
    StepSizeUnderflow { step: f64 },

    #[error("state became non-finite")]
    NonFiniteState,

    #[error("derivative evaluation failed: {0}")]
    Model(Box<SimError>),
}

pub type Result<T> = std::result::Result<T, SimError>;
