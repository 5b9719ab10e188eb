//! Treg Simulator - T-cell / regulatory T-cell competition model
//!
//! This library samples cell-to-site affinities, reduces them to pairwise
//! overlaps, solves for the equilibrium populations and integrates the
//! population dynamics that should approach it.

pub mod affinity;
pub mod config;
pub mod dynamics;
pub mod equilibrium;
pub mod error;
pub mod experiment;
pub mod export;
pub mod overlap;

pub use affinity::{generate, AffinityMatrices, AffinitySampler, SamplingMode};
pub use config::{AffinityParameters, DynamicsParameters, ModelKind, SimulationParameters, SiteWeights};
pub use dynamics::{
    ddt_full, ddt_simple, simulate, DormandPrince, FullModel, IntegratorConfig, PopulationModel,
    ReducedModel, Trajectory,
};
pub use equilibrium::{solve_equilibrium, Equilibrium, EquilibriumSolver, SolveStatus, SolverConfig};
pub use error::{IntegrationFailure, Result, SimError, SolverFailure};
pub use experiment::{Experiment, ExperimentReport};
pub use overlap::{compute_overlaps, Overlaps};
