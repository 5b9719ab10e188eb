//! Configuration module for loading simulation parameters.
//!
//! Parameter files are JSON. Capitalised dimension keys
//! (`Num_tcell`, `Num_sites`, ...) are accepted as aliases.

mod parameters;

pub use parameters::{
    AffinityParameters, DynamicsParameters, ModelKind, SimulationParameters, SiteWeights,
};
