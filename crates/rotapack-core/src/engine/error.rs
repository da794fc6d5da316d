use thiserror::Error;

use super::annealable::AnnealableEnergyError;
use super::config::ConfigError;
use super::node_manager::NodeManagerError;
use crate::core::energy::graph::GraphError;
use crate::core::io::problem::ProblemLoadError;
use crate::core::rotamers::sets::RotamerSetError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cannot start packing ({stage}): {reason}")]
    Setup { stage: &'static str, reason: String },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Rotamer set error: {source}")]
    RotamerSets {
        #[from]
        source: RotamerSetError,
    },

    #[error("Interaction graph error: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Failed to load packing problem: {source}")]
    Problem {
        #[from]
        source: ProblemLoadError,
    },

    #[error("Non-pairwise energy term failed: {source}")]
    Annealable {
        #[from]
        source: AnnealableEnergyError,
    },

    #[error("Result aggregation failed: {source}")]
    NodeManager {
        #[from]
        source: NodeManagerError,
    },

    #[error("Optimization phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
