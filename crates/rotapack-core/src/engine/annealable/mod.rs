//! Non-pairwise ("annealable") energy terms.
//!
//! Some scoring terms cannot be decomposed into one-body and pairwise tables,
//! for example a penalty on the net charge of the whole design. Such terms keep
//! their own incremental state for the duration of one annealing run and are
//! driven by the annealer through four callbacks:
//!
//! 1. [`AnnealableEnergy::set_up_for_packing`] once, before the first trial;
//! 2. [`AnnealableEnergy::evaluate_substitution`] for every proposed move;
//! 3. [`AnnealableEnergy::commit_considered_substitution`] when the move is accepted;
//! 4. [`AnnealableEnergy::clean_up_after_packing`] once, with the best assignment.
//!
//! Terms are created by name through the [`registry::AnnealableEnergyRegistry`].

pub mod buried_unsat;
pub mod net_charge;
pub mod registry;

use crate::core::models::assignment::Assignment;
use crate::core::rotamers::sets::RotamerSets;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnnealableEnergyError {
    #[error("Unknown energy term type '{0}'")]
    UnknownTerm(String),

    #[error("Invalid parameters for term '{term}': {reason}")]
    Parameters { term: String, reason: String },

    #[error("Term '{term}' failed to set up: {reason}")]
    SetUp { term: String, reason: String },

    #[error("Term '{term}' failed to evaluate position {position} -> rotamer {rotamer}: {reason}")]
    Evaluation {
        term: String,
        position: usize,
        rotamer: usize,
        reason: String,
    },

    #[error("Term '{term}' has no pending substitution to commit")]
    NoPendingSubstitution { term: String },
}

/// Per-term weights applied at set-up. Terms without an entry use their own
/// configured weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermWeights {
    weights: HashMap<String, f64>,
}

impl TermWeights {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, term: impl Into<String>, weight: f64) {
        self.weights.insert(term.into(), weight);
    }

    pub fn get(&self, term: &str) -> Option<f64> {
        self.weights.get(term).copied()
    }

    /// Weight for `term`, falling back to `configured` and then to [`Self::DEFAULT_WEIGHT`].
    pub fn resolve(&self, term: &str, configured: Option<f64>) -> f64 {
        self.get(term)
            .or(configured)
            .unwrap_or(Self::DEFAULT_WEIGHT)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl From<HashMap<String, f64>> for TermWeights {
    fn from(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }
}

impl FromIterator<(String, f64)> for TermWeights {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

pub trait AnnealableEnergy: Send + fmt::Debug {
    /// Registry name of the term; also the key looked up in [`TermWeights`].
    fn name(&self) -> &str;

    fn set_up_for_packing(
        &mut self,
        assignment: &Assignment,
        rotamer_sets: &RotamerSets,
        weights: &TermWeights,
    ) -> Result<(), AnnealableEnergyError>;

    /// Weighted change of this term if `position` switched to `candidate`.
    ///
    /// The result is remembered as the pending substitution until the next
    /// evaluation or commit.
    fn evaluate_substitution(
        &mut self,
        position: usize,
        candidate: usize,
        assignment: &Assignment,
    ) -> Result<f64, AnnealableEnergyError>;

    fn commit_considered_substitution(&mut self) -> Result<(), AnnealableEnergyError>;

    fn clean_up_after_packing(&mut self, _assignment: &Assignment) {}

    /// Weighted contribution for the last committed assignment.
    fn current_energy(&self) -> f64;
}

pub(crate) fn parse_params<P: DeserializeOwned>(
    term: &str,
    params: &toml::Table,
) -> Result<P, AnnealableEnergyError> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| AnnealableEnergyError::Parameters {
            term: term.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn check_assignment(
    term: &str,
    assignment: &Assignment,
    rotamer_sets: &RotamerSets,
) -> Result<(), AnnealableEnergyError> {
    if assignment.len() != rotamer_sets.num_positions() {
        return Err(AnnealableEnergyError::SetUp {
            term: term.to_string(),
            reason: format!(
                "assignment covers {} positions but the rotamer sets have {}",
                assignment.len(),
                rotamer_sets.num_positions()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_table_then_configured_then_default() {
        let mut weights = TermWeights::new();
        weights.set("net-charge", 2.0);
        assert_eq!(weights.resolve("net-charge", Some(5.0)), 2.0);
        assert_eq!(weights.resolve("buried-unsat", Some(5.0)), 5.0);
        assert_eq!(weights.resolve("buried-unsat", None), 1.0);
    }

    #[test]
    fn term_weights_collect_from_pairs() {
        let weights: TermWeights = vec![("a".to_string(), 0.5)].into_iter().collect();
        assert_eq!(weights.get("a"), Some(0.5));
        assert!(!weights.is_empty());
    }
}
