use crate::core::models::assignment::Assignment;

/// Counters collected over one annealing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnealingStatistics {
    pub trials: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Trials drawn at a position with a single candidate.
    pub skipped: usize,
    pub failed_evaluations: usize,
    pub new_best: usize,
    pub refinement_changes: usize,
}

/// Observer payload emitted after every annealing trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSnapshot {
    pub trial: usize,
    pub temperature: f64,
    pub current_energy: f64,
    pub best_energy: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct AnnealingOutcome {
    pub best_assignment: Assignment,
    pub best_energy: f64,
    pub initial_energy: f64,
    pub final_current_energy: f64,
    pub seed: u64,
    pub statistics: AnnealingStatistics,
}

/// Current and best assignments of a run.
///
/// A new best is recorded only on strict improvement, so on ties the earlier
/// assignment is kept.
#[derive(Debug, Clone)]
pub(crate) struct SearchState {
    pub current: Assignment,
    pub current_energy: f64,
    pub best: Assignment,
    pub best_energy: f64,
}

impl SearchState {
    pub fn new(initial: Assignment, energy: f64) -> Self {
        Self {
            best: initial.clone(),
            current: initial,
            current_energy: energy,
            best_energy: energy,
        }
    }

    /// Applies an accepted substitution. Returns `true` if it produced a new best.
    pub fn apply(&mut self, position: usize, rotamer: usize, delta: f64) -> bool {
        self.current.substitute(position, rotamer);
        self.current_energy += delta;
        if self.current_energy < self.best_energy {
            self.best.clone_from(&self.current);
            self.best_energy = self.current_energy;
            true
        } else {
            false
        }
    }
}
