use super::annealable::{AnnealableEnergy, AnnealableEnergyError, TermWeights};
use super::config::{AnnealerConfig, PositionSelection};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::schedule::{ConfiguredSchedule, TemperatureSchedule, accept_move};
use super::state::{AnnealingOutcome, AnnealingStatistics, SearchState, TrialSnapshot};
use crate::core::energy::graph::InteractionGraph;
use crate::core::rotamers::sets::RotamerSets;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, thread_rng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnealerState {
    Initializing,
    Annealing,
    Finalizing,
    Done,
}

enum PositionSelector {
    Uniform(usize),
    RoundRobin { next: usize, count: usize },
    ShuffledSweep { order: Vec<usize>, cursor: usize },
}

impl PositionSelector {
    fn new(policy: PositionSelection, count: usize) -> Self {
        match policy {
            PositionSelection::Uniform => Self::Uniform(count),
            PositionSelection::RoundRobin => Self::RoundRobin { next: 0, count },
            PositionSelection::ShuffledSweep => Self::ShuffledSweep {
                order: (0..count).collect(),
                cursor: count,
            },
        }
    }

    fn next(&mut self, rng: &mut ChaCha8Rng) -> usize {
        match self {
            Self::Uniform(count) => rng.gen_range(0..*count),
            Self::RoundRobin { next, count } => {
                let pos = *next;
                *next = (*next + 1) % *count;
                pos
            }
            Self::ShuffledSweep { order, cursor } => {
                if *cursor >= order.len() {
                    order.shuffle(rng);
                    *cursor = 0;
                }
                let pos = order[*cursor];
                *cursor += 1;
                pos
            }
        }
    }
}

/// Simulated-annealing optimizer over one packing problem.
///
/// Construction performs all set-up: the rotamer sets are finalized if still
/// open, the interaction graph is checked against them, and every
/// non-pairwise term is set up on the native assignment. [`Annealer::run`]
/// consumes the optimizer, so a finished run cannot be resumed.
#[derive(Debug)]
pub struct Annealer {
    config: AnnealerConfig,
    rotamer_sets: RotamerSets,
    graph: InteractionGraph,
    terms: Vec<Box<dyn AnnealableEnergy>>,
    state: AnnealerState,
    search: SearchState,
    initial_energy: f64,
}

impl Annealer {
    pub fn new(
        config: AnnealerConfig,
        mut rotamer_sets: RotamerSets,
        graph: InteractionGraph,
        mut terms: Vec<Box<dyn AnnealableEnergy>>,
        weights: &TermWeights,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if !rotamer_sets.is_finalized() {
            rotamer_sets.finalize()?;
        }
        if rotamer_sets.num_positions() == 0 {
            return Err(EngineError::Setup {
                stage: "initialization",
                reason: "the rotamer sets contain no positions".to_string(),
            });
        }
        graph.validate_against(&rotamer_sets)?;

        let initial = rotamer_sets.native_assignment()?;
        for term in terms.iter_mut() {
            term.set_up_for_packing(&initial, &rotamer_sets, weights)
                .map_err(|e| EngineError::Setup {
                    stage: "non-pairwise term set-up",
                    reason: e.to_string(),
                })?;
        }

        let term_energy: f64 = terms.iter().map(|t| t.current_energy()).sum();
        let initial_energy = graph.total_energy(&initial) + term_energy;
        debug!(
            positions = rotamer_sets.num_positions(),
            rotamers = rotamer_sets.total_rotamers(),
            terms = terms.len(),
            initial_energy,
            "Annealer initialized on the native assignment."
        );

        Ok(Self {
            config,
            rotamer_sets,
            graph,
            terms,
            state: AnnealerState::Annealing,
            search: SearchState::new(initial, initial_energy),
            initial_energy,
        })
    }

    pub fn state(&self) -> AnnealerState {
        self.state
    }

    pub fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    pub fn rotamer_sets(&self) -> &RotamerSets {
        &self.rotamer_sets
    }

    pub fn run(self, reporter: &ProgressReporter) -> Result<AnnealingOutcome, EngineError> {
        self.run_observed(reporter, |_| {})
    }

    #[instrument(skip_all, name = "annealing_run", fields(seed))]
    pub fn run_observed<F>(
        mut self,
        reporter: &ProgressReporter,
        mut observer: F,
    ) -> Result<AnnealingOutcome, EngineError>
    where
        F: FnMut(&TrialSnapshot),
    {
        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let seed = thread_rng().r#gen::<u64>();
                info!(seed, "No seed configured; drew a random seed for this run.");
                seed
            }
        };
        tracing::Span::current().record("seed", seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut stats = AnnealingStatistics::default();

        self.anneal(&mut rng, &mut stats, reporter, &mut observer)?;
        self.refine(&mut rng, &mut stats, reporter)?;

        self.state = AnnealerState::Finalizing;
        for term in self.terms.iter_mut() {
            term.clean_up_after_packing(&self.search.best);
        }
        self.state = AnnealerState::Done;

        debug!(
            best_energy = self.search.best_energy,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "Annealing run finished."
        );

        Ok(AnnealingOutcome {
            best_assignment: self.search.best,
            best_energy: self.search.best_energy,
            initial_energy: self.initial_energy,
            final_current_energy: self.search.current_energy,
            seed,
            statistics: stats,
        })
    }

    fn anneal<F>(
        &mut self,
        rng: &mut ChaCha8Rng,
        stats: &mut AnnealingStatistics,
        reporter: &ProgressReporter,
        observer: &mut F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&TrialSnapshot),
    {
        let total_trials = self
            .config
            .trial_budget
            .resolve(self.rotamer_sets.total_rotamers());
        let schedule = ConfiguredSchedule::from_config(&self.config);
        let mut selector = PositionSelector::new(
            self.config.position_selection,
            self.rotamer_sets.num_positions(),
        );

        reporter.report(Progress::PhaseStart { name: "Annealing" });
        reporter.report(Progress::TaskStart {
            total_steps: total_trials as u64,
        });
        debug!(total_trials, "Starting simulated annealing.");

        for trial in 0..total_trials {
            let temperature = schedule.temperature(trial, total_trials);
            let accepted = self.trial(rng, &mut selector, temperature, stats)?;
            stats.trials += 1;
            observer(&TrialSnapshot {
                trial,
                temperature,
                current_energy: self.search.current_energy,
                best_energy: self.search.best_energy,
                accepted,
            });
            reporter.report(Progress::TaskIncrement);
        }

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);
        Ok(())
    }

    fn trial(
        &mut self,
        rng: &mut ChaCha8Rng,
        selector: &mut PositionSelector,
        temperature: f64,
        stats: &mut AnnealingStatistics,
    ) -> Result<bool, EngineError> {
        let position = selector.next(rng);
        let count = self.rotamer_sets.num_rotamers(position);
        if count < 2 {
            stats.skipped += 1;
            return Ok(false);
        }

        let current = self.search.current.rotamer_at(position);
        let mut candidate = rng.gen_range(0..count - 1);
        if candidate >= current {
            candidate += 1;
        }

        let delta = match self.evaluate(position, candidate) {
            Ok(delta) => delta,
            Err(e) => {
                warn!(position, candidate, error = %e, "Evaluation failed; rejecting trial.");
                stats.failed_evaluations += 1;
                stats.rejected += 1;
                return Ok(false);
            }
        };

        if accept_move(delta, temperature, rng.r#gen::<f64>()) {
            if self.commit(position, candidate, delta, "Annealing")? {
                stats.new_best += 1;
                trace!(best_energy = self.search.best_energy, "New best assignment.");
            }
            stats.accepted += 1;
            Ok(true)
        } else {
            stats.rejected += 1;
            Ok(false)
        }
    }

    /// Greedy sweeps starting from the best assignment; each position takes its
    /// lowest strictly downhill rotamer.
    fn refine(
        &mut self,
        rng: &mut ChaCha8Rng,
        stats: &mut AnnealingStatistics,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let iterations = self.config.final_refinement_iterations;
        if iterations == 0 {
            return Ok(());
        }

        reporter.report(Progress::PhaseStart {
            name: "Final Refinement",
        });
        debug!("Starting final refinement (greedy sweeps).");
        self.restore_best()?;

        let mut order: Vec<usize> = (0..self.rotamer_sets.num_positions()).collect();
        for i in 0..iterations {
            reporter.report(Progress::StatusUpdate {
                text: format!("Pass {}/{}", i + 1, iterations),
            });
            let mut changed_in_cycle = false;
            order.shuffle(rng);

            for &position in &order {
                let current = self.search.current.rotamer_at(position);
                let mut best: Option<(usize, f64)> = None;
                for candidate in 0..self.rotamer_sets.num_rotamers(position) {
                    if candidate == current {
                        continue;
                    }
                    match self.evaluate(position, candidate) {
                        Ok(delta) if delta < best.map_or(0.0, |(_, d)| d) => {
                            best = Some((candidate, delta));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(position, candidate, error = %e, "Evaluation failed during refinement.");
                            stats.failed_evaluations += 1;
                        }
                    }
                }

                if let Some((candidate, _)) = best {
                    // Re-evaluate so every term's pending substitution is the chosen one.
                    let delta = self.evaluate(position, candidate).map_err(|e| {
                        EngineError::PhaseFailed {
                            phase: "Final Refinement",
                            reason: e.to_string(),
                        }
                    })?;
                    if self.commit(position, candidate, delta, "Final Refinement")? {
                        stats.new_best += 1;
                    }
                    stats.refinement_changes += 1;
                    changed_in_cycle = true;
                }
            }

            if !changed_in_cycle {
                debug!(iteration = i + 1, "Refinement converged.");
                break;
            }
        }

        reporter.report(Progress::PhaseFinish);
        Ok(())
    }

    /// Walks the current state back to the best assignment one position at a
    /// time, so every term sees the moves as ordinary evaluate/commit pairs.
    fn restore_best(&mut self) -> Result<(), EngineError> {
        if self.search.current == self.search.best {
            return Ok(());
        }
        let differing: Vec<(usize, usize)> = self
            .search
            .best
            .iter()
            .filter(|&(pos, rot)| self.search.current.rotamer_at(pos) != rot)
            .collect();
        trace!(positions = differing.len(), "Restoring best assignment.");

        for (position, rotamer) in differing {
            let delta = self
                .evaluate(position, rotamer)
                .map_err(|e| EngineError::PhaseFailed {
                    phase: "Final Refinement",
                    reason: e.to_string(),
                })?;
            self.commit_terms("Final Refinement")?;
            self.search.current.substitute(position, rotamer);
            self.search.current_energy += delta;
        }
        // Same assignment as best; drop the accumulated rounding.
        self.search.current_energy = self.search.best_energy;
        Ok(())
    }

    fn evaluate(&mut self, position: usize, candidate: usize) -> Result<f64, AnnealableEnergyError> {
        let mut delta =
            self.graph
                .delta_energy_for_substitution(position, candidate, &self.search.current);
        for term in self.terms.iter_mut() {
            delta += term.evaluate_substitution(position, candidate, &self.search.current)?;
        }
        Ok(delta)
    }

    fn commit(
        &mut self,
        position: usize,
        candidate: usize,
        delta: f64,
        phase: &'static str,
    ) -> Result<bool, EngineError> {
        self.commit_terms(phase)?;
        Ok(self.search.apply(position, candidate, delta))
    }

    fn commit_terms(&mut self, phase: &'static str) -> Result<(), EngineError> {
        for term in self.terms.iter_mut() {
            term.commit_considered_substitution()
                .map_err(|e| EngineError::PhaseFailed {
                    phase,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}
