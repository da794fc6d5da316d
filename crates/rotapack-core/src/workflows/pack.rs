use crate::core::io::problem::PackingProblem;
use crate::core::models::assignment::Assignment;
use crate::engine::annealable::registry::AnnealableEnergyRegistry;
use crate::engine::annealer::Annealer;
use crate::engine::config::PackConfig;
use crate::engine::error::EngineError;
use crate::engine::node_manager::{NodeManager, ResultRecord};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::AnnealingOutcome;
use rand::{Rng, thread_rng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Every run reports exactly one result: its best assignment.
const RESULT_ID: usize = 1;

#[derive(Debug, Clone)]
pub struct PackedResult {
    /// 1-based position in the node manager's traversal order.
    pub rank: usize,
    pub record: ResultRecord,
    pub assignment: Assignment,
}

#[derive(Debug, Clone)]
pub struct PackingResult {
    pub initial_energy: f64,
    pub base_seed: u64,
    pub results: Vec<PackedResult>,
    pub discarded: Vec<(usize, usize)>,
    pub stopped_early: bool,
    pub runs_submitted: usize,
    pub runs_completed: usize,
    pub runs_failed: usize,
}

/// Runs independent annealing trajectories and aggregates their best assignments.
///
/// Runs are submitted in waves. Within a wave they execute in parallel; their
/// results are then registered in job-id order on the calling thread, so the
/// aggregate is reproducible for a fixed seed regardless of scheduling.
#[instrument(skip_all, name = "packing_workflow")]
pub fn run(
    problem: &PackingProblem,
    config: &PackConfig,
    registry: &AnnealableEnergyRegistry,
    reporter: &ProgressReporter,
) -> Result<PackingResult, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    config.annealing.validate()?;
    config.runs.validate()?;

    let terms = registry.create_all(&problem.terms)?;
    let native = Annealer::new(
        config.annealing.clone(),
        problem.rotamer_sets.clone(),
        problem.graph.clone(),
        terms,
        &config.weights,
    )?;
    let initial_energy = native.initial_energy();
    drop(native);

    let base_seed = match config.annealing.seed {
        Some(seed) => seed,
        None => {
            let seed = thread_rng().r#gen::<u64>();
            info!(seed, "No seed configured; drew a random base seed.");
            seed
        }
    };
    info!(
        initial_energy,
        base_seed,
        runs = config.runs.num_runs,
        "Packing problem prepared."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Annealing runs ===
    let runs = &config.runs;
    let mut manager = NodeManager::new(
        0,
        runs.num_runs,
        runs.num_partitions,
        vec![runs.results_to_keep_per_part; runs.num_partitions],
        runs.result_threshold_per_part
            .map(|t| vec![t; runs.num_partitions])
            .unwrap_or_default(),
        runs.return_results_depth_first,
    )?;
    manager.set_max_num_results_with_same_token_per_partition(runs.max_results_per_token);

    let wave_size = runs.wave_size.unwrap_or_else(default_wave_size);
    reporter.report(Progress::PhaseStart { name: "Packing" });
    reporter.report(Progress::TaskStart {
        total_steps: runs.num_runs as u64,
    });

    let mut assignments: HashMap<(usize, usize), Assignment> = HashMap::new();
    let mut runs_failed = 0;
    let mut best_score = f64::INFINITY;
    while !manager.done_submitting() {
        let wave: Vec<usize> = std::iter::from_fn(|| manager.get_next_local_jobid())
            .take(wave_size)
            .collect();
        if wave.is_empty() {
            break;
        }

        #[cfg(feature = "parallel")]
        let iter = wave.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = wave.iter();

        let outcomes: Vec<(usize, Result<AnnealingOutcome, EngineError>)> = iter
            .map(|&job| (job, run_single(problem, config, registry, base_seed, job)))
            .collect();

        for (job, outcome) in outcomes {
            let global_job_id = manager.job_offset() + job;
            match outcome {
                Ok(outcome) => {
                    let partition = (job - 1) % runs.num_partitions;
                    manager.register_result(
                        global_job_id,
                        RESULT_ID,
                        outcome.best_energy,
                        partition,
                        outcome.best_assignment.fingerprint(),
                    )?;
                    manager.note_job_completed(global_job_id, 1);
                    best_score = best_score.min(outcome.best_energy);
                    assignments.insert((global_job_id, RESULT_ID), outcome.best_assignment);
                }
                Err(e) => {
                    warn!(job = global_job_id, error = %e, "Packing run failed.");
                    runs_failed += 1;
                    manager.note_job_completed(global_job_id, 0);
                }
            }
            reporter.report(Progress::TaskIncrement);
        }
        if best_score.is_finite() {
            reporter.report(Progress::StatusUpdate {
                text: format!("best {best_score:.3}"),
            });
        }
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    if runs_failed == manager.num_jobs_completed() {
        return Err(EngineError::PhaseFailed {
            phase: "Packing",
            reason: format!("all {runs_failed} runs failed"),
        });
    }

    // === Phase 2: Finalization ===
    let mut discarded = Vec::new();
    manager.append_job_results_that_should_be_discarded(&mut discarded);
    for id in &discarded {
        assignments.remove(id);
    }

    let results = manager
        .results_to_keep()
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let assignment = assignments.remove(&record.id()).ok_or_else(|| {
                EngineError::Internal(format!(
                    "kept result {:?} has no stored assignment",
                    record.id()
                ))
            })?;
            Ok(PackedResult {
                rank: i + 1,
                record,
                assignment,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    info!(
        kept = results.len(),
        discarded = discarded.len(),
        failed = runs_failed,
        stopped_early = manager.stopped_early(),
        "Packing finished."
    );

    Ok(PackingResult {
        initial_energy,
        base_seed,
        results,
        discarded,
        stopped_early: manager.stopped_early(),
        runs_submitted: manager.num_jobs_submitted(),
        runs_completed: manager.num_jobs_completed(),
        runs_failed,
    })
}

fn run_single(
    problem: &PackingProblem,
    config: &PackConfig,
    registry: &AnnealableEnergyRegistry,
    base_seed: u64,
    job: usize,
) -> Result<AnnealingOutcome, EngineError> {
    let mut annealing = config.annealing.clone();
    annealing.seed = Some(base_seed.wrapping_add(job as u64));
    let terms = registry.create_all(&problem.terms)?;
    Annealer::new(
        annealing,
        problem.rotamer_sets.clone(),
        problem.graph.clone(),
        terms,
        &config.weights,
    )?
    .run(&ProgressReporter::new())
}

fn default_wave_size() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads().max(1)
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::annealable::net_charge::{ChargeTail, NetChargePenalty};
    use crate::engine::annealable::{AnnealableEnergy, AnnealableEnergyError};
    use crate::engine::config::{
        AnnealerConfigBuilder, CoolingSchedule, PackConfigBuilder, RunsConfig, TrialBudget,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROBLEM: &str = r#"
[[positions]]
label = "A:1"
rotamers = [
    { name = "a0", energy = 0.0, native = true },
    { name = "a1", energy = 5.0 },
    { name = "a2", energy = -1.0, charge = 1.0 },
]

[[positions]]
label = "A:2"
rotamers = [
    { name = "b0", energy = 0.0 },
    { name = "b1", energy = 3.0 },
    { name = "b2", energy = -0.5, charge = 1.0 },
]

[[positions]]
label = "A:3"
rotamers = [
    { name = "c0", energy = 0.0 },
    { name = "c1", energy = 1.0 },
]

[[edges]]
positions = [0, 1]
energies = [[0.0, 1.0, 0.2], [1.0, 0.0, 0.3], [0.2, 0.3, -0.7]]

[[edges]]
positions = [1, 2]
energies = [[0.0, 1.0], [1.0, 0.0], [0.4, -0.2]]

[[terms]]
type = "net-charge"
min-charge = 0.0
max-charge = 1.0
tail = "quadratic"
"#;

    fn problem() -> PackingProblem {
        PackingProblem::read_from(&mut PROBLEM.as_bytes()).unwrap()
    }

    fn config(runs: RunsConfig) -> PackConfig {
        let annealing = AnnealerConfigBuilder::new()
            .trial_budget(TrialBudget::PerRotamer(20.0))
            .initial_temperature(3.0)
            .final_temperature(0.05)
            .cooling_schedule(CoolingSchedule::Geometric)
            .final_refinement_iterations(3)
            .seed(Some(17))
            .build()
            .unwrap();
        PackConfigBuilder::new()
            .annealing(annealing)
            .runs(runs)
            .build()
            .unwrap()
    }

    fn runs(num_runs: usize) -> RunsConfig {
        RunsConfig {
            num_runs,
            ..RunsConfig::default()
        }
    }

    #[test]
    fn run_is_deterministic_for_fixed_seed() {
        let cfg = config(RunsConfig {
            results_to_keep_per_part: 3,
            num_partitions: 2,
            ..runs(8)
        });
        let registry = AnnealableEnergyRegistry::with_defaults();
        let a = run(&problem(), &cfg, &registry, &ProgressReporter::new()).unwrap();
        let b = run(&problem(), &cfg, &registry, &ProgressReporter::new()).unwrap();

        let summary = |r: &PackingResult| {
            r.results
                .iter()
                .map(|p| (p.record.id(), p.record.score, p.assignment.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&a), summary(&b));
        assert_eq!(a.discarded, b.discarded);
        assert_eq!(a.base_seed, 17);
    }

    #[test]
    fn run_keeps_top_k_and_discards_the_rest() {
        let cfg = config(RunsConfig {
            results_to_keep_per_part: 3,
            ..runs(10)
        });
        let result = run(
            &problem(),
            &cfg,
            &AnnealableEnergyRegistry::with_defaults(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.results.len(), 3);
        assert_eq!(result.discarded.len(), 7);
        assert_eq!(result.runs_completed, 10);
        assert!(!result.stopped_early);
        let scores: Vec<f64> = result.results.iter().map(|r| r.record.score).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert!(scores[0] <= result.initial_energy);
        assert_eq!(
            result.results.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn run_stops_submitting_after_threshold() {
        let cfg = config(RunsConfig {
            result_threshold_per_part: Some(2),
            wave_size: Some(1),
            ..runs(20)
        });
        let result = run(
            &problem(),
            &cfg,
            &AnnealableEnergyRegistry::with_defaults(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(result.stopped_early);
        assert_eq!(result.runs_submitted, 2);
        assert_eq!(result.runs_completed, 2);
    }

    #[test]
    fn run_token_limit_keeps_distinct_assignments() {
        let cfg = config(RunsConfig {
            results_to_keep_per_part: 5,
            max_results_per_token: 1,
            ..runs(12)
        });
        let result = run(
            &problem(),
            &cfg,
            &AnnealableEnergyRegistry::with_defaults(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let mut tokens: Vec<u64> = result.results.iter().map(|r| r.record.token).collect();
        let before = tokens.len();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), before);
    }

    #[test]
    fn run_fails_setup_for_unknown_term() {
        let mut p = problem();
        p.terms[0].kind = "solvation".to_string();
        let result = run(
            &p,
            &config(runs(2)),
            &AnnealableEnergyRegistry::with_defaults(),
            &ProgressReporter::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Annealable {
                source: AnnealableEnergyError::UnknownTerm(_)
            })
        ));
    }

    fn flaky_registry(fail_when: fn(usize) -> bool) -> AnnealableEnergyRegistry {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = AnnealableEnergyRegistry::new();
        registry.register("net-charge", move |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if fail_when(call) {
                return Err(AnnealableEnergyError::Parameters {
                    term: "net-charge".to_string(),
                    reason: "flaky".to_string(),
                });
            }
            Ok(Box::new(NetChargePenalty::new(0.0, 1.0, ChargeTail::Linear))
                as Box<dyn AnnealableEnergy>)
        });
        registry
    }

    #[test]
    fn failed_runs_are_counted_without_aborting() {
        // Call 0 builds the native-energy annealer during preparation; odd calls fail.
        let registry = flaky_registry(|call| call % 2 == 1);
        let result = run(
            &problem(),
            &config(RunsConfig {
                results_to_keep_per_part: 4,
                ..runs(4)
            }),
            &registry,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(result.runs_failed, 2);
        assert_eq!(result.runs_completed, 4);
        assert_eq!(result.results.len(), 2);
    }

    #[test]
    fn run_fails_when_every_run_fails() {
        let registry = flaky_registry(|call| call > 0);
        let result = run(
            &problem(),
            &config(runs(3)),
            &registry,
            &ProgressReporter::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::PhaseFailed { phase: "Packing", .. })
        ));
    }

    #[test]
    fn run_reports_one_increment_per_run() {
        let increments = AtomicUsize::new(0);
        let statuses = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::TaskIncrement => {
                increments.fetch_add(1, Ordering::SeqCst);
            }
            Progress::StatusUpdate { text } if text.starts_with("best ") => {
                statuses.lock().unwrap().push(text);
            }
            _ => {}
        }));
        run(
            &problem(),
            &config(runs(5)),
            &AnnealableEnergyRegistry::with_defaults(),
            &reporter,
        )
        .unwrap();
        drop(reporter);
        assert_eq!(increments.load(Ordering::SeqCst), 5);
        assert!(!statuses.lock().unwrap().is_empty());
    }
}
