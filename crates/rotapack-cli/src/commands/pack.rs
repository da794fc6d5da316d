use crate::cli::PackArgs;
use crate::config;
use crate::error::Result;
use crate::report::PackingReport;
use crate::utils::progress::CliProgressHandler;
use rotapack::core::io::problem::PackingProblem;
use rotapack::engine::annealable::registry::AnnealableEnergyRegistry;
use rotapack::engine::error::EngineError;
use rotapack::engine::progress::ProgressReporter;
use rotapack::workflows;
use tracing::{debug, info};

pub fn run(args: PackArgs, show_progress: bool) -> Result<()> {
    info!("Building configuration for 'pack' command...");
    let app_config = config::build_config(&args)?;

    info!(path = ?app_config.input_path, "Loading packing problem...");
    let problem =
        PackingProblem::read_from_path(&app_config.input_path).map_err(EngineError::from)?;
    debug!(
        positions = problem.rotamer_sets.num_positions(),
        rotamers = problem.rotamer_sets.total_rotamers(),
        edges = problem.graph.num_edges(),
        terms = problem.terms.len(),
        "Problem loaded."
    );

    let registry = AnnealableEnergyRegistry::with_defaults();
    let handler = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    let result = workflows::pack::run(&problem, &app_config.core_config, &registry, &reporter)?;

    let report = PackingReport::new(&result, &problem.rotamer_sets)?;
    report.write_to_path(&app_config.output_path)?;
    info!(path = ?app_config.output_path, "Report written.");

    println!(
        "Initial energy: {:.4} | base seed: {}",
        result.initial_energy, result.base_seed
    );
    for entry in &report.results {
        println!(
            "  #{:<3} job {:<5} partition {:<3} score {:>12.4}",
            entry.rank, entry.job_id, entry.partition, entry.score
        );
    }
    if result.stopped_early {
        println!(
            "Stopped early after {} of {} runs.",
            result.runs_submitted, app_config.core_config.runs.num_runs
        );
    }
    if result.runs_failed > 0 {
        println!("{} run(s) failed; see the log for details.", result.runs_failed);
    }
    Ok(())
}
