use crate::cli::InspectArgs;
use crate::error::Result;
use rotapack::core::io::problem::PackingProblem;
use rotapack::engine::annealable::registry::AnnealableEnergyRegistry;
use rotapack::engine::error::EngineError;
use std::fmt::Write;
use tracing::{info, warn};

pub fn run(args: InspectArgs) -> Result<()> {
    info!(path = ?args.input, "Loading packing problem...");
    let problem = PackingProblem::read_from_path(&args.input).map_err(EngineError::from)?;
    let registry = AnnealableEnergyRegistry::with_defaults();
    print!("{}", render_summary(&problem, &registry)?);
    Ok(())
}

/// Formats a human-readable overview of a problem: positions, edges and terms.
pub fn render_summary(
    problem: &PackingProblem,
    registry: &AnnealableEnergyRegistry,
) -> Result<String> {
    let sets = &problem.rotamer_sets;
    let graph = &problem.graph;
    let native = sets.native_assignment().map_err(EngineError::from)?;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} positions, {} rotamers, {} edges",
        sets.num_positions(),
        sets.total_rotamers(),
        graph.num_edges()
    );
    let _ = writeln!(out, "Native graph energy: {:.4}", graph.total_energy(&native));

    for (pos, position) in sets.iter() {
        let native_name = position
            .rotamers()
            .get(position.native_index())
            .map_or("?", |r| r.name.as_str());
        let _ = writeln!(
            out,
            "  [{}] {:<10} {:>4} rotamers  native {:<12} {} neighbors",
            pos,
            sets.label(pos).unwrap_or("-"),
            position.rotamers().len(),
            native_name,
            graph.neighbors(pos).count()
        );
    }

    if problem.terms.is_empty() {
        let _ = writeln!(out, "No non-pairwise terms.");
    }
    for term in &problem.terms {
        let known = registry.contains(&term.kind);
        if !known {
            warn!(term = %term.kind, "Problem declares an unregistered term.");
        }
        let _ = writeln!(
            out,
            "  term {}{}",
            term.kind,
            if known { "" } else { " (unknown)" }
        );
    }
    Ok(out)
}
