use super::defaults::DefaultsConfig;
use super::file::{FileAnnealingConfig, FileConfig, FileCoolingSchedule, FileRunsConfig};
use super::models::AppConfig;
use crate::cli::PackArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use rotapack::engine::annealable::TermWeights;
use rotapack::engine::config as core_config;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use tracing::debug;

/// Resolves the effective pack configuration.
///
/// Precedence, highest first: dedicated command-line flags, `--set`
/// overrides, the configuration file, built-in defaults.
pub fn build_config(args: &PackArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let file_config = apply_set_values(file_config, &args.set_values)?;

    let annealing = merge_annealing(
        args,
        file_config.annealing.unwrap_or_default(),
        &defaults,
    )?;
    let runs = merge_runs(args, file_config.runs.unwrap_or_default(), &defaults);
    let weights: TermWeights = file_config.weights.unwrap_or_default().into();

    let core_config = core_config::PackConfigBuilder::new()
        .annealing(annealing)
        .runs(runs)
        .weights(weights)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Resolved pack configuration: {:?}", core_config);

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        core_config,
    })
}

fn merge_annealing(
    args: &PackArgs,
    file_val: FileAnnealingConfig,
    defaults: &DefaultsConfig,
) -> Result<core_config::AnnealerConfig> {
    let trial_budget = match (args.trials, file_val.trials, file_val.trials_per_rotamer) {
        (Some(n), _, _) => core_config::TrialBudget::Fixed(n),
        (None, Some(_), Some(_)) => {
            return Err(CliError::Config(
                "`trials` and `trials-per-rotamer` are mutually exclusive".to_string(),
            ));
        }
        (None, Some(n), None) => core_config::TrialBudget::Fixed(n),
        (None, None, Some(f)) => core_config::TrialBudget::PerRotamer(f),
        (None, None, None) => core_config::TrialBudget::PerRotamer(defaults.trials_per_rotamer),
    };

    let custom_levels = file_val.custom_temperatures;
    let (cooling_schedule, level_bounds) = match file_val.cooling_schedule {
        Some(FileCoolingSchedule::Custom) => {
            let levels = custom_levels.ok_or_else(|| {
                CliError::Config(
                    "`cooling-schedule = \"custom\"` requires `custom-temperatures`".to_string(),
                )
            })?;
            let bounds = levels.first().copied().zip(levels.last().copied());
            (core_config::CoolingSchedule::Custom(levels), bounds)
        }
        Some(FileCoolingSchedule::Linear) => (core_config::CoolingSchedule::Linear, None),
        Some(FileCoolingSchedule::Geometric) | None => {
            (core_config::CoolingSchedule::Geometric, None)
        }
    };

    let initial_temperature = file_val
        .initial_temperature
        .or(level_bounds.map(|(first, _)| first))
        .unwrap_or(defaults.initial_temperature);
    let final_temperature = file_val
        .final_temperature
        .or(level_bounds.map(|(_, last)| last))
        .unwrap_or(defaults.final_temperature);

    let final_refinement_iterations = if args.no_refinement {
        0
    } else {
        file_val
            .final_refinement_iterations
            .unwrap_or(defaults.final_refinement_iterations)
    };

    core_config::AnnealerConfigBuilder::new()
        .trial_budget(trial_budget)
        .initial_temperature(initial_temperature)
        .final_temperature(final_temperature)
        .cooling_schedule(cooling_schedule)
        .position_selection(
            file_val
                .position_selection
                .map(Into::into)
                .unwrap_or_default(),
        )
        .final_refinement_iterations(final_refinement_iterations)
        .seed(args.seed.or(file_val.seed))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn merge_runs(
    args: &PackArgs,
    file_val: FileRunsConfig,
    defaults: &DefaultsConfig,
) -> core_config::RunsConfig {
    core_config::RunsConfig {
        num_runs: args.runs.or(file_val.num_runs).unwrap_or(defaults.num_runs),
        num_partitions: args
            .partitions
            .or(file_val.num_partitions)
            .unwrap_or(defaults.num_partitions),
        results_to_keep_per_part: args
            .keep
            .or(file_val.results_to_keep_per_part)
            .unwrap_or(defaults.results_to_keep_per_part),
        result_threshold_per_part: args.threshold.or(file_val.result_threshold_per_part),
        return_results_depth_first: file_val
            .return_results_depth_first
            .unwrap_or(defaults.return_results_depth_first),
        max_results_per_token: file_val
            .max_results_per_token
            .unwrap_or(defaults.max_results_per_token),
        wave_size: file_val.wave_size,
    }
}

fn parse_scalar<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_keyword<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    toml::Value::String(value.to_string())
        .try_into()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_list(key: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(|item| parse_scalar(key, item.trim()))
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        if let Some(term) = key.strip_prefix("weights.") {
            config
                .weights
                .get_or_insert_with(Default::default)
                .insert(term.to_string(), parse_scalar(key, value)?);
            continue;
        }

        match key.split_once('.') {
            Some(("annealing", field)) => {
                let annealing = config.annealing.get_or_insert_with(Default::default);
                match field {
                    "trials" => annealing.trials = Some(parse_scalar(key, value)?),
                    "trials-per-rotamer" => {
                        annealing.trials_per_rotamer = Some(parse_scalar(key, value)?)
                    }
                    "initial-temperature" => {
                        annealing.initial_temperature = Some(parse_scalar(key, value)?)
                    }
                    "final-temperature" => {
                        annealing.final_temperature = Some(parse_scalar(key, value)?)
                    }
                    "cooling-schedule" => {
                        annealing.cooling_schedule = Some(parse_keyword(key, value)?)
                    }
                    "custom-temperatures" => {
                        annealing.custom_temperatures = Some(parse_list(key, value)?)
                    }
                    "position-selection" => {
                        annealing.position_selection = Some(parse_keyword(key, value)?)
                    }
                    "final-refinement-iterations" => {
                        annealing.final_refinement_iterations = Some(parse_scalar(key, value)?)
                    }
                    "seed" => annealing.seed = Some(parse_scalar(key, value)?),
                    _ => return Err(unsupported_key(key)),
                }
            }
            Some(("runs", field)) => {
                let runs = config.runs.get_or_insert_with(Default::default);
                match field {
                    "num-runs" => runs.num_runs = Some(parse_scalar(key, value)?),
                    "num-partitions" => runs.num_partitions = Some(parse_scalar(key, value)?),
                    "results-to-keep-per-part" => {
                        runs.results_to_keep_per_part = Some(parse_scalar(key, value)?)
                    }
                    "result-threshold-per-part" => {
                        runs.result_threshold_per_part = Some(parse_scalar(key, value)?)
                    }
                    "return-results-depth-first" => {
                        runs.return_results_depth_first = Some(parse_scalar(key, value)?)
                    }
                    "max-results-per-token" => {
                        runs.max_results_per_token = Some(parse_scalar(key, value)?)
                    }
                    "wave-size" => runs.wave_size = Some(parse_scalar(key, value)?),
                    _ => return Err(unsupported_key(key)),
                }
            }
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn pack_args(extra: &[&str]) -> PackArgs {
        let mut argv = vec!["rotapack", "pack", "-i", "problem.toml", "-o", "report.toml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Pack(args) => args,
            _ => panic!("Expected 'pack' subcommand"),
        }
    }

    fn write_config(dir: &Path, content: &str) -> String {
        let path = dir.join("config.toml");
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn build_config_uses_defaults_without_file() {
        let app = build_config(&pack_args(&[])).unwrap();
        let defaults = DefaultsConfig::default();
        let cfg = app.core_config;

        assert_eq!(
            cfg.annealing.trial_budget,
            core_config::TrialBudget::PerRotamer(defaults.trials_per_rotamer)
        );
        assert_eq!(cfg.annealing.cooling_schedule, core_config::CoolingSchedule::Geometric);
        assert_eq!(cfg.annealing.initial_temperature, defaults.initial_temperature);
        assert_eq!(
            cfg.annealing.final_refinement_iterations,
            defaults.final_refinement_iterations
        );
        assert_eq!(cfg.annealing.seed, None);
        assert_eq!(cfg.runs.num_runs, defaults.num_runs);
        assert_eq!(cfg.runs.result_threshold_per_part, None);
        assert!(cfg.weights.is_empty());
        assert_eq!(app.output_path, Path::new("report.toml"));
    }

    #[test]
    fn build_config_reads_file_and_merges() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [annealing]
            trials-per-rotamer = 4.0
            cooling-schedule = "custom"
            custom-temperatures = [6.0, 3.0, 1.0]
            position-selection = "shuffled-sweep"
            seed = 11

            [runs]
            num-runs = 6
            num-partitions = 2
            return-results-depth-first = false
            max-results-per-token = 1

            [weights]
            buried-unsat = 0.25
            "#,
        );
        let app = build_config(&pack_args(&["-c", &path])).unwrap();
        let cfg = app.core_config;

        assert_eq!(cfg.annealing.trial_budget, core_config::TrialBudget::PerRotamer(4.0));
        assert_eq!(
            cfg.annealing.cooling_schedule,
            core_config::CoolingSchedule::Custom(vec![6.0, 3.0, 1.0])
        );
        assert_eq!(cfg.annealing.initial_temperature, 6.0);
        assert_eq!(cfg.annealing.final_temperature, 1.0);
        assert_eq!(
            cfg.annealing.position_selection,
            core_config::PositionSelection::ShuffledSweep
        );
        assert_eq!(cfg.annealing.seed, Some(11));
        assert_eq!(cfg.runs.num_runs, 6);
        assert_eq!(cfg.runs.num_partitions, 2);
        assert!(!cfg.runs.return_results_depth_first);
        assert_eq!(cfg.runs.max_results_per_token, 1);
        assert_eq!(cfg.weights.get("buried-unsat"), Some(0.25));
    }

    #[test]
    fn cli_flags_override_set_values_and_file() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[annealing]\ntrials = 100\nseed = 1\nfinal-refinement-iterations = 5\n\n[runs]\nnum-runs = 3\n",
        );
        let app = build_config(&pack_args(&[
            "-c",
            &path,
            "-S",
            "runs.num-runs=7",
            "-S",
            "annealing.seed=2",
            "--seed",
            "42",
            "--trials",
            "250",
            "--no-refinement",
        ]))
        .unwrap();
        let cfg = app.core_config;

        assert_eq!(cfg.runs.num_runs, 7);
        assert_eq!(cfg.annealing.seed, Some(42));
        assert_eq!(cfg.annealing.trial_budget, core_config::TrialBudget::Fixed(250));
        assert_eq!(cfg.annealing.final_refinement_iterations, 0);
    }

    #[test]
    fn set_values_cover_keywords_lists_and_weights() {
        let app = build_config(&pack_args(&[
            "-S",
            "annealing.cooling-schedule=custom",
            "-S",
            "annealing.custom-temperatures=4.0, 2.0",
            "-S",
            "annealing.position-selection=round-robin",
            "-S",
            "weights.net-charge=3.5",
            "-S",
            "runs.wave-size=4",
        ]))
        .unwrap();
        let cfg = app.core_config;

        assert_eq!(
            cfg.annealing.cooling_schedule,
            core_config::CoolingSchedule::Custom(vec![4.0, 2.0])
        );
        assert_eq!(
            cfg.annealing.position_selection,
            core_config::PositionSelection::RoundRobin
        );
        assert_eq!(cfg.weights.get("net-charge"), Some(3.5));
        assert_eq!(cfg.runs.wave_size, Some(4));
    }

    #[test]
    fn set_values_reject_unknown_keys_and_bad_values() {
        let unknown = build_config(&pack_args(&["-S", "annealing.cooling-rate=0.9"]));
        assert!(matches!(unknown, Err(CliError::Config(msg)) if msg.contains("cooling-rate")));

        let bad = build_config(&pack_args(&["-S", "runs.num-runs=many"]));
        assert!(matches!(bad, Err(CliError::Config(_))));

        let malformed = build_config(&pack_args(&["-S", "runs.num-runs"]));
        assert!(matches!(malformed, Err(CliError::Config(_))));
    }

    #[test]
    fn conflicting_trial_budgets_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[annealing]\ntrials = 10\ntrials-per-rotamer = 2.0\n",
        );
        let result = build_config(&pack_args(&["-c", &path]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("mutually exclusive")));
    }

    #[test]
    fn custom_schedule_without_levels_is_rejected() {
        let result = build_config(&pack_args(&["-S", "annealing.cooling-schedule=custom"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("custom-temperatures")));
    }

    #[test]
    fn invalid_resolved_values_surface_as_config_errors() {
        let result = build_config(&pack_args(&["--runs", "0"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("num_runs")));
    }
}
