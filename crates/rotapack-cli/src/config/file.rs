use crate::error::{CliError, Result};
use rotapack::engine::config as core_config;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum FileCoolingSchedule {
    Linear,
    Geometric,
    Custom,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum FilePositionSelection {
    Uniform,
    RoundRobin,
    ShuffledSweep,
}

impl From<FilePositionSelection> for core_config::PositionSelection {
    fn from(p: FilePositionSelection) -> Self {
        match p {
            FilePositionSelection::Uniform => core_config::PositionSelection::Uniform,
            FilePositionSelection::RoundRobin => core_config::PositionSelection::RoundRobin,
            FilePositionSelection::ShuffledSweep => {
                core_config::PositionSelection::ShuffledSweep
            }
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAnnealingConfig {
    pub trials: Option<usize>,
    pub trials_per_rotamer: Option<f64>,
    pub initial_temperature: Option<f64>,
    pub final_temperature: Option<f64>,
    pub cooling_schedule: Option<FileCoolingSchedule>,
    pub custom_temperatures: Option<Vec<f64>>,
    pub position_selection: Option<FilePositionSelection>,
    pub final_refinement_iterations: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunsConfig {
    pub num_runs: Option<usize>,
    pub num_partitions: Option<usize>,
    pub results_to_keep_per_part: Option<usize>,
    pub result_threshold_per_part: Option<usize>,
    pub return_results_depth_first: Option<bool>,
    pub max_results_per_token: Option<usize>,
    pub wave_size: Option<usize>,
}

/// The user-facing configuration file. Every value is optional; missing
/// values fall back to command-line flags or built-in defaults.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub annealing: Option<FileAnnealingConfig>,
    pub runs: Option<FileRunsConfig>,
    pub weights: Option<HashMap<String, f64>>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_str_with_path(&content, path)
    }

    fn from_str_with_path(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_file_reads_all_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [annealing]
            trials = 500
            initial-temperature = 8.0
            final-temperature = 0.2
            cooling-schedule = "linear"
            position-selection = "round-robin"
            seed = 9

            [runs]
            num-runs = 12
            num-partitions = 2
            result-threshold-per-part = 3

            [weights]
            net-charge = 0.5
            "#
        )
        .unwrap();

        let config = FileConfig::from_file(file.path()).unwrap();
        let annealing = config.annealing.unwrap();
        assert_eq!(annealing.trials, Some(500));
        assert_eq!(annealing.cooling_schedule, Some(FileCoolingSchedule::Linear));
        assert_eq!(
            annealing.position_selection,
            Some(FilePositionSelection::RoundRobin)
        );
        assert_eq!(annealing.seed, Some(9));
        let runs = config.runs.unwrap();
        assert_eq!(runs.num_runs, Some(12));
        assert_eq!(runs.result_threshold_per_part, Some(3));
        assert_eq!(config.weights.unwrap()["net-charge"], 0.5);
    }

    #[test]
    fn from_file_rejects_unknown_keys() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[annealing]\ncooling-rate = 0.9\n").unwrap();

        let result = FileConfig::from_file(file.path());
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn from_file_reports_missing_file_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
