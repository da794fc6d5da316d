use super::annealable::TermWeights;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        parameter,
        reason: reason.into(),
    }
}

/// Total number of substitution attempts in one annealing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialBudget {
    Fixed(usize),
    /// `factor × total rotamers` trials, at least one.
    PerRotamer(f64),
}

impl TrialBudget {
    pub fn resolve(&self, total_rotamers: usize) -> usize {
        match *self {
            TrialBudget::Fixed(n) => n,
            TrialBudget::PerRotamer(factor) => {
                ((factor * total_rotamers as f64).ceil() as usize).max(1)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoolingSchedule {
    Linear,
    Geometric,
    /// Piecewise-constant levels spread evenly over the trial budget.
    Custom(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionSelection {
    #[default]
    Uniform,
    RoundRobin,
    /// Every position once per cycle, in a new random order each cycle.
    ShuffledSweep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnealerConfig {
    pub trial_budget: TrialBudget,
    pub initial_temperature: f64,
    pub final_temperature: f64,
    pub cooling_schedule: CoolingSchedule,
    pub position_selection: PositionSelection,
    pub final_refinement_iterations: usize,
    pub seed: Option<u64>,
}

#[derive(Default)]
pub struct AnnealerConfigBuilder {
    trial_budget: Option<TrialBudget>,
    initial_temperature: Option<f64>,
    final_temperature: Option<f64>,
    cooling_schedule: Option<CoolingSchedule>,
    position_selection: Option<PositionSelection>,
    final_refinement_iterations: Option<usize>,
    seed: Option<u64>,
}

impl AnnealerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trial_budget(mut self, budget: TrialBudget) -> Self {
        self.trial_budget = Some(budget);
        self
    }
    pub fn initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = Some(temperature);
        self
    }
    pub fn final_temperature(mut self, temperature: f64) -> Self {
        self.final_temperature = Some(temperature);
        self
    }
    pub fn cooling_schedule(mut self, schedule: CoolingSchedule) -> Self {
        self.cooling_schedule = Some(schedule);
        self
    }
    pub fn position_selection(mut self, selection: PositionSelection) -> Self {
        self.position_selection = Some(selection);
        self
    }
    pub fn final_refinement_iterations(mut self, iterations: usize) -> Self {
        self.final_refinement_iterations = Some(iterations);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<AnnealerConfig, ConfigError> {
        let config = AnnealerConfig {
            trial_budget: self
                .trial_budget
                .ok_or(ConfigError::MissingParameter("trial_budget"))?,
            initial_temperature: self
                .initial_temperature
                .ok_or(ConfigError::MissingParameter("initial_temperature"))?,
            final_temperature: self
                .final_temperature
                .ok_or(ConfigError::MissingParameter("final_temperature"))?,
            cooling_schedule: self
                .cooling_schedule
                .ok_or(ConfigError::MissingParameter("cooling_schedule"))?,
            position_selection: self.position_selection.unwrap_or_default(),
            final_refinement_iterations: self.final_refinement_iterations.unwrap_or(0),
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}

impl AnnealerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.trial_budget {
            TrialBudget::Fixed(0) => return Err(invalid("trial_budget", "must be positive")),
            TrialBudget::PerRotamer(f) if !(f.is_finite() && f > 0.0) => {
                return Err(invalid("trial_budget", "factor must be a positive number"));
            }
            _ => {}
        }

        let t0 = self.initial_temperature;
        let t1 = self.final_temperature;
        if !(t0.is_finite() && t0 > 0.0) {
            return Err(invalid("initial_temperature", "must be a positive number"));
        }
        if !(t1.is_finite() && t1 > 0.0) {
            return Err(invalid("final_temperature", "must be a positive number"));
        }
        if t1 > t0 {
            return Err(invalid(
                "final_temperature",
                format!("{t1} exceeds the initial temperature {t0}"),
            ));
        }

        if let CoolingSchedule::Custom(levels) = &self.cooling_schedule {
            if levels.is_empty() {
                return Err(invalid("cooling_schedule", "custom schedule has no levels"));
            }
            if levels.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
                return Err(invalid(
                    "cooling_schedule",
                    "custom temperatures must be positive numbers",
                ));
            }
            if levels.windows(2).any(|w| w[1] > w[0]) {
                return Err(invalid(
                    "cooling_schedule",
                    "custom temperatures must be non-increasing",
                ));
            }
        }
        Ok(())
    }
}

/// How many runs to execute and how their results are aggregated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunsConfig {
    pub num_runs: usize,
    pub num_partitions: usize,
    pub results_to_keep_per_part: usize,
    pub result_threshold_per_part: Option<usize>,
    pub return_results_depth_first: bool,
    /// `0` disables the limit.
    pub max_results_per_token: usize,
    /// Runs submitted together before registration; `None` picks the pool size.
    pub wave_size: Option<usize>,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            num_runs: 1,
            num_partitions: 1,
            results_to_keep_per_part: 1,
            result_threshold_per_part: None,
            return_results_depth_first: true,
            max_results_per_token: 0,
            wave_size: None,
        }
    }
}

impl RunsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_runs == 0 {
            return Err(invalid("num_runs", "must be positive"));
        }
        if self.num_partitions == 0 {
            return Err(invalid("num_partitions", "must be positive"));
        }
        if self.results_to_keep_per_part == 0 {
            return Err(invalid("results_to_keep_per_part", "must be positive"));
        }
        if self.wave_size == Some(0) {
            return Err(invalid("wave_size", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackConfig {
    pub annealing: AnnealerConfig,
    pub runs: RunsConfig,
    pub weights: TermWeights,
}

#[derive(Default)]
pub struct PackConfigBuilder {
    annealing: Option<AnnealerConfig>,
    runs: Option<RunsConfig>,
    weights: Option<TermWeights>,
}

impl PackConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annealing(mut self, config: AnnealerConfig) -> Self {
        self.annealing = Some(config);
        self
    }
    pub fn runs(mut self, config: RunsConfig) -> Self {
        self.runs = Some(config);
        self
    }
    pub fn weights(mut self, weights: TermWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn build(self) -> Result<PackConfig, ConfigError> {
        let annealing = self
            .annealing
            .ok_or(ConfigError::MissingParameter("annealing"))?;
        annealing.validate()?;
        let runs = self.runs.unwrap_or_default();
        runs.validate()?;
        Ok(PackConfig {
            annealing,
            runs,
            weights: self.weights.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> AnnealerConfigBuilder {
        AnnealerConfigBuilder::new()
            .trial_budget(TrialBudget::Fixed(100))
            .initial_temperature(10.0)
            .final_temperature(0.1)
            .cooling_schedule(CoolingSchedule::Geometric)
    }

    #[test]
    fn build_applies_defaults_for_optional_fields() {
        let config = builder().build().unwrap();
        assert_eq!(config.position_selection, PositionSelection::Uniform);
        assert_eq!(config.final_refinement_iterations, 0);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn build_reports_missing_parameter() {
        let result = AnnealerConfigBuilder::new()
            .trial_budget(TrialBudget::Fixed(1))
            .build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("initial_temperature"))
        );
    }

    #[test]
    fn build_rejects_rising_temperatures() {
        let result = builder().final_temperature(20.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                parameter: "final_temperature",
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_increasing_custom_levels() {
        let result = builder()
            .cooling_schedule(CoolingSchedule::Custom(vec![5.0, 1.0, 2.0]))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                parameter: "cooling_schedule",
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_zero_trial_budget() {
        assert!(builder().trial_budget(TrialBudget::Fixed(0)).build().is_err());
        assert!(
            builder()
                .trial_budget(TrialBudget::PerRotamer(-1.0))
                .build()
                .is_err()
        );
    }

    #[test]
    fn trial_budget_per_rotamer_scales_and_has_floor_of_one() {
        assert_eq!(TrialBudget::PerRotamer(2.5).resolve(10), 25);
        assert_eq!(TrialBudget::PerRotamer(0.01).resolve(3), 1);
        assert_eq!(TrialBudget::Fixed(7).resolve(1000), 7);
    }

    #[test]
    fn pack_config_builder_requires_annealing_and_validates_runs() {
        assert_eq!(
            PackConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("annealing"))
        );

        let runs = RunsConfig {
            num_partitions: 0,
            ..RunsConfig::default()
        };
        let result = PackConfigBuilder::new()
            .annealing(builder().build().unwrap())
            .runs(runs)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                parameter: "num_partitions",
                ..
            })
        ));
    }
}
