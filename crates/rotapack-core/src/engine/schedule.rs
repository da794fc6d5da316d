use super::config::{AnnealerConfig, CoolingSchedule};

/// Lowest temperature the annealer ever uses. At this level uphill moves are
/// always rejected.
pub const TEMPERATURE_FLOOR: f64 = 1e-6;

/// Maps a trial index onto a temperature.
pub trait TemperatureSchedule {
    fn temperature(&self, trial: usize, total_trials: usize) -> f64;
}

#[derive(Debug, Clone)]
pub struct ConfiguredSchedule {
    initial: f64,
    last: f64,
    kind: CoolingSchedule,
}

impl ConfiguredSchedule {
    pub fn new(initial: f64, last: f64, kind: CoolingSchedule) -> Self {
        Self {
            initial,
            last,
            kind,
        }
    }

    pub fn from_config(config: &AnnealerConfig) -> Self {
        Self::new(
            config.initial_temperature,
            config.final_temperature,
            config.cooling_schedule.clone(),
        )
    }
}

impl TemperatureSchedule for ConfiguredSchedule {
    fn temperature(&self, trial: usize, total_trials: usize) -> f64 {
        let fraction = if total_trials > 1 {
            (trial.min(total_trials - 1)) as f64 / (total_trials - 1) as f64
        } else {
            0.0
        };
        let t = match &self.kind {
            CoolingSchedule::Linear => self.initial + (self.last - self.initial) * fraction,
            CoolingSchedule::Geometric => self.initial * (self.last / self.initial).powf(fraction),
            CoolingSchedule::Custom(levels) => {
                if levels.is_empty() {
                    self.last
                } else {
                    let idx = (trial * levels.len() / total_trials.max(1)).min(levels.len() - 1);
                    levels[idx]
                }
            }
        };
        t.max(TEMPERATURE_FLOOR)
    }
}

/// Metropolis criterion. Downhill and neutral moves are always accepted.
pub fn accept_move(delta: f64, temperature: f64, draw: f64) -> bool {
    if delta <= 0.0 {
        return true;
    }
    if temperature <= TEMPERATURE_FLOOR {
        return false;
    }
    draw < (-delta / temperature).exp()
}
