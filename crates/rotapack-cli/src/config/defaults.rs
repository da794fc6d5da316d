pub struct DefaultsConfig {
    pub trials_per_rotamer: f64,
    pub initial_temperature: f64,
    pub final_temperature: f64,
    pub final_refinement_iterations: usize,
    pub num_runs: usize,
    pub num_partitions: usize,
    pub results_to_keep_per_part: usize,
    pub return_results_depth_first: bool,
    pub max_results_per_token: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            trials_per_rotamer: 50.0,
            initial_temperature: 10.0,
            final_temperature: 0.3,
            final_refinement_iterations: 2,
            num_runs: 10,
            num_partitions: 1,
            results_to_keep_per_part: 1,
            return_results_depth_first: true,
            max_results_per_token: 0,
        }
    }
}
