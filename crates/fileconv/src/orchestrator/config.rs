use std::time::Duration;

use crate::config::schema::{Config, TimeoutsConfig};
use crate::format::SourceCategory;
use crate::storage::ConflictPolicy;

/// Runtime settings for the orchestrator, projected from [`Config`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on workers, whatever a submit call asks for.
    pub max_concurrency: usize,
    /// Extra attempts after an external tool failure.
    pub retries: u32,
    pub diagnostics_limit: usize,
    pub timeouts: TimeoutsConfig,
    pub conflict_policy: ConflictPolicy,
}

impl BatchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            retries: config.retries,
            diagnostics_limit: config.diagnostics_limit,
            timeouts: config.timeouts.clone(),
            conflict_policy: config.output.conflict_policy,
        }
    }

    pub fn deadline_for(&self, category: SourceCategory) -> Duration {
        self.timeouts.for_category(category)
    }

    /// Workers started for a batch of `task_count` tasks.
    pub fn effective_workers(&self, requested: usize, task_count: usize) -> usize {
        requested
            .min(self.max_concurrency)
            .min(num_cpus::get())
            .min(task_count)
            .max(1)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
