//! The sequential trial loop.

use std::time::Instant;

use lo_types::{LoError, LoResult};
use tracing::{debug, info};

use crate::search::{Candidate, SearchSpace};
use crate::trial::{assign_ranks, OptimizationConfig, OptimizationStatus, TrialRecord};

/// Result of a completed optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub best_candidate: Candidate,
    pub best_objective: f64,
    /// Index of the winning trial.
    pub best_trial: usize,
    /// Every trial in execution order, ranked.
    pub trials: Vec<TrialRecord>,
    /// True when the time budget ended the loop before `trial_count` trials.
    pub stopped_by_budget: bool,
    pub status: OptimizationStatus,
}

/// Runs a bounded number of trials against a caller-supplied objective.
///
/// Holds no state between calls; every `optimize` starts from a fresh strategy
/// seeded from the configuration.
#[derive(Debug, Clone)]
pub struct TrialOptimizer {
    config: OptimizationConfig,
}

impl TrialOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Propose, evaluate and record trials one at a time.
    ///
    /// An objective that returns an error or a non-finite value counts as a
    /// failed trial. The run fails with [`LoError::NoViableTrial`] only if
    /// no trial completed.
    pub fn optimize<F>(&self, space: &SearchSpace, mut objective: F) -> LoResult<OptimizationOutcome>
    where
        F: FnMut(&Candidate) -> LoResult<f64>,
    {
        space.validate()?;

        let direction = self.config.direction;
        let mut strategy = self.config.strategy.build(space.clone(), self.config.seed);
        let mut status = OptimizationStatus::new(&self.config);
        let mut trials = Vec::with_capacity(self.config.trial_count.min(1_024));
        let mut stopped_by_budget = false;
        let mut last_error = None;

        status.mark_running();
        let started = Instant::now();

        for trial_number in 0..self.config.trial_count {
            if let Some(budget) = self.config.time_budget {
                if trial_number > 0 && started.elapsed() >= budget {
                    stopped_by_budget = true;
                    info!(
                        optimization_id = %self.config.id,
                        trials_run = trial_number,
                        "time budget exhausted, stopping search"
                    );
                    break;
                }
            }

            let Some(candidate) = strategy.suggest(1).pop() else {
                break;
            };

            let trial_started = Instant::now();
            let record = match objective(&candidate) {
                Ok(value) if value.is_finite() => {
                    strategy.report(&candidate, direction.to_score(value));
                    TrialRecord::completed(trial_number, candidate, value, trial_started.elapsed())
                }
                Ok(value) => {
                    let message = format!("objective is not finite: {value}");
                    last_error = Some(message.clone());
                    TrialRecord::failed(trial_number, candidate, message, trial_started.elapsed())
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    TrialRecord::failed(trial_number, candidate, e.to_string(), trial_started.elapsed())
                }
            };

            debug!(
                trial = trial_number,
                objective = ?record.objective,
                error = ?record.error,
                strategy = strategy.name(),
                "trial finished"
            );
            status.record(&record);
            trials.push(record);
        }

        let Some(best) = status.best_trial.clone() else {
            let err = LoError::NoViableTrial {
                attempted: trials.len(),
                last_error,
            };
            status.mark_failed(err.to_string());
            return Err(err);
        };
        status.mark_completed();

        assign_ranks(&mut trials, direction);
        let best_objective = best.objective.unwrap_or(f64::NAN);

        info!(
            optimization_id = %self.config.id,
            trials = trials.len(),
            failed = status.trials_failed,
            best_trial = best.trial_number,
            best_objective,
            "optimization finished"
        );

        Ok(OptimizationOutcome {
            best_candidate: best.candidate,
            best_objective,
            best_trial: best.trial_number,
            trials,
            stopped_by_budget,
            status,
        })
    }
}
