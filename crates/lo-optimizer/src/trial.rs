//! Trial tracking and optimization run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::search::{Candidate, RandomSearch, SearchSpace, SearchStrategy, TpeSearch};

/// Unique optimization run identifier.
pub type OptimizationId = Uuid;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// Orient an objective so that larger is always better.
    pub fn to_score(&self, objective: f64) -> f64 {
        match self {
            Self::Maximize => objective,
            Self::Minimize => -objective,
        }
    }

    /// Strict improvement of `candidate` over `incumbent`.
    pub fn improves(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Proposal strategy used by the trial loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Random,
    #[default]
    Tpe,
}

impl StrategyKind {
    pub fn build(&self, space: SearchSpace, seed: u64) -> Box<dyn SearchStrategy> {
        match self {
            Self::Random => Box::new(RandomSearch::new(space, seed)),
            Self::Tpe => Box::new(TpeSearch::new(space, seed)),
        }
    }
}

/// Configuration for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub id: OptimizationId,

    /// Maximum number of trials to run.
    pub trial_count: usize,

    /// Wall-clock bound; once exceeded no new trial is started.
    pub time_budget: Option<Duration>,

    pub direction: ObjectiveDirection,

    pub strategy: StrategyKind,

    pub seed: u64,

    pub created_at: DateTime<Utc>,
}

impl OptimizationConfig {
    pub fn new(trial_count: usize, seed: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            trial_count,
            time_budget: None,
            direction: ObjectiveDirection::Maximize,
            strategy: StrategyKind::Tpe,
            seed,
            created_at: Utc::now(),
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub id: OptimizationId,
    pub direction: ObjectiveDirection,
    pub state: OptimizationState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub best_trial: Option<TrialRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationStatus {
    pub fn new(config: &OptimizationConfig) -> Self {
        Self {
            id: config.id,
            direction: config.direction,
            state: OptimizationState::Pending,
            trials_completed: 0,
            trials_failed: 0,
            best_trial: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = OptimizationState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Count a finished trial and keep it if it strictly beats the current best.
    ///
    /// Because only strict improvements replace the incumbent, the earliest
    /// trial wins ties.
    pub fn record(&mut self, trial: &TrialRecord) {
        let objective = match (trial.status, trial.objective) {
            (TrialStatus::Completed, Some(objective)) => objective,
            _ => {
                self.trials_failed += 1;
                return;
            }
        };
        self.trials_completed += 1;

        let improves = match self.best_trial.as_ref().and_then(|b| b.objective) {
            None => true,
            Some(best) => self.direction.improves(objective, best),
        };
        if improves {
            self.best_trial = Some(trial.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Completed,
    Failed,
}

/// One fit-and-evaluate cycle against a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_number: usize,
    pub candidate: Candidate,
    pub status: TrialStatus,
    /// Raw objective value; `None` for failed trials.
    pub objective: Option<f64>,
    /// 1-based position among completed trials, best first.
    pub rank: Option<usize>,
    pub duration: Duration,
    pub error: Option<String>,
}

impl TrialRecord {
    pub fn completed(
        trial_number: usize,
        candidate: Candidate,
        objective: f64,
        duration: Duration,
    ) -> Self {
        Self {
            trial_number,
            candidate,
            status: TrialStatus::Completed,
            objective: Some(objective),
            rank: None,
            duration,
            error: None,
        }
    }

    pub fn failed(trial_number: usize, candidate: Candidate, error: String, duration: Duration) -> Self {
        Self {
            trial_number,
            candidate,
            status: TrialStatus::Failed,
            objective: None,
            rank: None,
            duration,
            error: Some(error),
        }
    }
}

/// Assign ranks to completed trials, best first, earliest trial first on ties.
pub(crate) fn assign_ranks(trials: &mut [TrialRecord], direction: ObjectiveDirection) {
    let mut order: Vec<(usize, f64)> = trials
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.objective.map(|o| (i, direction.to_score(o))))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    for (rank, (i, _)) in order.into_iter().enumerate() {
        trials[i].rank = Some(rank + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(n: usize, objective: Option<f64>) -> TrialRecord {
        match objective {
            Some(o) => TrialRecord::completed(n, Candidate::new(), o, Duration::from_millis(5)),
            None => TrialRecord::failed(n, Candidate::new(), "boom".into(), Duration::ZERO),
        }
    }

    #[test]
    fn optimization_status_lifecycle() {
        let config = OptimizationConfig::new(10, 42);
        let mut status = OptimizationStatus::new(&config);

        assert_eq!(status.state, OptimizationState::Pending);
        assert!(status.started_at.is_none());

        status.mark_running();
        assert_eq!(status.state, OptimizationState::Running);
        assert!(status.started_at.is_some());

        status.mark_completed();
        assert_eq!(status.state, OptimizationState::Completed);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn best_trial_tracking_maximize() {
        let mut status = OptimizationStatus::new(&OptimizationConfig::new(10, 0));

        status.record(&trial(0, Some(1.5)));
        status.record(&trial(1, Some(2.0)));
        status.record(&trial(2, Some(1.0)));
        status.record(&trial(3, None));

        let best = status.best_trial.as_ref().unwrap();
        assert_eq!(best.objective, Some(2.0));
        assert_eq!(status.trials_completed, 3);
        assert_eq!(status.trials_failed, 1);
    }

    #[test]
    fn best_trial_tracking_minimize() {
        let config = OptimizationConfig::new(10, 0).with_direction(ObjectiveDirection::Minimize);
        let mut status = OptimizationStatus::new(&config);

        status.record(&trial(0, Some(0.4)));
        status.record(&trial(1, Some(0.1)));
        status.record(&trial(2, Some(0.3)));
        assert_eq!(status.best_trial.as_ref().unwrap().trial_number, 1);
    }

    #[test]
    fn ties_keep_earliest_trial() {
        let mut status = OptimizationStatus::new(&OptimizationConfig::new(10, 0));
        status.record(&trial(0, Some(0.7)));
        status.record(&trial(1, Some(0.9)));
        status.record(&trial(2, Some(0.9)));
        assert_eq!(status.best_trial.as_ref().unwrap().trial_number, 1);
    }

    #[test]
    fn ranks_skip_failed_trials() {
        let mut trials = vec![
            trial(0, Some(0.5)),
            trial(1, None),
            trial(2, Some(0.8)),
            trial(3, Some(0.8)),
        ];
        assign_ranks(&mut trials, ObjectiveDirection::Maximize);

        assert_eq!(trials[0].rank, Some(3));
        assert_eq!(trials[1].rank, None);
        assert_eq!(trials[2].rank, Some(1));
        assert_eq!(trials[3].rank, Some(2));
    }
}
