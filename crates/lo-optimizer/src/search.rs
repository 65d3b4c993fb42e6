//! Backend hyperparameter spaces and the strategies that propose from them.
//!
//! Every numeric hyperparameter is also addressable through a normalised
//! coordinate in `[0, 1]`, which is where proposal strategies and local
//! searches do their arithmetic. Log-scaled knobs (learning rates, penalties,
//! tree counts) are uniform in log space there.

use lo_types::{config_error, LoResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Spacing of a numeric hyperparameter over its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    #[default]
    Linear,
    /// Uniform in `ln(value)`; requires a positive lower bound.
    Log,
}

/// The values a backend hyperparameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    /// A real knob such as `subsample` or `learning_rate`.
    Real { low: f64, high: f64, scale: Scale },
    /// Integer knob on the grid `low, low + step, ...` not exceeding `high`.
    /// Tree counts and leaf budgets are usually log-scaled.
    Integer {
        low: i64,
        high: i64,
        step: i64,
        scale: Scale,
    },
    /// A named option, e.g. the learner family a meta search settled on.
    Categorical { options: Vec<String> },
}

impl Domain {
    fn is_valid(&self) -> bool {
        match self {
            Self::Real { low, high, scale } => {
                low.is_finite()
                    && high.is_finite()
                    && low <= high
                    && (*scale == Scale::Linear || *low > 0.0)
            }
            Self::Integer {
                low,
                high,
                step,
                scale,
            } => low <= high && *step >= 1 && (*scale == Scale::Linear || *low >= 1),
            Self::Categorical { options } => !options.is_empty(),
        }
    }

    /// Whether `value` is exactly one of the values this domain can produce.
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Self::Real { low, high, .. }, _) => {
                value.as_f64().is_some_and(|v| v.is_finite() && *low <= v && v <= *high)
            }
            (
                Self::Integer {
                    low, high, step, ..
                },
                ParameterValue::Integer(v),
            ) => low <= v && v <= high && (*v - *low) % (*step).max(1) == 0,
            (Self::Categorical { options }, ParameterValue::Label(v)) => options.contains(v),
            _ => false,
        }
    }

    /// Number of grid steps above `low` for an integer domain.
    fn max_steps(low: i64, high: i64, step: i64) -> i64 {
        (high - low) / step.max(1)
    }

    /// Normalised coordinate of `value`; `None` if it does not belong here.
    pub fn to_unit(&self, value: &ParameterValue) -> Option<f64> {
        let u = match self {
            Self::Real { low, high, scale } => unit_of(*low, *high, *scale, value.as_f64()?),
            Self::Integer {
                low, high, scale, ..
            } => unit_of(*low as f64, *high as f64, *scale, value.as_f64()?),
            Self::Categorical { options } => {
                let idx = options.iter().position(|o| Some(o.as_str()) == value.as_str())?;
                (idx as f64 + 0.5) / options.len() as f64
            }
        };
        Some(u)
    }

    /// Value at normalised coordinate `u`, snapped onto the domain.
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
        match self {
            Self::Real { low, high, scale } => {
                ParameterValue::Real(value_of(*low, *high, *scale, u).clamp(*low, *high))
            }
            Self::Integer {
                low,
                high,
                step,
                scale,
            } => {
                let raw = value_of(*low as f64, *high as f64, *scale, u);
                let k = ((raw - *low as f64) / *step as f64).round() as i64;
                ParameterValue::Integer(low + k.clamp(0, Self::max_steps(*low, *high, *step)) * step)
            }
            Self::Categorical { options } => {
                let idx = ((u * options.len() as f64) as usize).min(options.len().saturating_sub(1));
                ParameterValue::Label(options.get(idx).cloned().unwrap_or_default())
            }
        }
    }

    /// A uniform draw; integer grids and option lists weight every value equally.
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> ParameterValue {
        match self {
            Self::Integer {
                low,
                high,
                step,
                scale: Scale::Linear,
            } => {
                let k = rng.random_range(0..=Self::max_steps(*low, *high, *step));
                ParameterValue::Integer(low + k * step)
            }
            Self::Categorical { options } => {
                ParameterValue::Label(options[rng.random_range(0..options.len())].clone())
            }
            _ => self.from_unit(rng.random::<f64>()),
        }
    }
}

fn unit_of(low: f64, high: f64, scale: Scale, value: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    let u = match scale {
        Scale::Linear => (value - low) / (high - low),
        Scale::Log => (value.max(low).ln() - low.ln()) / (high.ln() - low.ln()),
    };
    u.clamp(0.0, 1.0)
}

fn value_of(low: f64, high: f64, scale: Scale, u: f64) -> f64 {
    match scale {
        Scale::Linear => low + u * (high - low),
        Scale::Log => (low.ln() + u * (high.ln() - low.ln())).exp(),
    }
}

/// A concrete hyperparameter value, serialised as a bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Real(f64),
    Label(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Label(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Real(v) if v.is_finite() => Some(v.round() as i64),
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Label(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Real(v) => serde_json::json!(v),
            Self::Integer(v) => serde_json::json!(v),
            Self::Label(v) => serde_json::json!(v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Label(v) => f.write_str(v),
        }
    }
}

/// One hyperparameter assignment, keyed by the name the backend reads.
pub type Candidate = BTreeMap<String, ParameterValue>;

/// A named backend knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameter {
    pub name: String,
    pub domain: Domain,
    /// Low-cost value a local search starts from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ParameterValue>,
}

/// The hyperparameters one backend searches over, in declaration order.
///
/// ```
/// use lo_optimizer::SearchSpace;
///
/// let space = SearchSpace::new()
///     .stepped_integer("n_estimators", 100, 1000, 50)
///     .integer("max_depth", 3, 10)
///     .log_real("learning_rate", 0.01, 0.3)
///     .real("subsample", 0.8, 1.0);
/// assert!(space.validate().is_ok());
/// assert_eq!(space.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    dims: Vec<Hyperparameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.dims.push(Hyperparameter {
            name: name.into(),
            domain,
            start: None,
        });
        self
    }

    pub fn real(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.push(
            name,
            Domain::Real {
                low,
                high,
                scale: Scale::Linear,
            },
        )
    }

    pub fn log_real(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.push(
            name,
            Domain::Real {
                low,
                high,
                scale: Scale::Log,
            },
        )
    }

    pub fn integer(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.stepped_integer(name, low, high, 1)
    }

    pub fn stepped_integer(self, name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        self.push(
            name,
            Domain::Integer {
                low,
                high,
                step,
                scale: Scale::Linear,
            },
        )
    }

    pub fn log_integer(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.push(
            name,
            Domain::Integer {
                low,
                high,
                step: 1,
                scale: Scale::Log,
            },
        )
    }

    pub fn categorical(self, name: impl Into<String>, options: &[&str]) -> Self {
        self.push(
            name,
            Domain::Categorical {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
        )
    }

    /// Starting value for the hyperparameter declared last.
    pub fn starting_at(mut self, value: impl Into<ParameterValue>) -> Self {
        if let Some(dim) = self.dims.last_mut() {
            dim.start = Some(value.into());
        }
        self
    }

    pub fn dims(&self) -> &[Hyperparameter] {
        &self.dims
    }

    pub fn names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Reject domains no strategy can draw from, and starts outside them.
    pub fn validate(&self) -> LoResult<()> {
        for dim in &self.dims {
            if !dim.domain.is_valid() {
                return Err(config_error!(
                    "invalid domain for hyperparameter {}: {:?}",
                    dim.name,
                    dim.domain
                ));
            }
            if let Some(start) = &dim.start {
                if !dim.domain.contains(start) {
                    return Err(config_error!(
                        "start value {start} does not belong to hyperparameter {}",
                        dim.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Normalised starting point; hyperparameters without a start sit mid-range.
    pub fn start_point(&self) -> Vec<f64> {
        self.dims
            .iter()
            .map(|d| {
                d.start
                    .as_ref()
                    .and_then(|s| d.domain.to_unit(s))
                    .unwrap_or(0.5)
            })
            .collect()
    }

    /// The candidate at a normalised point, one coordinate per hyperparameter.
    pub fn candidate_at(&self, point: &[f64]) -> Candidate {
        self.dims
            .iter()
            .zip(point)
            .map(|(d, &u)| (d.name.clone(), d.domain.from_unit(u)))
            .collect()
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> Candidate {
        self.dims
            .iter()
            .map(|d| (d.name.clone(), d.domain.sample(rng)))
            .collect()
    }
}

/// Proposes candidates and learns from their scores.
///
/// Strategies are seeded: the sequence of proposals depends only on the seed
/// and on the scores reported so far.
pub trait SearchStrategy: Send + Sync {
    fn suggest(&mut self, count: usize) -> Vec<Candidate>;

    /// `score` is oriented so that larger is better.
    fn report(&mut self, _candidate: &Candidate, _score: f64) {}

    fn name(&self) -> &str;
}

/// Independent uniform draws.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<Candidate> {
        (0..count).map(|_| self.space.sample(&mut self.rng)).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Tree-structured Parzen estimator.
///
/// After a uniform startup phase, completed trials are split at the `gamma`
/// quantile into a "good" and a "bad" set. Numeric hyperparameters are then
/// drawn from a kernel density around the good trials in normalised space,
/// keeping the draw that maximises `l(x) / g(x)`; categorical ones are drawn
/// in proportion to their smoothed good/bad frequency ratio.
#[derive(Debug, Clone)]
pub struct TpeSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
    gamma: f64,
    n_startup: usize,
    n_candidates: usize,
    observations: Vec<(Candidate, f64)>,
}

impl TpeSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
            gamma: 0.25,
            n_startup: 10,
            n_candidates: 24,
            observations: Vec::new(),
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(0.01, 0.99);
        self
    }

    /// Completed trials drawn uniformly before modelling starts.
    pub fn with_startup(mut self, n: usize) -> Self {
        self.n_startup = n.max(2);
        self
    }

    pub fn n_observations(&self) -> usize {
        self.observations.len()
    }

    fn propose(&mut self) -> Candidate {
        if self.observations.len() < self.n_startup.max(2) {
            return self.space.sample(&mut self.rng);
        }

        // stable: among equal scores the earlier trial ranks higher
        let mut ranked: Vec<&(Candidate, f64)> = self.observations.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let n_good = ((ranked.len() as f64 * self.gamma).ceil() as usize).clamp(1, ranked.len() - 1);
        let (good, bad) = ranked.split_at(n_good);

        let mut candidate = Candidate::new();
        for dim in &self.space.dims {
            let value = match &dim.domain {
                Domain::Categorical { options } => {
                    let good_idx = option_indices(&dim.name, options, good);
                    let bad_idx = option_indices(&dim.name, options, bad);
                    let idx = sample_ratio_discrete(&good_idx, &bad_idx, options.len(), &mut self.rng);
                    ParameterValue::Label(options[idx].clone())
                }
                domain => {
                    let good_u = unit_values(&dim.name, domain, good);
                    let bad_u = unit_values(&dim.name, domain, bad);
                    let u = sample_ratio_continuous(&good_u, &bad_u, self.n_candidates, &mut self.rng);
                    domain.from_unit(u)
                }
            };
            candidate.insert(dim.name.clone(), value);
        }
        candidate
    }
}

impl SearchStrategy for TpeSearch {
    fn suggest(&mut self, count: usize) -> Vec<Candidate> {
        (0..count).map(|_| self.propose()).collect()
    }

    fn report(&mut self, candidate: &Candidate, score: f64) {
        if score.is_finite() {
            self.observations.push((candidate.clone(), score));
        }
    }

    fn name(&self) -> &str {
        "tpe"
    }
}

fn unit_values(name: &str, domain: &Domain, trials: &[&(Candidate, f64)]) -> Vec<f64> {
    trials
        .iter()
        .filter_map(|(candidate, _)| domain.to_unit(candidate.get(name)?))
        .collect()
}

fn option_indices(name: &str, options: &[String], trials: &[&(Candidate, f64)]) -> Vec<usize> {
    trials
        .iter()
        .filter_map(|(candidate, _)| {
            let chosen = candidate.get(name)?.as_str()?;
            options.iter().position(|o| o == chosen)
        })
        .collect()
}

/// Gaussian kernel density estimate at `x`.
fn kde_score(x: f64, values: &[f64], bandwidth: f64) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    values
        .iter()
        .map(|&v| (-(x - v).powi(2) / (2.0 * bandwidth.powi(2))).exp())
        .sum::<f64>()
        / values.len() as f64
}

/// Best of `n_candidates` perturbed good points, in `[0, 1]`.
fn sample_ratio_continuous(good: &[f64], bad: &[f64], n_candidates: usize, rng: &mut ChaCha8Rng) -> f64 {
    if good.is_empty() {
        return rng.random::<f64>();
    }

    const BANDWIDTH: f64 = 0.1;
    let mut best_value = good[0];
    let mut best_ratio = f64::NEG_INFINITY;

    for _ in 0..n_candidates.max(1) {
        let base = good[rng.random_range(0..good.len())];
        // Box-Muller
        let u1: f64 = rng.random::<f64>().max(1e-10);
        let u2: f64 = rng.random();
        let noise = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * BANDWIDTH;
        let x = (base + noise).clamp(0.0, 1.0);

        let ratio = kde_score(x, good, BANDWIDTH) / (kde_score(x, bad, BANDWIDTH) + 1e-10);
        if ratio > best_ratio {
            best_ratio = ratio;
            best_value = x;
        }
    }

    best_value
}

fn sample_ratio_discrete(good: &[usize], bad: &[usize], n_values: usize, rng: &mut ChaCha8Rng) -> usize {
    // Laplace smoothing
    let mut good_counts = vec![1.0; n_values];
    let mut bad_counts = vec![1.0; n_values];
    for &i in good {
        good_counts[i] += 1.0;
    }
    for &i in bad {
        bad_counts[i] += 1.0;
    }

    let good_total: f64 = good_counts.iter().sum();
    let bad_total: f64 = bad_counts.iter().sum();
    let weights: Vec<f64> = good_counts
        .iter()
        .zip(&bad_counts)
        .map(|(l, g)| (l / good_total) / (g / bad_total))
        .collect();

    let total: f64 = weights.iter().sum();
    let r = rng.random::<f64>() * total;
    let mut cumsum = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumsum += w;
        if r < cumsum {
            return i;
        }
    }
    n_values - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boosting_space() -> SearchSpace {
        SearchSpace::new()
            .stepped_integer("n_estimators", 100, 1000, 50)
            .integer("max_depth", 3, 10)
            .log_real("learning_rate", 0.01, 0.3)
            .real("subsample", 0.8, 1.0)
    }

    #[test]
    fn random_search_stays_on_the_domains() {
        let mut rs = RandomSearch::new(boosting_space(), 42);
        let suggestions = rs.suggest(50);
        assert_eq!(suggestions.len(), 50);

        for params in &suggestions {
            match params.get("n_estimators") {
                Some(ParameterValue::Integer(v)) => {
                    assert!((100..=1000).contains(v) && v % 50 == 0, "n_estimators off grid: {v}")
                }
                other => panic!("unexpected n_estimators value: {other:?}"),
            }
            match params.get("max_depth") {
                Some(ParameterValue::Integer(v)) => assert!((3..=10).contains(v)),
                other => panic!("unexpected max_depth value: {other:?}"),
            }
            match params.get("learning_rate") {
                Some(ParameterValue::Real(v)) => assert!(*v >= 0.01 && *v <= 0.3, "lr out of bounds: {v}"),
                other => panic!("unexpected learning_rate value: {other:?}"),
            }
            match params.get("subsample") {
                Some(ParameterValue::Real(v)) => assert!(*v >= 0.8 && *v <= 1.0),
                other => panic!("unexpected subsample value: {other:?}"),
            }
        }
    }

    #[test]
    fn log_scale_spends_half_the_draws_below_the_geometric_mean() {
        let space = SearchSpace::new().log_real("alpha", 1e-4, 1.0);
        let draws = RandomSearch::new(space, 9).suggest(400);
        let below = draws
            .iter()
            .filter(|c| c["alpha"].as_f64().unwrap() < 1e-2)
            .count();
        assert!((140..=260).contains(&below), "{below} of 400 below 1e-2");
    }

    #[test]
    fn unit_coordinates_snap_onto_domains() {
        let trees = Domain::Integer {
            low: 100,
            high: 1000,
            step: 50,
            scale: Scale::Linear,
        };
        assert_eq!(trees.from_unit(0.0), ParameterValue::Integer(100));
        assert_eq!(trees.from_unit(1.0), ParameterValue::Integer(1000));
        assert_eq!(trees.from_unit(0.51), ParameterValue::Integer(550));
        assert_eq!(trees.to_unit(&ParameterValue::Integer(550)), Some(0.5));

        let leaves = Domain::Integer {
            low: 4,
            high: 256,
            step: 1,
            scale: Scale::Log,
        };
        assert_eq!(leaves.from_unit(0.5), ParameterValue::Integer(32));

        let family = Domain::Categorical {
            options: vec!["depth_wise".into(), "ridge".into()],
        };
        assert_eq!(family.from_unit(0.9), ParameterValue::Label("ridge".into()));
        assert_eq!(family.to_unit(&"ridge".into()), Some(0.75));
        assert_eq!(family.to_unit(&"lasso".into()), None);
        assert_eq!(family.to_unit(&ParameterValue::Integer(1)), None);
    }

    #[test]
    fn start_point_and_candidate_at() {
        let space = SearchSpace::new()
            .log_integer("n_estimators", 4, 512)
            .starting_at(4_i64)
            .log_real("learning_rate", 0.01, 1.0)
            .starting_at(0.1)
            .real("subsample", 0.6, 1.0);
        assert!(space.validate().is_ok());

        let start = space.start_point();
        assert_eq!(start[0], 0.0);
        assert!((start[1] - 0.5).abs() < 1e-12);
        assert_eq!(start[2], 0.5);

        let candidate = space.candidate_at(&start);
        assert_eq!(candidate["n_estimators"], ParameterValue::Integer(4));
        assert!((candidate["learning_rate"].as_f64().unwrap() - 0.1).abs() < 1e-12);
        assert!((candidate["subsample"].as_f64().unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn seeded_strategies_repeat() {
        let a = RandomSearch::new(boosting_space(), 7).suggest(10);
        let b = RandomSearch::new(boosting_space(), 7).suggest(10);
        assert_eq!(a, b);

        let c = RandomSearch::new(boosting_space(), 8).suggest(10);
        assert_ne!(a, c);

        let mut t1 = TpeSearch::new(boosting_space(), 3);
        let mut t2 = TpeSearch::new(boosting_space(), 3);
        for _ in 0..20 {
            let x = t1.suggest(1).remove(0);
            let y = t2.suggest(1).remove(0);
            assert_eq!(x, y);
            let score = x["subsample"].as_f64().unwrap();
            t1.report(&x, score);
            t2.report(&y, score);
        }
    }

    #[test]
    fn tpe_concentrates_on_good_region() {
        let space = SearchSpace::new().real("x", 0.0, 1.0);
        let mut tpe = TpeSearch::new(space, 11);

        for _ in 0..40 {
            let candidate = tpe.suggest(1).remove(0);
            let x = candidate["x"].as_f64().unwrap();
            tpe.report(&candidate, -(x - 0.9).abs());
        }
        assert_eq!(tpe.n_observations(), 40);

        let proposals = tpe.suggest(50);
        let mean = proposals
            .iter()
            .map(|c| c["x"].as_f64().unwrap())
            .sum::<f64>()
            / 50.0;
        assert!(mean > 0.6, "mean proposal {mean} did not move toward 0.9");
    }

    #[test]
    fn tpe_ignores_non_finite_scores() {
        let mut tpe = TpeSearch::new(boosting_space(), 1);
        let candidate = tpe.suggest(1).remove(0);
        tpe.report(&candidate, f64::NAN);
        assert_eq!(tpe.n_observations(), 0);
    }

    #[test]
    fn tpe_draws_categorical_options() {
        let space = SearchSpace::new().categorical("estimator", &["depth_wise_trees", "ridge"]);
        let mut tpe = TpeSearch::new(space, 5).with_startup(4);

        for _ in 0..30 {
            let candidate = tpe.suggest(1).remove(0);
            let estimator = candidate["estimator"].as_str().unwrap().to_string();
            assert!(["depth_wise_trees", "ridge"].contains(&estimator.as_str()));
            tpe.report(&candidate, if estimator == "ridge" { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn invalid_domains_are_rejected() {
        assert!(boosting_space().validate().is_ok());
        assert!(SearchSpace::new().integer("max_depth", 5, 1).validate().is_err());
        assert!(SearchSpace::new().stepped_integer("n_estimators", 1, 9, 0).validate().is_err());
        assert!(SearchSpace::new().log_real("learning_rate", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().log_integer("num_leaves", 0, 64).validate().is_err());
        assert!(SearchSpace::new().categorical("estimator", &[]).validate().is_err());
        assert!(SearchSpace::new()
            .real("subsample", 0.8, 1.0)
            .starting_at(1.5)
            .validate()
            .is_err());
        assert!(SearchSpace::new()
            .stepped_integer("n_estimators", 100, 1000, 50)
            .starting_at(120_i64)
            .validate()
            .is_err());
        assert!(SearchSpace::new()
            .categorical("estimator", &["ridge"])
            .starting_at(3_i64)
            .validate()
            .is_err());
    }

    #[test]
    fn parameter_value_conversions() {
        assert_eq!(ParameterValue::Real(4.6).as_i64(), Some(5));
        assert_eq!(ParameterValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(ParameterValue::Integer(3).to_json(), serde_json::json!(3));
        assert_eq!(ParameterValue::from("ridge").as_str(), Some("ridge"));
        assert_eq!(ParameterValue::from("ridge").as_f64(), None);

        let parsed: ParameterValue = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, ParameterValue::Integer(3));
        let parsed: ParameterValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(parsed, ParameterValue::Real(0.25));
    }
}
