//! Gradient histograms and split finding.

use rayon::prelude::*;

use super::binning::{BinMapper, BinnedMatrix};

/// Below this many (row, feature) cells histograms are built on one thread.
const PARALLEL_CELLS: usize = 32_768;

/// Splits must improve the objective by more than this.
pub(crate) const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramBin {
    pub grad: f64,
    pub hess: f64,
    pub count: usize,
}

impl HistogramBin {
    fn add(&mut self, other: &HistogramBin) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &HistogramBin) -> HistogramBin {
        HistogramBin {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// Regularisation used by gain and leaf-weight computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParams {
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    pub min_child_weight: f64,
}

impl GainParams {
    fn score(&self, grad: f64, hess: f64) -> f64 {
        grad * grad / (hess + self.lambda)
    }

    /// Gain of splitting `total` into `left` and the remainder, if both children are admissible.
    pub fn split_gain(&self, left: &HistogramBin, total: &HistogramBin) -> Option<f64> {
        let right = total.minus(left);
        if left.count == 0
            || right.count == 0
            || left.hess < self.min_child_weight
            || right.hess < self.min_child_weight
        {
            return None;
        }
        Some(
            self.score(left.grad, left.hess) + self.score(right.grad, right.hess)
                - self.score(total.grad, total.hess),
        )
    }

    /// Unshrunk optimal leaf weight `-G / (H + lambda)`.
    pub fn leaf_weight(&self, stats: &HistogramBin) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        -stats.grad / (stats.hess + self.lambda)
    }
}

/// Winning split of a node: rows with `bin <= bin` go left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitInfo {
    pub feature: usize,
    pub bin: usize,
    pub gain: f64,
}

/// Everything needed to evaluate splits for one tree of one output.
pub struct SplitContext<'a> {
    pub binned: &'a BinnedMatrix,
    pub mapper: &'a BinMapper,
    pub grad: &'a [f64],
    pub hess: &'a [f64],
    /// Features sampled for this tree.
    pub features: &'a [usize],
    pub params: GainParams,
}

impl<'a> SplitContext<'a> {
    pub fn stats(&self, rows: &[usize]) -> HistogramBin {
        let mut stats = HistogramBin::default();
        for &i in rows {
            stats.grad += self.grad[i];
            stats.hess += self.hess[i];
        }
        stats.count = rows.len();
        stats
    }

    pub fn histogram(&self, feature: usize, rows: &[usize]) -> Vec<HistogramBin> {
        let bins = self.binned.feature(feature);
        let mut hist = vec![HistogramBin::default(); self.mapper.n_bins(feature)];
        for &i in rows {
            let slot = &mut hist[bins[i] as usize];
            slot.grad += self.grad[i];
            slot.hess += self.hess[i];
            slot.count += 1;
        }
        hist
    }

    /// Map `f` over the sampled features, in parallel for large nodes.
    ///
    /// Results keep feature order, so any reduction over them is deterministic.
    pub fn map_features<T, F>(&self, cells: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if cells * self.features.len() >= PARALLEL_CELLS {
            self.features.par_iter().map(|&feature| f(feature)).collect()
        } else {
            self.features.iter().map(|&feature| f(feature)).collect()
        }
    }

    /// Best split of `rows`; the earliest feature and bin win ties.
    pub fn best_split(&self, rows: &[usize]) -> Option<SplitInfo> {
        let total = self.stats(rows);
        let candidates = self.map_features(rows.len(), |feature| {
            let hist = self.histogram(feature, rows);
            best_bin(&hist, &total, &self.params).map(|(bin, gain)| SplitInfo { feature, bin, gain })
        });

        pick_best(candidates)
    }

    /// Split `rows` into (left, right) by `split`, preserving order.
    pub fn partition(&self, rows: &[usize], split: &SplitInfo) -> (Vec<usize>, Vec<usize>) {
        let bins = self.binned.feature(split.feature);
        rows.iter()
            .copied()
            .partition(|&i| bins[i] as usize <= split.bin)
    }
}

/// Highest-gain split; on equal gain the earlier candidate is kept.
pub fn pick_best(candidates: Vec<Option<SplitInfo>>) -> Option<SplitInfo> {
    candidates
        .into_iter()
        .flatten()
        .fold(None, |best: Option<SplitInfo>, candidate| match best {
            Some(b) if b.gain >= candidate.gain => Some(b),
            _ => Some(candidate),
        })
}

/// Best "bins <= b go left" cut of one histogram.
pub fn best_bin(hist: &[HistogramBin], total: &HistogramBin, params: &GainParams) -> Option<(usize, f64)> {
    let mut left = HistogramBin::default();
    let mut best: Option<(usize, f64)> = None;

    for (bin, slot) in hist.iter().enumerate().take(hist.len().saturating_sub(1)) {
        left.add(slot);
        if let Some(gain) = params.split_gain(&left, total) {
            if gain > MIN_SPLIT_GAIN && best.map_or(true, |(_, g)| gain > g) {
                best = Some((bin, gain));
            }
        }
    }
    best
}

/// Per-bin gains of one histogram; inadmissible cuts score 0.
pub fn bin_gains(hist: &[HistogramBin], total: &HistogramBin, params: &GainParams) -> Vec<f64> {
    let mut left = HistogramBin::default();
    hist.iter()
        .take(hist.len().saturating_sub(1))
        .map(|slot| {
            left.add(slot);
            params.split_gain(&left, total).unwrap_or(0.0).max(0.0)
        })
        .collect()
}
