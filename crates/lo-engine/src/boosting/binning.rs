//! Feature quantization into histogram bins.

use crate::encoding::FeatureMatrix;

/// Per-feature split thresholds learnt from the fit rows.
///
/// A finite value `v` falls in bin `b` when `thresholds[b - 1] < v <= thresholds[b]`.
/// NaN always falls in bin 0, so it follows the left branch of every split.
#[derive(Debug, Clone)]
pub struct BinMapper {
    thresholds: Vec<Vec<f64>>,
}

impl BinMapper {
    /// Place at most `max_thresholds` cut points per feature at midpoints between
    /// distinct values, spread evenly over the sorted distinct values.
    pub fn fit(x: &FeatureMatrix, rows: &[usize], max_thresholds: usize) -> Self {
        let max_thresholds = max_thresholds.max(1);
        let thresholds = (0..x.n_features())
            .map(|f| {
                let column = x.column(f);
                let mut distinct: Vec<f64> = rows
                    .iter()
                    .map(|&i| column[i])
                    .filter(|v| v.is_finite())
                    .collect();
                distinct.sort_by(f64::total_cmp);
                distinct.dedup();

                if distinct.len() < 2 {
                    return Vec::new();
                }

                let n_cuts = distinct.len() - 1;
                let mut cuts: Vec<f64> = if n_cuts <= max_thresholds {
                    distinct.windows(2).map(|w| midpoint(w[0], w[1])).collect()
                } else {
                    (1..=max_thresholds)
                        .map(|k| {
                            let upper = (k * distinct.len() / (max_thresholds + 1)).max(1);
                            midpoint(distinct[upper - 1], distinct[upper])
                        })
                        .collect()
                };
                cuts.dedup();
                cuts
            })
            .collect();

        Self { thresholds }
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    /// Split threshold for "bins `<= bin` go left".
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.thresholds[feature][bin]
    }

    pub fn bin(&self, feature: usize, value: f64) -> u16 {
        if value.is_nan() {
            return 0;
        }
        self.thresholds[feature].partition_point(|&t| t < value) as u16
    }

    /// Bin every row of `x`, column-major.
    pub fn transform(&self, x: &FeatureMatrix) -> BinnedMatrix {
        BinnedMatrix {
            bins: (0..x.n_features())
                .map(|f| x.column(f).iter().map(|&v| self.bin(f, v)).collect())
                .collect(),
        }
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

/// Bin indices, `bins[feature][row]`.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub fn feature(&self, feature: usize) -> &[u16] {
        &self.bins[feature]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: Vec<f64>) -> FeatureMatrix {
        let n = values.len();
        FeatureMatrix::new(vec!["x".into()], vec![values], n).unwrap()
    }

    #[test]
    fn few_distinct_values_get_exact_midpoints() {
        let x = matrix(vec![3.0, 1.0, 2.0, 2.0, f64::NAN]);
        let mapper = BinMapper::fit(&x, &[0, 1, 2, 3, 4], 16);

        assert_eq!(mapper.n_bins(0), 3);
        assert_eq!(mapper.threshold(0, 0), 1.5);
        assert_eq!(mapper.threshold(0, 1), 2.5);

        assert_eq!(mapper.bin(0, 1.0), 0);
        assert_eq!(mapper.bin(0, 1.5), 0);
        assert_eq!(mapper.bin(0, 2.0), 1);
        assert_eq!(mapper.bin(0, 9.0), 2);
        assert_eq!(mapper.bin(0, f64::NAN), 0);
    }

    #[test]
    fn many_values_are_capped() {
        let x = matrix((0..1000).map(f64::from).collect());
        let rows: Vec<usize> = (0..1000).collect();
        let mapper = BinMapper::fit(&x, &rows, 31);

        assert!(mapper.n_bins(0) <= 32);
        let binned = mapper.transform(&x);
        let bins = binned.feature(0);
        assert!(bins.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(bins[0], 0);
        assert_eq!(bins[999] as usize, mapper.n_bins(0) - 1);
    }

    #[test]
    fn constant_feature_has_one_bin() {
        let x = matrix(vec![4.0; 6]);
        let mapper = BinMapper::fit(&x, &[0, 1, 2, 3, 4, 5], 8);
        assert_eq!(mapper.n_bins(0), 1);
        assert_eq!(mapper.bin(0, 100.0), 0);
    }
}
