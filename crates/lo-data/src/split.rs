//! Reproducible train/test partitioning.

use lo_types::{DataError, LoError, LoResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Smallest number of rows either partition may hold.
pub const MIN_PARTITION_ROWS: usize = 2;

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of held-out rows for `n_rows` and `test_fraction`, rounded up.
pub fn test_size(n_rows: usize, test_fraction: f64) -> usize {
    // The epsilon keeps exact products such as 100 * 0.2 from rounding up to 21.
    ((n_rows as f64 * test_fraction) - 1e-9).ceil().max(0.0) as usize
}

/// Shuffle row indices with a seeded generator and cut off the test rows.
///
/// The same `seed` over the same row count always yields the same partition.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> LoResult<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(LoError::Config(format!(
            "test_fraction must lie in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = test_size(n_rows, test_fraction);
    let n_train = n_rows.saturating_sub(n_test);
    if n_test < MIN_PARTITION_ROWS || n_train < MIN_PARTITION_ROWS {
        return Err(DataError::InsufficientRows {
            rows: n_rows,
            min_per_partition: MIN_PARTITION_ROWS,
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    tracing::debug!(n_rows, n_train, n_test, seed, "partitioned rows");

    Ok(TrainTestSplit {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sizes_follow_fraction() {
        assert_eq!(test_size(100, 0.2), 20);
        assert_eq!(test_size(10, 0.25), 3);
        assert_eq!(test_size(7, 0.5), 4);

        let split = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let split = train_test_split(57, 0.3, 7).unwrap();
        let train: HashSet<_> = split.train.iter().copied().collect();
        let test: HashSet<_> = split.test.iter().copied().collect();

        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 57);
        assert!(train.union(&test).all(|&i| i < 57));
    }

    #[test]
    fn same_seed_same_partition() {
        let a = train_test_split(200, 0.25, 1234).unwrap();
        let b = train_test_split(200, 0.25, 1234).unwrap();
        assert_eq!(a, b);

        let c = train_test_split(200, 0.25, 1235).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn too_few_rows_is_rejected() {
        let err = train_test_split(3, 0.2, 0).unwrap_err();
        assert!(matches!(
            err,
            LoError::Data(DataError::InsufficientRows { rows: 3, .. })
        ));

        assert!(train_test_split(4, 0.5, 0).is_ok());
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        assert!(matches!(
            train_test_split(10, 1.5, 0),
            Err(LoError::Config(_))
        ));
    }
}
