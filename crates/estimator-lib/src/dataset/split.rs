//! Seeded train/validation/test partitioning
//!
//! Two sequential shuffled splits: the full set is cut into train and a
//! holdout, then the holdout is cut in half into validation and test. Both
//! cuts draw their permutation from a generator seeded with the same seed,
//! so identical inputs always produce identical partitions.

use super::DatasetError;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Share of all rows held out from training
pub const HOLDOUT_FRACTION: f64 = 0.3;

/// Share of the holdout that becomes the test partition
pub const TEST_SHARE_OF_HOLDOUT: f64 = 0.5;

/// Row positions of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `items` with `seed` and cut off `ceil(test_fraction * n)` of
/// them as the test side. Returns `(train, test)`.
pub fn train_test_split<T: Clone>(items: &[T], test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let test = permutation[..n_test].iter().map(|&i| items[i].clone()).collect();
    let train = permutation[n_test..].iter().map(|&i| items[i].clone()).collect();
    (train, test)
}

/// 70/15/15 split of `0..n`
pub fn three_way_split(n: usize, seed: u64) -> Result<SplitIndices, DatasetError> {
    let rows: Vec<usize> = (0..n).collect();
    let (train, holdout) = train_test_split(&rows, HOLDOUT_FRACTION, seed);
    let (validation, test) = train_test_split(&holdout, TEST_SHARE_OF_HOLDOUT, seed);

    if train.is_empty() || validation.is_empty() || test.is_empty() {
        return Err(DatasetError::InsufficientRows { rows: n });
    }

    Ok(SplitIndices {
        train,
        validation,
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes() {
        let split = three_way_split(100, 42).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.validation.len(), 15);
        assert_eq!(split.test.len(), 15);
    }

    #[test]
    fn test_split_is_a_partition() {
        let split = three_way_split(57, 7).unwrap();
        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.validation)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..57).collect::<Vec<_>>());

        let train: HashSet<_> = split.train.iter().collect();
        assert!(split.test.iter().all(|i| !train.contains(i)));
    }

    #[test]
    fn test_split_is_reproducible() {
        assert_eq!(three_way_split(200, 42).unwrap(), three_way_split(200, 42).unwrap());
        assert_ne!(three_way_split(200, 42).unwrap(), three_way_split(200, 43).unwrap());
    }

    #[test]
    fn test_minimum_rows() {
        let split = three_way_split(4, 42).unwrap();
        assert_eq!(split.train.len(), 2);
        assert_eq!(split.validation.len(), 1);
        assert_eq!(split.test.len(), 1);

        assert!(matches!(
            three_way_split(3, 42),
            Err(DatasetError::InsufficientRows { rows: 3 })
        ));
        assert!(three_way_split(0, 42).is_err());
    }

    #[test]
    fn test_train_test_split_rounds_test_up() {
        let items: Vec<u32> = (0..10).collect();
        let (train, test) = train_test_split(&items, 0.25, 1);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);
    }
}
