//! Row-major labelled dataset with a seeded train/test split.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::DataError;

/// Feature rows and their class labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    rows: Vec<Vec<f64>>,
    targets: Vec<u32>,
    n_features: usize,
}

impl Dataset {
    /// Feature rows in insertion order.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Class label of every row.
    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    /// Number of rows.
    pub fn rows_len(&self) -> usize {
        self.rows.len()
    }

    /// Number of features per row.
    pub fn features_len(&self) -> usize {
        self.n_features
    }

    /// Sorted, deduplicated class labels.
    pub fn classes(&self) -> Vec<u32> {
        let mut classes = self.targets.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Shuffle rows with a seeded RNG and cut off `round(n * test_size)` of them
    /// as the test partition. Returns `(train, test)`.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Dataset, Dataset), DataError> {
        let rows = self.rows_len();
        let test_num = (rows as f64 * test_size).round() as usize;

        if !(test_size > 0.0 && test_size < 1.0) || test_num == 0 || test_num >= rows {
            return Err(DataError::InvalidSplit { test_size, rows });
        }

        let mut index: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        index.shuffle(&mut rng);

        let (test_index, train_index) = index.split_at(test_num);

        Ok((self.select(train_index), self.select(test_index)))
    }

    fn select(&self, index: &[usize]) -> Dataset {
        Dataset {
            rows: index.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: index.iter().map(|&i| self.targets[i]).collect(),
            n_features: self.n_features,
        }
    }
}

/// Accumulates rows and checks that they all have the same width.
#[derive(Debug, Default)]
pub struct Builder {
    rows: Vec<Vec<f64>>,
    targets: Vec<u32>,
}

impl Builder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one labelled row.
    pub fn add(&mut self, x: &[f64], y: u32) -> Result<(), DataError> {
        if let Some(first) = self.rows.first() {
            if first.len() != x.len() {
                return Err(DataError::RaggedRow {
                    row: self.rows.len(),
                    expected: first.len(),
                    actual: x.len(),
                });
            }
        }

        self.rows.push(x.to_vec());
        self.targets.push(y);

        Ok(())
    }

    /// Finish the dataset.
    pub fn build(self) -> Result<Dataset, DataError> {
        let n_features = match self.rows.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => return Err(DataError::Empty),
        };

        Ok(Dataset {
            rows: self.rows,
            targets: self.targets,
            n_features,
        })
    }
}
