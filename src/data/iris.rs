//! The iris flower dataset, embedded at compile time.

use crate::error::DataError;

use super::dataset::{Builder, Dataset};

const IRIS_CSV: &str = include_str!("iris.csv");

/// Feature names, in column order.
pub const FEATURE_NAMES: [&str; 4] = ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Class names, indexed by label.
pub const CLASS_NAMES: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Load the 150-row iris dataset.
pub fn load_iris() -> Result<Dataset, DataError> {
    parse_csv(IRIS_CSV)
}

/// Parse `f1,...,fn,label` lines. The first line is a header and is skipped.
pub fn parse_csv(input: &str) -> Result<Dataset, DataError> {
    let mut builder = Builder::new();

    for (i, line) in input.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let (label, features) = match fields.split_last() {
            Some((label, features)) if !features.is_empty() => (label, features),
            _ => {
                return Err(DataError::Parse {
                    line: i + 1,
                    reason: "expected at least one feature and a label".to_string(),
                })
            }
        };

        let x = features
            .iter()
            .map(|f| {
                f.parse::<f64>().map_err(|e| DataError::Parse {
                    line: i + 1,
                    reason: format!("bad feature {f:?}: {e}"),
                })
            })
            .collect::<Result<Vec<f64>, DataError>>()?;

        let y = label.parse::<u32>().map_err(|e| DataError::Parse {
            line: i + 1,
            reason: format!("bad label {label:?}: {e}"),
        })?;

        builder.add(&x, y)?;
    }

    builder.build()
}
