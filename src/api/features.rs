//! Decoding the `features` field of a prediction request.

use serde_json::Value;

use crate::error::PredictError;

/// Parse a `{"features": ...}` body into a batch of rows.
///
/// A flat list of numbers is one row; a list of lists is a batch. Only the
/// JSON types are checked here; row width is the model's concern.
pub fn parse_request(body: &[u8]) -> Result<Vec<Vec<f64>>, PredictError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PredictError::MalformedInput(format!("invalid JSON body: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| malformed("request body must be a JSON object"))?;

    let features = object
        .get("features")
        .ok_or_else(|| malformed("missing field `features`"))?;

    parse_features(features)
}

/// Normalize a `features` value into rows.
pub fn parse_features(features: &Value) -> Result<Vec<Vec<f64>>, PredictError> {
    let items = features
        .as_array()
        .ok_or_else(|| malformed("`features` must be a list"))?;

    match items.first() {
        None => Err(malformed("`features` must not be empty")),
        Some(Value::Array(_)) => items
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row = row
                    .as_array()
                    .ok_or_else(|| malformed(&format!("features[{i}] must be a list")))?;
                parse_row(row, &format!("features[{i}]"))
            })
            .collect(),
        Some(_) => Ok(vec![parse_row(items, "features")?]),
    }
}

fn parse_row(values: &[Value], path: &str) -> Result<Vec<f64>, PredictError> {
    values
        .iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .ok_or_else(|| malformed(&format!("{path}[{j}] is not a number: {v}")))
        })
        .collect()
}

fn malformed(message: &str) -> PredictError {
    PredictError::MalformedInput(message.to_string())
}
