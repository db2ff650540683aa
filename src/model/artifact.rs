//! Persisting fitted models.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::ModelError;

use super::gbdt::GradientBoostingClassifier;

/// Write `model` to `path` as JSON, creating parent directories.
pub fn save(path: &Path, model: &GradientBoostingClassifier) -> Result<(), ModelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, model)?;
    writer.flush()?;

    info!(path = %path.display(), "Model artifact saved");
    Ok(())
}

/// Read a model written by [`save`].
///
/// The model is checked with [`GradientBoostingClassifier::validate`], so a
/// loaded model never fails on a row of the right width.
pub fn load(path: &Path) -> Result<GradientBoostingClassifier, ModelError> {
    debug!(path = %path.display(), "Loading model artifact");

    let reader = BufReader::new(File::open(path)?);
    let model: GradientBoostingClassifier = serde_json::from_reader(reader)?;
    model.validate()?;

    Ok(model)
}
