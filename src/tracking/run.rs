//! A single training run being recorded.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::TrackingError;
use crate::model::{artifact, GradientBoostingClassifier};

/// Terminal state of a committed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run completed and was committed.
    Finished,
}

/// Contents of a run's `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// 32 lowercase hex characters.
    pub run_id: String,
    /// Owning experiment.
    pub experiment_id: String,
    /// Run status.
    pub status: RunStatus,
    /// When the run started.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// When the run was committed.
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    /// Artifact directory, relative to the tracking root.
    pub artifact_uri: String,
}

/// One point of a metric history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Logged value.
    pub value: f64,
    /// Step index.
    pub step: u64,
}

impl MetricPoint {
    /// Parse a `<timestamp_ms> <value> <step>` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let timestamp_ms = parts.next()?.parse().ok()?;
        let value = parts.next()?.parse().ok()?;
        let step = parts.next()?.parse().ok()?;
        Some(Self {
            timestamp_ms,
            value,
            step,
        })
    }
}

/// A run that is still being written.
///
/// Everything goes into a hidden staging directory; [`ActiveRun::finish`]
/// renames it into place. Dropping an unfinished run deletes the staging
/// directory, so aborted runs leave nothing behind.
#[derive(Debug)]
pub struct ActiveRun {
    run_id: String,
    experiment_id: String,
    staging: PathBuf,
    target: PathBuf,
    start_time: OffsetDateTime,
    params: BTreeSet<String>,
    committed: bool,
}

impl ActiveRun {
    pub(super) fn create(
        experiment_dir: &Path,
        experiment_id: &str,
        run_id: String,
    ) -> Result<Self, TrackingError> {
        let staging = experiment_dir.join(format!(".{run_id}.staging"));
        let target = experiment_dir.join(&run_id);

        for sub in ["params", "metrics", "artifacts"] {
            fs::create_dir_all(staging.join(sub))?;
        }

        debug!(run_id = %run_id, staging = %staging.display(), "Run started");

        Ok(Self {
            run_id,
            experiment_id: experiment_id.to_string(),
            staging,
            target,
            start_time: OffsetDateTime::now_utc(),
            params: BTreeSet::new(),
            committed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Record a hyperparameter. Each key may be logged once per run.
    pub fn log_param(&mut self, key: &str, value: impl Display) -> Result<(), TrackingError> {
        check_key(key)?;

        if !self.params.insert(key.to_string()) {
            return Err(TrackingError::DuplicateParam(key.to_string()));
        }

        fs::write(self.staging.join("params").join(key), value.to_string())?;
        Ok(())
    }

    /// Append a metric value at `step`.
    pub fn log_metric(&mut self, key: &str, value: f64, step: u64) -> Result<(), TrackingError> {
        check_key(key)?;

        let timestamp_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.staging.join("metrics").join(key))?;
        writeln!(file, "{timestamp_ms} {value} {step}")?;

        Ok(())
    }

    /// Write `value` as JSON to `artifacts/<rel_path>`.
    pub fn log_artifact_json<T: Serialize + ?Sized>(
        &mut self,
        rel_path: &str,
        value: &T,
    ) -> Result<(), TrackingError> {
        let path = self.artifact_path(rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;

        Ok(())
    }

    /// Store the fitted model under `artifacts/<name>/` with an input example.
    pub fn log_model(
        &mut self,
        name: &str,
        model: &GradientBoostingClassifier,
        input_example: &[Vec<f64>],
    ) -> Result<(), TrackingError> {
        check_key(name)?;

        let model_path = self.artifact_path(&format!("{name}/model.json"))?;
        artifact::save(&model_path, model)?;

        self.log_artifact_json(
            &format!("{name}/input_example.json"),
            &serde_json::json!({ "inputs": input_example }),
        )
    }

    /// Write `meta.json` and move the run into place.
    pub fn finish(mut self) -> Result<RunInfo, TrackingError> {
        let experiment_dir = self.target.parent().map(Path::to_path_buf).unwrap_or_default();
        let info = RunInfo {
            run_id: self.run_id.clone(),
            experiment_id: self.experiment_id.clone(),
            status: RunStatus::Finished,
            start_time: self.start_time,
            end_time: OffsetDateTime::now_utc(),
            artifact_uri: format!("{}/{}/artifacts", self.experiment_id, self.run_id),
        };

        let mut writer = BufWriter::new(File::create(self.staging.join("meta.json"))?);
        serde_json::to_writer_pretty(&mut writer, &info)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&self.staging, &self.target)?;
        self.committed = true;

        info!(
            run_id = %info.run_id,
            experiment_id = %info.experiment_id,
            dir = %experiment_dir.display(),
            "Run committed"
        );

        Ok(info)
    }

    fn artifact_path(&self, rel_path: &str) -> Result<PathBuf, TrackingError> {
        let rel = Path::new(rel_path);
        let safe = !rel_path.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(TrackingError::InvalidKey(rel_path.to_string()));
        }

        Ok(self.staging.join("artifacts").join(rel))
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        warn!(run_id = %self.run_id, "Run dropped before finish, discarding");
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            warn!(run_id = %self.run_id, error = %e, "Failed to remove staging directory");
        }
    }
}

fn check_key(key: &str) -> Result<(), TrackingError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(TrackingError::InvalidKey(key.to_string()))
    }
}
