//! File-backed experiment log.
//!
//! Layout under the tracking root:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/meta.json
//! <root>/<experiment_id>/<run_id>/params/<key>
//! <root>/<experiment_id>/<run_id>/metrics/<key>
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! ```

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::error::TrackingError;

use super::run::{ActiveRun, MetricPoint, RunInfo};

/// Contents of an experiment's `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub experiment_id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: OffsetDateTime,
}

/// Root of the experiment log.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Open the tracking directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Id of the experiment called `name`, created if it does not exist.
    pub fn experiment(&self, name: &str) -> Result<String, TrackingError> {
        let experiments = self.experiments()?;

        if let Some(existing) = experiments.iter().find(|e| e.name == name) {
            return Ok(existing.experiment_id.clone());
        }

        let next_id = experiments
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);

        let info = ExperimentInfo {
            experiment_id: next_id.to_string(),
            name: name.to_string(),
            creation_time: OffsetDateTime::now_utc(),
        };

        let dir = self.root.join(&info.experiment_id);
        fs::create_dir_all(&dir)?;
        write_json(&dir.join("meta.json"), &info)?;

        info!(experiment_id = %info.experiment_id, name, "Experiment created");
        Ok(info.experiment_id)
    }

    /// All experiments, ordered by id.
    pub fn experiments(&self) -> Result<Vec<ExperimentInfo>, TrackingError> {
        let mut experiments = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let meta = path.join("meta.json");
            if path.is_dir() && meta.is_file() {
                experiments.push(read_json::<ExperimentInfo>(&meta)?);
            }
        }

        experiments.sort_by_key(|e| e.experiment_id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(experiments)
    }

    /// Begin a run in `experiment_id`.
    pub fn start_run(&self, experiment_id: &str) -> Result<ActiveRun, TrackingError> {
        let dir = self.root.join(experiment_id);
        if !dir.join("meta.json").is_file() {
            return Err(TrackingError::UnknownExperiment(experiment_id.to_string()));
        }

        let run_id = format!("{:032x}", rand::thread_rng().gen::<u128>());
        ActiveRun::create(&dir, experiment_id, run_id)
    }

    /// Committed runs of `experiment_id`, oldest first.
    pub fn runs(&self, experiment_id: &str) -> Result<Vec<RunInfo>, TrackingError> {
        let dir = self.root.join(experiment_id);
        if !dir.is_dir() {
            return Err(TrackingError::UnknownExperiment(experiment_id.to_string()));
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let meta = entry.path().join("meta.json");
            if !hidden && meta.is_file() {
                runs.push(read_json::<RunInfo>(&meta)?);
            }
        }

        runs.sort_by_key(|r| r.start_time);
        Ok(runs)
    }

    /// Logged value of a param, if any.
    pub fn param(&self, run: &RunInfo, key: &str) -> Result<Option<String>, TrackingError> {
        let path = self.run_dir(run).join("params").join(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Full history of a metric.
    pub fn metric_history(&self, run: &RunInfo, key: &str) -> Result<Vec<MetricPoint>, TrackingError> {
        let path = self.run_dir(run).join("metrics").join(key);
        if !path.is_file() {
            return Ok(Vec::new());
        }

        Ok(fs::read_to_string(path)?
            .lines()
            .filter_map(MetricPoint::parse)
            .collect())
    }

    /// Directory holding a committed run's artifacts.
    pub fn artifact_dir(&self, run: &RunInfo) -> PathBuf {
        self.run_dir(run).join("artifacts")
    }

    fn run_dir(&self, run: &RunInfo) -> PathBuf {
        self.root.join(&run.experiment_id).join(&run.run_id)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, TrackingError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TrackingError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ScratchDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn experiment_is_created_once() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();

        let first = store.experiment("iris").unwrap();
        let again = store.experiment("iris").unwrap();
        let other = store.experiment("other").unwrap();

        assert_eq!(first, "0");
        assert_eq!(again, first);
        assert_eq!(other, "1");
        assert_eq!(store.experiments().unwrap().len(), 2);
    }

    #[test]
    fn finished_run_is_listed_with_params_and_metrics() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let exp = store.experiment("iris").unwrap();

        let mut run = store.start_run(&exp).unwrap();
        run.log_param("n_estimators", 100).unwrap();
        run.log_param("learning_rate", 0.1).unwrap();
        run.log_metric("accuracy", 0.9, 0).unwrap();
        let info = run.finish().unwrap();

        assert_eq!(info.run_id.len(), 32);
        assert!(info.run_id.chars().all(|c| c.is_ascii_hexdigit()));

        let runs = store.runs(&exp).unwrap();
        assert_eq!(runs, vec![info.clone()]);
        assert_eq!(store.param(&info, "n_estimators").unwrap().as_deref(), Some("100"));
        assert_eq!(store.param(&info, "learning_rate").unwrap().as_deref(), Some("0.1"));
        assert_eq!(store.param(&info, "missing").unwrap(), None);

        let history = store.metric_history(&info, "accuracy").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 0.9);
    }

    #[test]
    fn dropped_run_leaves_nothing() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let exp = store.experiment("iris").unwrap();

        {
            let mut run = store.start_run(&exp).unwrap();
            run.log_param("n_estimators", 100).unwrap();
        }

        assert!(store.runs(&exp).unwrap().is_empty());
        let leftovers: Vec<_> = fs::read_dir(dir.path().join(&exp))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name != "meta.json")
            .collect();
        assert!(leftovers.is_empty(), "unexpected entries: {leftovers:?}");
    }

    #[test]
    fn duplicate_param_is_rejected() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let exp = store.experiment("iris").unwrap();

        let mut run = store.start_run(&exp).unwrap();
        run.log_param("seed", 42).unwrap();
        assert!(matches!(
            run.log_param("seed", 7),
            Err(TrackingError::DuplicateParam(_))
        ));
    }

    #[test]
    fn artifact_paths_cannot_escape() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let exp = store.experiment("iris").unwrap();

        let mut run = store.start_run(&exp).unwrap();
        assert!(run.log_artifact_json("../../evil.json", &1).is_err());
        assert!(run.log_artifact_json("/abs.json", &1).is_err());
        assert!(run.log_artifact_json("notes/ok.json", &1).is_ok());
    }

    #[test]
    fn unknown_experiment_is_an_error() {
        let dir = ScratchDir::new("store").unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.start_run("17"),
            Err(TrackingError::UnknownExperiment(_))
        ));
    }
}
