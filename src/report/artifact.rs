//! Persisted model artifacts

use crate::error::{MetrixError, Result};
use crate::training::{Classifier, ModelParams, TrainedModel};
use chrono::{DateTime, Local};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Timestamp suffix of artifact file names
pub const ARTIFACT_TIME_FORMAT: &str = "%Y%m%d_%H%M";

/// A fitted model together with what is needed to reuse it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// RFC 3339 creation time
    pub created_at: String,
    pub feature_set: String,
    /// Column order the model expects
    pub feature_names: Vec<String>,
    pub params: ModelParams,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(
        feature_set: impl Into<String>,
        feature_names: Vec<String>,
        params: ModelParams,
        model: TrainedModel,
    ) -> Self {
        Self {
            created_at: Local::now().to_rfc3339(),
            feature_set: feature_set.into(),
            feature_names,
            params,
            model,
        }
    }

    /// `best_<tag>_<feature_set><YYYYmmdd_HHMM>.json`
    pub fn file_name(tag: &str, feature_set: &str, at: &DateTime<Local>) -> String {
        format!(
            "best_{}_{}{}.json",
            tag,
            feature_set,
            at.format(ARTIFACT_TIME_FORMAT)
        )
    }

    /// Write to `dir` and return the file path
    pub fn save(&self, dir: &Path, tag: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(tag, &self.feature_set, &Local::now()));
        let json = serde_json::to_string(self)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "Saved model artifact");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            MetrixError::SerializationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Reload from `path` and require identical probabilities on `x`
    pub fn verify_reload(&self, path: &Path, x: &Array2<f64>) -> Result<()> {
        let reloaded = Self::load(path)?;
        if reloaded.feature_names != self.feature_names {
            return Err(MetrixError::SerializationError(
                "reloaded artifact has different feature names".to_string(),
            ));
        }
        let expected = self.model.predict_proba(x)?;
        let actual = reloaded.model.predict_proba(x)?;
        if expected != actual {
            return Err(MetrixError::SerializationError(format!(
                "reloaded model from {} predicts differently",
                path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{TreeParams, ESTIMATOR_SEED};
    use chrono::TimeZone;
    use ndarray::array;

    #[test]
    fn test_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(
            ModelArtifact::file_name("decisiontree_gridsearch", "prot_screen_trans", &at),
            "best_decisiontree_gridsearch_prot_screen_trans20240307_0905.json"
        );
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let x = array![[0.1, 5.0], [0.2, 3.0], [0.9, 1.0], [0.8, 2.0], [0.3, 4.0], [0.7, 0.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let params = ModelParams::BaggedTrees {
            base: TreeParams::default().with_max_depth(2),
            n_estimators: 5,
        };
        let mut model = params.build(ESTIMATOR_SEED).unwrap();
        model.fit(&x, &y).unwrap();

        let artifact = ModelArtifact::new("t", vec!["a".into(), "b".into()], params, model);
        let dir = tempfile::tempdir().unwrap();
        let path = artifact.save(dir.path(), "decisiontree_bag_gridsearch").unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().starts_with("best_decisiontree_bag_gridsearch_t"));
        artifact.verify_reload(&path, &x).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.params, artifact.params);
        assert_eq!(loaded.model.estimators().len(), 5);
    }
}
