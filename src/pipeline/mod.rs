//! End-to-end experiment
//!
//! For each requested feature set: derive features, split, tune, refit the
//! winner, evaluate it on the held-out split and through out-of-fold
//! predictions, then write the report, charts, tree diagrams and the model
//! artifact into the feature set's own directory.

mod config;
mod evaluation;

pub use config::{ExperimentConfig, DEFAULT_FEATURE_SET};
pub use evaluation::{
    format_ranked, ranked_importances, scoring_folds, write_confusion_section, write_scoring_lines,
    write_threshold_section, ImportanceSpread, View, ViewEvaluation, EVALUATION_THRESHOLDS,
};

use crate::error::{MetrixError, Result};
use crate::feature_engineering::{derive_features, FeatureSet};
use crate::metrics::PredictionStats;
use crate::optimizer::{scoring_params, BestParams, ParamPoint, Tuner};
use crate::report::{
    charts, render_png, DotExporter, ModelArtifact, ReportLog, ARTIFACT_TIME_FORMAT,
};
use crate::training::{
    cross_val_predict, cross_validate, CVResults, Classifier, CrossValidator, ModelParams,
    Scoring, Splitter, ESTIMATOR_SEED,
};
use crate::utils::{DataLoader, SampleTable};
use chrono::Local;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Upper bound on folds when scoring the final model on the test split
pub const TEST_SCORING_FOLDS: usize = 5;

/// What one feature-set run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSetOutcome {
    pub feature_set: String,
    pub output_dir: PathBuf,
    pub report_path: PathBuf,
    pub artifact_path: PathBuf,
    pub best_point: ParamPoint,
    pub best_score: f64,
    pub params: ModelParams,
    /// Importances of the best candidate as the tuner scored it
    pub best_importances: Vec<f64>,
    /// Importances across the members of the final model
    pub importance_spread: ImportanceSpread,
    pub test_accuracy: f64,
    pub cv_accuracy: f64,
    pub test_roc_auc: f64,
    pub cv_roc_auc: f64,
    pub dot_files: Vec<PathBuf>,
    pub png_files: Vec<PathBuf>,
}

/// Result of a whole invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub outcomes: Vec<FeatureSetOutcome>,
    pub total_duration_secs: f64,
}

/// Runs the configured feature sets one after another
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Load the input table and run every feature set
    pub fn run(&self) -> Result<ExperimentSummary> {
        self.config.validate()?;
        let input = self
            .config
            .input
            .as_deref()
            .ok_or_else(|| MetrixError::ConfigError("no input file given".to_string()))?;
        let samples = DataLoader::new().load_samples(input)?;
        self.run_samples(&samples)
    }

    /// Run every feature set on an already loaded table
    pub fn run_samples(&self, samples: &SampleTable) -> Result<ExperimentSummary> {
        self.config.validate()?;
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(self.config.feature_sets.len());
        for set in self.config.resolve_feature_sets()? {
            outcomes.push(self.run_feature_set(samples, &set)?);
        }
        Ok(ExperimentSummary {
            outcomes,
            total_duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Deriver, splitter, tuner, trainer and reporter for one feature set
    pub fn run_feature_set(&self, samples: &SampleTable, set: &FeatureSet) -> Result<FeatureSetOutcome> {
        let config = &self.config;
        let dir = config.feature_set_dir(&set.name);
        let log = ReportLog::open(&dir, &config.report_file_name())?;
        let datestring = Local::now().format(ARTIFACT_TIME_FORMAT).to_string();
        let tag = config.run_tag();
        info!(feature_set = %set.name, dir = %dir.display(), "Running feature set");

        log.section(&format!("{} for feature set {}", tag, set.name))?;
        log.kv("Started", Local::now().to_rfc3339())?;

        // derive and split
        let features = derive_features(samples, set)?;
        let y = samples.labels()?;
        let split = Splitter::new(config.split).split(&features, &y)?;
        let x_train = split.x_train().data();
        let x_test = split.x_test().data();
        let y_train = split.y_train();
        let y_test = split.y_test();
        let names = features.names().to_vec();

        log.kv("Samples", features.n_rows())?;
        log.kv("Features", format!("{:?}", names))?;
        log.kv("Split", config.split)?;
        log.kv("Training rows", split.x_train().n_rows())?;
        log.kv("Test rows", split.x_test().n_rows())?;

        // tune
        let tuner_config = config.tuner_config();
        let space = config.search_space();
        log.section("Hyperparameter search")?;
        log.kv("Search mode", config.search)?;
        log.kv("Parameter space", serde_json::to_string(&space)?)?;
        log.kv(
            "Cross-validation",
            format!("cv={}, scoring=accuracy", tuner_config.cv_folds),
        )?;
        let cv_folds = tuner_config.cv_folds;
        let default_n_estimators = tuner_config.default_n_estimators;
        let tuner = Tuner::new(config.model, space, tuner_config);
        let best = tuner.tune(x_train, y_train)?;
        log.kv("Candidates evaluated", best.n_candidates)?;
        log.kv("Best parameters", &best.point)?;
        log.kv("Best score", best.mean_score)?;

        // best candidate as scored, refit on the whole training split
        let scored = scoring_params(config.model, &best.point, default_n_estimators)?;
        let mut best_estimator = scored.build(ESTIMATOR_SEED)?;
        best_estimator.fit(x_train, y_train)?;
        let best_importances = best_estimator.feature_importances()?.to_vec();
        let ranked = ranked_importances(&names, &best_importances);
        log.kv("Best estimator", scored.describe())?;
        log.kv("Feature importances", format_ranked(&ranked))?;
        let (sorted_names, sorted_values): (Vec<String>, Vec<f64>) =
            ranked.iter().map(|(v, n)| (n.clone(), *v)).unzip();
        charts::importance_bars(
            &dir.join(format!("feature_importances_best_bar_plot_{}_{}{}.svg", tag, set.name, datestring)),
            &format!("Feature importances of the best {} using features {}", config.model, set.name),
            &sorted_names,
            &sorted_values,
            None,
        )?;

        // final model
        let model = if scored == best.params {
            best_estimator
        } else {
            let mut model = best.params.build(ESTIMATOR_SEED)?;
            model.fit(x_train, y_train)?;
            model
        };
        log.section("Final model")?;
        log.kv("Model", best.params.describe())?;
        let trees = model.estimators();
        let spread = ImportanceSpread::from_estimators(&trees)?;
        log.line(&format!(
            "Overall feature importances (mean and std across {} estimators):",
            spread.n_estimators
        ))?;
        for ((name, mean), std) in names.iter().zip(&spread.means).zip(&spread.stds) {
            log.line(&format!("  {}: {:.6} +/- {:.6}", name, mean, std))?;
        }
        charts::importance_bars(
            &dir.join(format!("feature_importances_overall_bar_plot_{}_{}{}.svg", tag, set.name, datestring)),
            &format!("Overall feature importances for {} using features {}", config.model, set.name),
            &names,
            &spread.means,
            Some(&spread.stds),
        )?;

        // persist and check the round trip
        let artifact = ModelArtifact::new(&set.name, names.clone(), best.params.clone(), model);
        let artifact_path = artifact.save(&dir, &tag)?;
        artifact.verify_reload(&artifact_path, x_test)?;
        log.kv("Saved model", artifact_path.display())?;

        // tree diagrams
        let (dot_files, png_files) = self.write_trees(&artifact, &dir, &tag, &set.name, &datestring)?;
        log.kv("Tree diagrams", dot_files.len())?;

        // cross-validated summary on the training split
        let splits = CrossValidator::stratified(cv_folds).split(x_train.nrows(), Some(y_train))?;
        let summary = cross_validate(&best.params, x_train, y_train, &splits, &Scoring::SUMMARY)?;
        self.write_cv_summary(&log, &summary, cv_folds)?;
        self.write_scoring_summary(&log, x_test, y_test, &best.params, &summary)?;

        // held-out and out-of-fold views
        let model = &artifact.model;
        let test_proba = model.predict_proba(x_test)?;
        let test_pred = model.predict(x_test)?;
        let (cv_pred, cv_proba) = cross_val_predict(&best.params, x_train, y_train, &splits)?;

        let stats = PredictionStats::compute(y_test, &test_pred)?;
        log.section("Prediction stats")?;
        log.kv("Accuracy test", stats.accuracy)?;
        log.kv("Class distribution y_test", format!("0: {}, 1: {}", stats.n_zeros, stats.n_ones))?;
        log.kv("Percent 1s", stats.fraction_ones)?;
        log.kv("Percent 0s", stats.fraction_zeros)?;
        log.kv("Null accuracy", stats.null_accuracy)?;

        let test_view = ViewEvaluation::new(View::Test, y_test.clone(), test_pred, test_proba)?;
        let cv_view = ViewEvaluation::new(View::CrossValidated, y_train.clone(), cv_pred, cv_proba)?;
        write_confusion_section(&log, &[&test_view, &cv_view])?;
        for v in [&test_view, &cv_view] {
            let c = &v.confusion;
            info!(view = v.view.label(), tp = c.tp, tn = c.tn, fp = c.fp, fn_ = c.fn_, "Confusion counts");
        }

        self.write_probability_outputs(&log, &dir, &datestring, &set.name, &[&test_view, &cv_view])?;
        log.kv("AUC for test set class 1", test_view.roc_auc)?;
        log.kv("AUC for test set class 0", test_view.roc_auc_negative)?;
        log.kv("AUC for CV train set class 1", cv_view.roc_auc)?;
        log.kv("AUC for CV train set class 0", cv_view.roc_auc_negative)?;
        write_threshold_section(&log, &[&test_view, &cv_view])?;

        info!(
            feature_set = %set.name,
            test_accuracy = test_view.manual.accuracy,
            cv_accuracy = cv_view.manual.accuracy,
            test_auc = test_view.roc_auc,
            "Feature set finished"
        );

        let BestParams {
            point,
            params,
            mean_score,
            ..
        } = best;
        Ok(FeatureSetOutcome {
            feature_set: set.name.clone(),
            output_dir: dir,
            report_path: log.path().to_path_buf(),
            artifact_path,
            best_point: point,
            best_score: mean_score,
            params,
            best_importances,
            importance_spread: spread,
            test_accuracy: test_view.manual.accuracy,
            cv_accuracy: cv_view.manual.accuracy,
            test_roc_auc: test_view.roc_auc,
            cv_roc_auc: cv_view.roc_auc,
            dot_files,
            png_files,
        })
    }

    /// One DOT file per tree, rendered to PNG unless disabled
    fn write_trees(
        &self,
        artifact: &ModelArtifact,
        dir: &Path,
        tag: &str,
        feature_set: &str,
        datestring: &str,
    ) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let exporter = DotExporter::new(artifact.feature_names.clone());
        let mut dots = Vec::new();
        let mut pngs = Vec::new();
        for (i, tree) in artifact.model.estimators().into_iter().enumerate() {
            let stem = format!("tree_{}_{}{}{}", tag, feature_set, datestring, i);
            let dot = dir.join(format!("{}.dot", stem));
            exporter.export(tree, &dot)?;
            if self.config.render_trees {
                let png = dir.join(format!("{}.png", stem));
                render_png(&self.config.dot_program, &dot, &png)?;
                pngs.push(png);
            }
            dots.push(dot);
        }
        if !self.config.render_trees {
            warn!(trees = dots.len(), "Tree rendering disabled, wrote DOT files only");
        }
        Ok((dots, pngs))
    }

    fn write_cv_summary(
        &self,
        log: &ReportLog,
        summary: &[(Scoring, CVResults)],
        k: usize,
    ) -> Result<()> {
        log.section("Cross-validated scores of the final parameters")?;
        for (scoring, cv) in summary {
            match scoring {
                Scoring::Accuracy => {
                    log.kv(&format!("Accuracy for each of {} CV folds", k), format!("{:?}", cv.scores))?;
                    log.kv(&format!("Mean accuracy over all {} CV folds", k), cv.mean_score)?;
                }
                Scoring::RocAuc => log.kv(&format!("ROC_AUC mean for {}-fold CV", k), cv.mean_score)?,
                Scoring::Recall => log.kv(&format!("Recall mean for {}-fold CV", k), cv.mean_score)?,
                Scoring::Precision => {
                    log.kv(&format!("Precision mean for {}-fold CV", k), cv.mean_score)?
                }
                Scoring::F1 => log.kv(&format!("F1 mean for {}-fold CV", k), cv.mean_score)?,
            }
        }
        Ok(())
    }

    /// Mean fold scores of the final parameters on the test split and on train_CV
    fn write_scoring_summary(
        &self,
        log: &ReportLog,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        params: &ModelParams,
        train_summary: &[(Scoring, CVResults)],
    ) -> Result<()> {
        log.section("Scoring summary")?;
        match scoring_folds(y_test, TEST_SCORING_FOLDS) {
            Some(k) => {
                let splits = CrossValidator::stratified(k).split(x_test.nrows(), Some(y_test))?;
                let test_summary = cross_validate(params, x_test, y_test, &splits, &Scoring::SUMMARY)?;
                log.kv("Folds on test", k)?;
                write_scoring_lines(log, "test", &test_summary)?;
            }
            None => {
                warn!(rows = y_test.len(), "Too few members per class to score the test split");
                log.line("Scores for test: skipped, a class has fewer than 2 members")?;
            }
        }
        write_scoring_lines(log, "train_CV", train_summary)
    }

    /// Histograms, precision-recall and ROC charts for each view
    fn write_probability_outputs(
        &self,
        log: &ReportLog,
        dir: &Path,
        datestring: &str,
        feature_set: &str,
        views: &[&ViewEvaluation],
    ) -> Result<()> {
        log.section("Probabilities and curves")?;
        let tag = self.config.run_tag();
        for v in views {
            let name = v.view.file_tag();
            let file = |kind: &str, suffix: &str| {
                dir.join(format!("{}_{}_{}{}{}.svg", kind, tag, name, datestring, suffix))
            };

            charts::confusion_heatmap(
                &file("confusion_matrix", ""),
                &format!("Confusion matrix {} ({})", v.view.label(), feature_set),
                &v.confusion,
            )?;

            let hist = file("hist_pred_proba", "");
            charts::probability_hist(
                &hist,
                &format!("Predicted probabilities of class 1, {}", v.view.label()),
                &v.positive_scores(),
            )?;
            log.kv(&format!("Histogram {}", v.view.label()), hist.display())?;

            for (class, pr) in [("1", v.precision_recall()?), ("0", v.precision_recall_negative()?)] {
                let pr_path = file("precision_recall", class);
                charts::precision_recall_vs_threshold(
                    &pr_path,
                    &format!("Precision and recall for class {} using the {} set", class, v.view.label()),
                    &pr,
                )?;
                log.kv(&format!("Precision-recall {} class {}", v.view.label(), class), pr_path.display())?;
            }

            for (class, curve) in [("1", v.roc_positive()?), ("0", v.roc_negative()?)] {
                let path = file("roc_curve", class);
                charts::roc_chart(
                    &path,
                    &format!("ROC curve for class {} using the {} set", class, v.view.label()),
                    &curve,
                )?;
                log.kv(&format!("ROC curve {} class {}", v.view.label(), class), path.display())?;
            }
        }
        Ok(())
    }
}

/// Convenience wrapper for a single invocation
pub fn run_experiment(config: ExperimentConfig) -> Result<ExperimentSummary> {
    Experiment::new(config).run()
}
