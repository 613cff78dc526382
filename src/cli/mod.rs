//! Metrix CLI Module
//!
//! Command-line interface for running EP_success experiments.

use clap::{CommandFactory, Parser};
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::pipeline::{Experiment, ExperimentConfig, FeatureSetOutcome};
use crate::utils::DataLoader;

// ─── Output ────────────────────────────────────────────────────────────────────

/// Width of the key column in the header
const KEY_WIDTH: usize = 8;

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

/// `key` padded to the key column, then the value
fn field(key: &str, val: &str) -> String {
    format!("{} {}", dim(&format!("{:<width$}", key, width = KEY_WIDTH)), val)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
}

/// One timed progress line: `› msg... done detail (1.2s)`
struct Step {
    start: Instant,
}

impl Step {
    fn start(msg: &str) -> Self {
        print!("  {} {}... ", accent("›"), msg);
        let _ = io::stdout().flush();
        Self {
            start: Instant::now(),
        }
    }

    fn finish(self, detail: &str) {
        println!(
            "{} {} {}",
            "done".green(),
            detail,
            dim(&format!("({:.1?})", self.start.elapsed()))
        );
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "metrix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tune, train and report tree classifiers predicting EP_success")]
#[command(long_about = None)]
pub struct Cli {
    /// Sample table (CSV, or TSV by extension)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Root output directory [default: .]
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Feature set to run; repeat for several [default: prot_screen_trans]
    #[arg(short = 'f', long = "feature-set")]
    pub feature_set: Vec<String>,

    /// Estimator (decision-tree, bagged-trees, random-forest)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Search mode (grid, random)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Random-search candidates
    #[arg(long)]
    pub n_iter: Option<usize>,

    /// Cross-validation folds
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Held-out split (plain, stratified)
    #[arg(long)]
    pub split: Option<String>,

    /// Write DOT files without rendering them
    #[arg(long)]
    pub no_render: bool,

    /// Graphviz executable
    #[arg(long)]
    pub dot_program: Option<String>,

    /// JSON experiment configuration; flags given here take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Configuration file (or defaults) with the flags applied on top
    pub fn to_config(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(input) = &self.input {
            config = config.with_input(input);
        }
        if let Some(outdir) = &self.outdir {
            config = config.with_outdir(outdir);
        }
        if !self.feature_set.is_empty() {
            config = config.with_feature_sets(self.feature_set.clone());
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.parse()?);
        }
        if let Some(search) = &self.search {
            config = config.with_search(search.parse()?);
        }
        if let Some(n) = self.n_iter {
            config = config.with_n_iter(n);
        }
        if let Some(k) = self.cv_folds {
            config = config.with_cv_folds(k);
        }
        if let Some(split) = &self.split {
            config = config.with_split(split.parse()?);
        }
        if self.no_render {
            config = config.with_render_trees(false);
        }
        if let Some(program) = &self.dot_program {
            config = config.with_dot_program(program.clone());
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run the experiment described by the command line
pub fn cmd_run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.to_config()?;
    let input = match config.input.clone() {
        Some(input) => input,
        None => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };
    config.validate()?;

    print_header(&config);

    section("Data");
    let step = Step::start("Loading samples");
    let samples = DataLoader::new().load_samples(&input)?;
    step.finish(&format!(
        "{} rows, {} columns",
        samples.n_rows(),
        samples.column_names().len()
    ));

    section("Feature sets");
    let experiment = Experiment::new(config);
    let mut outcomes = Vec::new();
    for set in experiment.config().resolve_feature_sets()? {
        let step = Step::start(&format!("Running {}", set.name.cyan()));
        let outcome = experiment.run_feature_set(&samples, &set)?;
        step.finish(&format!("best cv {:.4}", outcome.best_score));
        outcomes.push(outcome);
    }

    print_results(&outcomes);
    Ok(())
}

fn header_lines(config: &ExperimentConfig) -> Vec<String> {
    vec![
        field("run", &config.run_tag()),
        field("model", &config.model.to_string()),
        field("split", &config.split.to_string()),
        field("sets", &config.feature_sets.join(", ")),
        field("outdir", &config.outdir.display().to_string()),
    ]
}

fn print_header(config: &ExperimentConfig) {
    println!();
    println!("  {} {}", "metrix".white().bold(), dim(env!("CARGO_PKG_VERSION")));
    for line in header_lines(config) {
        println!("  {}", line);
    }
}

/// One row per feature set, columns aligned on the longest name
fn result_rows(outcomes: &[FeatureSetOutcome]) -> Vec<String> {
    let width = outcomes
        .iter()
        .map(|o| o.feature_set.len())
        .max()
        .unwrap_or(0)
        .max("feature set".len());
    let mut rows = vec![format!(
        "{:<width$}  {:>7}  {:>7}  {:>7}  {:>7}",
        "feature set",
        "cv",
        "test",
        "auc",
        "cv auc",
        width = width
    )];
    rows.extend(outcomes.iter().map(|o| {
        format!(
            "{:<width$}  {:>7.4}  {:>7.4}  {:>7.4}  {:>7.4}",
            o.feature_set,
            o.best_score,
            o.test_accuracy,
            o.test_roc_auc,
            o.cv_roc_auc,
            width = width
        )
    }));
    rows
}

fn print_results(outcomes: &[FeatureSetOutcome]) {
    section("Results");
    let rows = result_rows(outcomes);
    if let Some((head, body)) = rows.split_first() {
        println!("  {}", dim(head));
        for (row, outcome) in body.iter().zip(outcomes) {
            println!("  {}", row);
            println!("  {}", dim(&format!("  {}", outcome.report_path.display())));
        }
    }
    println!();
}
