//! SVG charts: importances, confusion matrices, probability histograms and curves

use crate::error::{MetrixError, Result};
use crate::metrics::{probability_histogram, ConfusionMatrix, PrecisionRecallCurve, RocCurve};
use ndarray::Array1;
use plotters::prelude::*;
use std::path::Path;
use tracing::debug;

const WIDE: (u32, u32) = (1600, 800);
const SQUARE: (u32, u32) = (800, 800);

/// Histogram bins over [0, 1]
pub const HISTOGRAM_BINS: usize = 20;

fn plot_err<E: std::fmt::Display>(e: E) -> MetrixError {
    MetrixError::ReportError(format!("chart rendering failed: {}", e))
}

/// Bar chart of per-feature importances, optionally with ±std error bars
pub fn importance_bars(
    path: &Path,
    title: &str,
    names: &[String],
    means: &[f64],
    stds: Option<&[f64]>,
) -> Result<()> {
    if names.len() != means.len() || stds.map_or(false, |s| s.len() != means.len()) {
        return Err(MetrixError::ShapeError {
            expected: format!("{} importances", names.len()),
            actual: format!("{} importances", means.len()),
        });
    }
    let n = names.len().max(1);
    let top = means
        .iter()
        .zip(0..)
        .map(|(m, i)| m + stds.map_or(0.0, |s| s[i]))
        .fold(0.0f64, f64::max)
        .max(1e-6)
        * 1.1;

    let root = SVGBackend::new(path, WIDE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(220)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..top)
        .map_err(plot_err)?;

    let label = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-9 && i >= 0.0 {
            names.get(i as usize).cloned().unwrap_or_default()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label)
        .x_label_style(
            ("sans-serif", 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc("Importance")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(means.iter().enumerate().map(|(i, &m)| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, m)], BLUE.mix(0.8).filled())
        }))
        .map_err(plot_err)?;

    if let Some(stds) = stds {
        chart
            .draw_series(means.iter().zip(stds).enumerate().flat_map(|(i, (&m, &s))| {
                let x = i as f64;
                let (lo, hi) = ((m - s).max(0.0), m + s);
                [
                    PathElement::new(vec![(x, lo), (x, hi)], BLACK.stroke_width(1)),
                    PathElement::new(vec![(x - 0.15, lo), (x + 0.15, lo)], BLACK.stroke_width(1)),
                    PathElement::new(vec![(x - 0.15, hi), (x + 0.15, hi)], BLACK.stroke_width(1)),
                ]
            }))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), "Wrote importance chart");
    Ok(())
}

/// Annotated 2x2 heatmap, rows = actual, columns = predicted
pub fn confusion_heatmap(path: &Path, title: &str, cm: &ConfusionMatrix) -> Result<()> {
    let rows = cm.as_rows();
    let max = rows.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    let root = SVGBackend::new(path, SQUARE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..2f64, 0f64..2f64)
        .map_err(plot_err)?;

    // cell centres sit on the half units; actual class 0 is the top row
    let predicted_label = |v: &f64| match v {
        v if (v - 0.5).abs() < 1e-9 => "0".to_string(),
        v if (v - 1.5).abs() < 1e-9 => "1".to_string(),
        _ => String::new(),
    };
    let actual_label = |v: &f64| match v {
        v if (v - 1.5).abs() < 1e-9 => "0".to_string(),
        v if (v - 0.5).abs() < 1e-9 => "1".to_string(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(4)
        .y_labels(4)
        .x_label_formatter(&predicted_label)
        .y_label_formatter(&actual_label)
        .x_desc("Predicted label")
        .y_desc("True label")
        .draw()
        .map_err(plot_err)?;

    for (r, row) in rows.iter().enumerate() {
        for (c, &count) in row.iter().enumerate() {
            let shade = 1.0 - 0.8 * count as f64 / max;
            let fill = RGBColor(
                (255.0 * shade) as u8,
                (255.0 * shade) as u8,
                255,
            );
            let (x, y) = (c as f64, 1.0 - r as f64);
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x, y), (x + 1.0, y + 1.0)],
                    fill.filled(),
                )))
                .map_err(plot_err)?;
            chart
                .draw_series(std::iter::once(Text::new(
                    count.to_string(),
                    (x + 0.45, y + 0.5),
                    ("sans-serif", 28).into_font(),
                )))
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), "Wrote confusion matrix");
    Ok(())
}

/// Histogram of positive-class probabilities
pub fn probability_hist(path: &Path, title: &str, proba: &Array1<f64>) -> Result<()> {
    let counts = probability_histogram(proba, HISTOGRAM_BINS);
    let top = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.1;
    let width = 1.0 / HISTOGRAM_BINS as f64;

    let root = SVGBackend::new(path, SQUARE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..top)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Predicted probability of EP success")
        .y_desc("Frequency")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, &c)| {
            let x0 = i as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, c as f64)], BLUE.mix(0.7).filled())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), "Wrote probability histogram");
    Ok(())
}

/// Precision and recall against the decision threshold
pub fn precision_recall_vs_threshold(path: &Path, title: &str, curve: &PrecisionRecallCurve) -> Result<()> {
    let root = SVGBackend::new(path, WIDE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..1.05f64)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Threshold")
        .draw()
        .map_err(plot_err)?;

    // the closing (recall 0, precision 1) point has no threshold
    let precision: Vec<(f64, f64)> = curve.thresholds.iter().copied().zip(curve.precision.iter().copied()).collect();
    let recall: Vec<(f64, f64)> = curve.thresholds.iter().copied().zip(curve.recall.iter().copied()).collect();

    chart
        .draw_series(LineSeries::new(precision, BLUE.stroke_width(2)))
        .map_err(plot_err)?
        .label("Precision")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(recall, GREEN.stroke_width(2)))
        .map_err(plot_err)?
        .label("Recall")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), "Wrote precision-recall chart");
    Ok(())
}

/// ROC curve with the chance diagonal
pub fn roc_chart(path: &Path, title: &str, curve: &RocCurve) -> Result<()> {
    let root = SVGBackend::new(path, SQUARE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("False Positive Rate (1 - Specificity)")
        .y_desc("True Positive Rate (Sensitivity)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(vec![(0.0, 0.0), (1.0, 1.0)], BLACK.mix(0.4)))
        .map_err(plot_err)?;
    let points: Vec<(f64, f64)> = curve.fpr.iter().copied().zip(curve.tpr.iter().copied()).collect();
    chart
        .draw_series(LineSeries::new(points, RED.stroke_width(2)))
        .map_err(plot_err)?
        .label(format!("AUC = {:.4}", curve.auc()))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), "Wrote ROC chart");
    Ok(())
}
