//! SVG plots of a line fit.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::LineFit;

const PLOT_SIZE: (u32, u32) = (960, 540);

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot render {path}: {message}")]
    Render { path: String, message: String },
}

/// Files written by [`render_plots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotFiles {
    pub histogram: PathBuf,
    pub deviation: PathBuf,
}

/// Draw the residual histogram and the per-sample deviation of `fit` into `dir`.
///
/// Files are named after the stem of the fitted file:
/// `<stem>_histogram.svg` and `<stem>_deviation.svg`.
pub fn render_plots(fit: &LineFit, dir: &Path) -> Result<PlotFiles, PlotError> {
    fs::create_dir_all(dir)?;
    let stem = Path::new(&fit.source)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fit".to_string());

    let files = PlotFiles {
        histogram: dir.join(format!("{stem}_histogram.svg")),
        deviation: dir.join(format!("{stem}_deviation.svg")),
    };
    draw_histogram(fit, &files.histogram)?;
    draw_deviation(fit, &files.deviation)?;
    debug!(
        histogram = %files.histogram.display(),
        deviation = %files.deviation.display(),
        "rendered plots"
    );
    Ok(files)
}

fn draw_histogram(fit: &LineFit, path: &Path) -> Result<(), PlotError> {
    let histogram = &fit.histogram;
    let (low, high) = (histogram.low as f64, histogram.high as f64);
    let top = histogram.counts.values().copied().max().unwrap_or(0) as f64 + 1.0;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|err| render_error(path, err))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Deviation histogram: {}", fit.source),
            ("sans-serif", 20).into_font(),
        )
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(low..high, 0.0..top)
        .map_err(|err| render_error(path, err))?;
    chart
        .configure_mesh()
        .x_desc("deviation (ns)")
        .y_desc("samples")
        .draw()
        .map_err(|err| render_error(path, err))?;
    chart
        .draw_series(histogram.bins().map(|(lower, upper, count)| {
            Rectangle::new(
                [(lower as f64, 0.0), (upper as f64, count as f64)],
                BLUE.mix(0.6).filled(),
            )
        }))
        .map_err(|err| render_error(path, err))?;
    root.present().map_err(|err| render_error(path, err))?;
    Ok(())
}

fn draw_deviation(fit: &LineFit, path: &Path) -> Result<(), PlotError> {
    let last = fit.residuals.len().max(1) as f64;
    let bound = fit.max_deviation.ceil() + 1.0;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|err| render_error(path, err))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Deviation from fitted line: {}", fit.source),
            ("sans-serif", 20).into_font(),
        )
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..last, -bound..bound)
        .map_err(|err| render_error(path, err))?;
    chart
        .configure_mesh()
        .x_desc("sample")
        .y_desc("deviation (ns)")
        .draw()
        .map_err(|err| render_error(path, err))?;
    chart
        .draw_series(LineSeries::new(vec![(0.0, 0.0), (last, 0.0)], &RED))
        .map_err(|err| render_error(path, err))?;
    chart
        .draw_series(
            fit.residuals
                .iter()
                .enumerate()
                .map(|(idx, residual)| Circle::new((idx as f64, *residual), 2, BLUE.filled())),
        )
        .map_err(|err| render_error(path, err))?;
    root.present().map_err(|err| render_error(path, err))?;
    Ok(())
}

fn render_error<E: Display>(path: &Path, err: E) -> PlotError {
    PlotError::Render {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
