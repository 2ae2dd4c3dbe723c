//! Multi-panel voltage and current figures for an experiment folder.
//!
//! Figures are first shaped into plain data ([`Figure`], [`Panel`],
//! [`Trace`]) and then rendered to PNG with the plotters library, one
//! stacked panel per aligned capture pair.

use std::fs;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::{ExperimentFolder, PlotConfig};
use crate::core::transforms::derive_current;
use crate::processors::batch::PlotJob;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Figure has no panels")]
    EmptyFigure,

    #[error(
        "No resistance configured for panel {panel} of '{folder}' \
         (no prefix entry and positional index {index} is out of range)"
    )]
    MissingResistance {
        folder: String,
        panel: usize,
        index: usize,
    },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

const INPUT_COLOR: RGBColor = RGBColor(0, 0, 255);
const CAP_COLOR: RGBColor = RGBColor(255, 0, 0);
const INPUT_CURRENT_COLOR: RGBColor = RGBColor(0, 128, 0);
const CAP_CURRENT_COLOR: RGBColor = RGBColor(255, 165, 0);

/// Figure title size in points.
const TITLE_PT: f64 = 16.0;
const CAPTION_PT: f64 = 12.0;
const LABEL_PT: f64 = 10.0;

/// One plotted line. `None` (or non-finite) values leave a gap.
#[derive(Debug, Clone)]
pub struct Trace {
    pub label: String,
    pub color: RGBColor,
    pub dashed: bool,
    pub points: Vec<(f64, Option<f64>)>,
}

/// One subplot.
#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub traces: Vec<Trace>,
}

/// A whole image: a suptitle and vertically stacked panels.
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub file_name: String,
    pub panels: Vec<Panel>,
}

/// File name of a folder's voltage figure.
pub fn voltage_plot_name(folder: &str) -> String {
    format!("{}_plot_with_grid.png", folder)
}

/// File name of a folder's current figure.
pub fn current_plot_name(folder: &str) -> String {
    format!("{}_plot_with_current_with_grid.png", folder)
}

/// Panel title: the job label up to the first occurrence of `marker`.
pub fn panel_title<'a>(label: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        return label;
    }
    label.split(marker).next().unwrap_or(label)
}

/// Resistance (ohms) used to derive current for panel `panel`.
///
/// An entry keyed by the pair's prefix wins. Otherwise the folder's
/// positional list is read at `2 * panel`, the layout where each pair owns
/// two consecutive entries.
///
/// # Errors
///
/// [`VisualizationError::MissingResistance`] when neither source has a value.
pub fn resistance_for(folder: &ExperimentFolder, panel: usize, prefix: &str) -> Result<f64> {
    if let Some(&ohms) = folder.pair_resistances.get(prefix) {
        return Ok(ohms);
    }

    let index = panel * 2;
    folder
        .resistances
        .get(index)
        .copied()
        .ok_or_else(|| VisualizationError::MissingResistance {
            folder: folder.name.clone(),
            panel,
            index,
        })
}

/// Shape the voltage figure: both channels against time, one panel per job.
pub fn voltage_figure(folder: &str, jobs: &[PlotJob], plot: &PlotConfig) -> Figure {
    let panels = jobs
        .iter()
        .map(|job| Panel {
            title: panel_title(&job.label, &plot.title_marker).to_string(),
            x_label: "Time".to_string(),
            y_label: "Voltage".to_string(),
            traces: vec![
                Trace {
                    label: "Voltage Input".to_string(),
                    color: INPUT_COLOR,
                    dashed: false,
                    points: job.series.samples.iter().map(|s| (s.time, Some(s.value_1))).collect(),
                },
                Trace {
                    label: "Voltage Across Capacitor".to_string(),
                    color: CAP_COLOR,
                    dashed: false,
                    points: job.series.samples.iter().map(|s| (s.time, s.value_2)).collect(),
                },
            ],
        })
        .collect();

    Figure {
        title: folder.to_string(),
        file_name: voltage_plot_name(folder),
        panels,
    }
}

/// Shape the current figure: each channel divided by the panel's resistance.
///
/// # Errors
///
/// Fails on the first panel without a configured resistance.
pub fn current_figure(folder: &ExperimentFolder, jobs: &[PlotJob], plot: &PlotConfig) -> Result<Figure> {
    let mut panels = Vec::with_capacity(jobs.len());

    for (idx, job) in jobs.iter().enumerate() {
        let ohms = resistance_for(folder, idx, &job.prefix)?;
        log::info!("{}: panel {} uses R = {} ohm", folder.name, idx, ohms);

        panels.push(Panel {
            title: panel_title(&job.label, &plot.title_marker).to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Current (A)".to_string(),
            traces: vec![
                Trace {
                    label: "Current (Input) (A)".to_string(),
                    color: INPUT_CURRENT_COLOR,
                    dashed: true,
                    points: job
                        .series
                        .samples
                        .iter()
                        .map(|s| (s.time, Some(derive_current(s.value_1, ohms))))
                        .collect(),
                },
                Trace {
                    label: "Current (Across Capacitor) (A)".to_string(),
                    color: CAP_CURRENT_COLOR,
                    dashed: true,
                    points: job
                        .series
                        .samples
                        .iter()
                        .map(|s| (s.time, s.value_2.map(|v| derive_current(v, ohms))))
                        .collect(),
                },
            ],
        });
    }

    Ok(Figure {
        title: format!("{} Current (V(V)/R(ohm) against Time (s))", folder.name),
        file_name: current_plot_name(&folder.name),
        panels,
    })
}

/// Split a trace into runs of consecutive finite points.
fn contiguous_runs(points: &[(f64, Option<f64>)]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();

    for &(x, y) in points {
        match y.filter(|v| v.is_finite()) {
            Some(y) => current.push((x, y)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

/// Compute padded x/y ranges covering every finite point in the panel.
fn compute_bounds(panel: &Panel) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y) in panel.traces.iter().flat_map(|t| t.points.iter()) {
        if x.is_finite() {
            x_min = x_min.min(*x);
            x_max = x_max.max(*x);
        }
        if let Some(y) = y.filter(|v| v.is_finite()) {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    if x_min > x_max {
        x_min = 0.0;
        x_max = 1.0;
    }
    if y_min > y_max {
        y_min = 0.0;
        y_max = 1.0;
    }

    // Flat signals still get a visible range.
    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        let pad = (y_max.abs() * 0.1).max(f64::EPSILON * 1e3);
        y_min -= pad;
        y_max += pad;
    }

    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    (x_min - x_padding, x_max + x_padding, y_min - y_padding, y_max + y_padding)
}

/// Convert a point size to pixels at the configured resolution.
fn px(points: f64, dpi: u32) -> i32 {
    ((points * dpi as f64 / 72.0).round() as i32).max(1)
}

fn font_px(points: f64, dpi: u32) -> f64 {
    (points * dpi as f64 / 72.0).max(1.0)
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel,
    plot: &PlotConfig,
) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = compute_bounds(panel);
    let dpi = plot.dpi;

    let mut builder = ChartBuilder::on(area);
    builder.margin(px(12.0, dpi));
    if plot.draw_text {
        builder
            .caption(&panel.title, ("sans-serif", font_px(CAPTION_PT, dpi)))
            .set_label_area_size(LabelAreaPosition::Left, px(60.0, dpi))
            .set_label_area_size(LabelAreaPosition::Bottom, px(30.0, dpi));
    }

    let mut chart = builder
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    let mut mesh = chart.configure_mesh();
    mesh.bold_line_style(&BLACK.mix(0.2))
        .light_line_style(&BLACK.mix(0.05));
    if plot.draw_text {
        mesh.x_desc(panel.x_label.as_str())
            .y_desc(panel.y_label.as_str())
            .label_style(("sans-serif", font_px(LABEL_PT, dpi)));
    }
    mesh.draw().map_err(plot_err)?;

    let stroke = px(1.5, dpi) as u32;
    for trace in &panel.traces {
        let style = ShapeStyle::from(&trace.color).stroke_width(stroke);

        for (run_idx, run) in contiguous_runs(&trace.points).into_iter().enumerate() {
            let anno = if trace.dashed {
                chart.draw_series(DashedLineSeries::new(run, px(6.0, dpi), px(3.0, dpi), style))
            } else {
                chart.draw_series(LineSeries::new(run, style))
            }
            .map_err(plot_err)?;

            if run_idx == 0 && plot.draw_text {
                let legend_len = px(20.0, dpi);
                anno.label(trace.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], style));
            }
        }
    }

    if plot.draw_text {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", font_px(LABEL_PT, dpi)))
            .draw()
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Render `figure` to `<output_dir>/<figure.file_name>` as PNG.
///
/// The image is `plot.figure_size(panels)` pixels. Returns the written path.
pub fn render_figure(figure: &Figure, output_dir: &Path, plot: &PlotConfig) -> Result<PathBuf> {
    if figure.panels.is_empty() {
        return Err(VisualizationError::EmptyFigure);
    }

    if !output_dir.as_os_str().is_empty() {
        fs::create_dir_all(output_dir)?;
    }
    let output_path = output_dir.join(&figure.file_name);
    let size = plot.figure_size(figure.panels.len());

    {
        let root = BitMapBackend::new(&output_path, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let body = if plot.draw_text {
            root.titled(&figure.title, ("sans-serif", font_px(TITLE_PT, plot.dpi)))
                .map_err(plot_err)?
        } else {
            root.clone()
        };

        let areas = body.split_evenly((figure.panels.len(), 1));
        for (area, panel) in areas.iter().zip(&figure.panels) {
            draw_panel(area, panel, plot)?;
        }

        root.present().map_err(plot_err)?;
    }

    log::info!("Figure -> {}", output_path.display());
    Ok(output_path)
}
