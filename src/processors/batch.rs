//! Per-folder batch collection and the whole-run driver.
//!
//! Each matched pair is read, optionally trimmed and aligned on its own; a
//! failure in one pair is recorded as a [`PairOutcome::Skipped`] and never
//! stops the rest of the folder.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::config::{ExperimentFolder, PipelineConfig};
use crate::core::loaders::{load_capture_csv, RawCapture};
use crate::core::transforms::trim_zero_edges;
use crate::visualization;

use super::alignment::{align_with, CombinedSeries};
use super::pairing::{discover_pairs, FilePair, PairingError};

/// An aligned pair ready for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotJob {
    /// `"<input file> & <cap file>"`
    pub label: String,
    /// Shared filename prefix of the pair
    pub prefix: String,
    pub series: CombinedSeries,
}

/// The two capture channels of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Input,
    Capacitor,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Input => write!(f, "input"),
            Channel::Capacitor => write!(f, "capacitor"),
        }
    }
}

/// Why a pair produced no plot job.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The channel had no samples (after trimming, when enabled)
    EmptyCapture(Channel),
    /// Alignment produced no rows
    EmptyAlignment,
    /// Reading failed; holds the error text
    DataFormat(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyCapture(channel) => write!(f, "empty {} capture", channel),
            SkipReason::EmptyAlignment => write!(f, "empty alignment"),
            SkipReason::DataFormat(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of processing one pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Aligned(PlotJob),
    Skipped { pair: FilePair, reason: SkipReason },
}

/// Everything collected from one experiment folder.
#[derive(Debug, Clone, Default)]
pub struct FolderBatch {
    pub folder: String,
    pub path: PathBuf,
    pub jobs: Vec<PlotJob>,
    pub skipped: Vec<(FilePair, SkipReason)>,
    /// Files whose partner channel is missing
    pub unmatched: Vec<PathBuf>,
}

impl FolderBatch {
    /// Number of pairs skipped because their data could not be read.
    pub fn failed_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, reason)| matches!(reason, SkipReason::DataFormat(_)))
            .count()
    }
}

fn load_channel(path: &Path, config: &PipelineConfig) -> std::result::Result<RawCapture, String> {
    let capture = load_capture_csv(path, &config.channels).map_err(|e| e.to_string())?;
    Ok(if config.processing.trim_zero_edges {
        trim_zero_edges(&capture)
    } else {
        capture
    })
}

/// Read, optionally trim, and align one pair.
///
/// Read failures are logged with both filenames and returned as
/// [`SkipReason::DataFormat`].
pub fn process_pair(pair: &FilePair, config: &PipelineConfig) -> PairOutcome {
    let skip = |reason: SkipReason| PairOutcome::Skipped {
        pair: pair.clone(),
        reason,
    };

    let loaded = load_channel(&pair.input, config)
        .and_then(|input| load_channel(&pair.cap, config).map(|cap| (input, cap)));

    let (input, cap) = match loaded {
        Ok(captures) => captures,
        Err(msg) => {
            error!(
                "Error processing files {} and {}: {}",
                pair.input_name(),
                pair.cap_name(),
                msg
            );
            return skip(SkipReason::DataFormat(msg));
        }
    };

    if input.is_empty() {
        return skip(SkipReason::EmptyCapture(Channel::Input));
    }
    if cap.is_empty() {
        return skip(SkipReason::EmptyCapture(Channel::Capacitor));
    }

    let series = align_with(&input, &cap, &config.alignment);
    if series.is_empty() {
        return skip(SkipReason::EmptyAlignment);
    }

    log::debug!(
        "{}: {} rows, {} matched",
        pair.label(),
        series.len(),
        series.matched_count()
    );

    PairOutcome::Aligned(PlotJob {
        label: pair.label(),
        prefix: pair.prefix.clone(),
        series,
    })
}

/// Collect plot jobs for the folder `name` under `root`.
///
/// Returns `Ok(None)` when the folder does not exist.
pub fn collect_folder(
    root: &Path,
    name: &str,
    config: &PipelineConfig,
) -> std::result::Result<Option<FolderBatch>, PairingError> {
    let path = root.join(name);

    let listing = match discover_pairs(&path, &config.channels) {
        Ok(listing) => listing,
        Err(PairingError::DirectoryNotFound(_)) => {
            warn!("Skipping missing folder: {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let mut batch = FolderBatch {
        folder: name.to_string(),
        path,
        unmatched: listing.unmatched,
        ..FolderBatch::default()
    };

    for pair in &listing.pairs {
        match process_pair(pair, config) {
            PairOutcome::Aligned(job) => batch.jobs.push(job),
            PairOutcome::Skipped { pair, reason } => {
                info!("Skipped {}: {}", pair.label(), reason);
                batch.skipped.push((pair, reason));
            }
        }
    }

    Ok(Some(batch))
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub folders_processed: usize,
    pub folders_missing: Vec<String>,
    pub jobs: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unmatched: usize,
    pub outputs: Vec<PathBuf>,
}

/// Render both figures for a collected folder: current first, then voltage.
///
/// # Errors
///
/// A missing resistance for any panel aborts before either image is written.
pub fn plot_folder(
    batch: &FolderBatch,
    folder: &ExperimentFolder,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    let current = visualization::current_figure(folder, &batch.jobs, &config.plot)?;
    let voltage = visualization::voltage_figure(&folder.name, &batch.jobs, &config.plot);

    let mut outputs = Vec::with_capacity(2);
    for figure in [current, voltage] {
        let path = visualization::render_figure(&figure, &config.output_dir, &config.plot)
            .with_context(|| format!("Failed to render {}", figure.file_name))?;
        outputs.push(path);
    }
    Ok(outputs)
}

/// Run the whole pipeline over every configured experiment folder.
///
/// Missing folders and unreadable pairs are skipped; a resistance table
/// too short for a folder's panels is returned as an error.
pub fn run_experiments(config: &PipelineConfig) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for folder in &config.folders {
        let batch = match collect_folder(&config.root, &folder.name, config)
            .with_context(|| format!("Failed to scan folder '{}'", folder.name))?
        {
            Some(batch) => batch,
            None => {
                summary.folders_missing.push(folder.name.clone());
                continue;
            }
        };

        summary.folders_processed += 1;
        summary.jobs += batch.jobs.len();
        summary.skipped += batch.skipped.len();
        summary.failed += batch.failed_count();
        summary.unmatched += batch.unmatched.len();

        info!(
            "{}: {} jobs, {} skipped, {} unmatched",
            folder.name,
            batch.jobs.len(),
            batch.skipped.len(),
            batch.unmatched.len()
        );

        if batch.jobs.is_empty() {
            continue;
        }

        let outputs = plot_folder(&batch, folder, config)?;
        summary.outputs.extend(outputs);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::visualization::VisualizationError;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_capture(dir: &Path, name: &str, rows: &[(f64, f64)]) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "index, time, cal[0]").unwrap();
        for (i, (t, v)) in rows.iter().enumerate() {
            writeln!(file, "{}, {}, {}", i, t, v).unwrap();
        }
    }

    fn write_pair(dir: &Path, prefix: &str) {
        write_capture(
            dir,
            &format!("{prefix}Ana7_input.csv"),
            &[(0.0, 0.0), (0.001, 3.3), (0.002, 3.3)],
        );
        write_capture(
            dir,
            &format!("{prefix}Ana8_cap.csv"),
            &[(0.0004, 0.1), (0.0011, 0.9), (0.0019, 1.6)],
        );
    }

    fn test_config(root: &Path, output_dir: &Path, folders: Vec<ExperimentFolder>) -> PipelineConfig {
        PipelineConfig {
            root: root.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            folders,
            plot: PlotConfig {
                dpi: 10,
                draw_text: false,
                ..PlotConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_collect_single_pair() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_pair(&folder, "X_");

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert_eq!(batch.jobs.len(), 1);
        let job = &batch.jobs[0];
        assert_eq!(job.label, "X_Ana7_input.csv & X_Ana8_cap.csv");
        assert_eq!(job.prefix, "X_");
        assert_eq!(job.series.len(), 3);
        let matched: Vec<Option<f64>> = job.series.samples.iter().map(|s| s.value_2).collect();
        assert_eq!(matched, vec![Some(0.1), Some(0.9), Some(1.6)]);
    }

    #[test]
    fn test_unpartnered_file_yields_no_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_capture(&folder, "X_Ana7_input.csv", &[(0.0, 1.0)]);

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert!(batch.jobs.is_empty());
        assert!(batch.skipped.is_empty());
        assert_eq!(batch.unmatched.len(), 1);
    }

    #[test]
    fn test_missing_folder_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);

        assert!(collect_folder(temp_dir.path(), "absent", &config).unwrap().is_none());
    }

    #[test]
    fn test_malformed_pair_is_contained() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_pair(&folder, "a, ");
        write_pair(&folder, "b, ");
        write_pair(&folder, "d, ");
        fs::write(folder.join("c, Ana7_input.csv"), "index, time, cal[0]\n0, 0.0, 1.0\n").unwrap();
        fs::write(folder.join("c, Ana8_cap.csv"), "garbage header\nnot,numbers\n").unwrap();

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert_eq!(batch.jobs.len(), 3);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.skipped[0].0.prefix, "c, ");
        assert!(matches!(batch.skipped[0].1, SkipReason::DataFormat(_)));
    }

    #[test]
    fn test_blank_value_cell_still_yields_job() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        fs::write(
            folder.join("g, Ana7_input.csv"),
            "index, time, cal[0]\n0, 0.0, 1.0\n1, 0.1, \n2, 0.2, 2.0\n",
        )
        .unwrap();
        write_capture(&folder, "g, Ana8_cap.csv", &[(0.0, 0.5), (0.1, 0.6), (0.2, 0.7)]);

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert!(batch.skipped.is_empty());
        assert_eq!(batch.jobs.len(), 1);
        let samples = &batch.jobs[0].series.samples;
        assert_eq!(samples.len(), 3);
        assert!(samples[1].value_1.is_nan());
        assert_eq!(samples[1].value_2, Some(0.6));
    }

    #[test]
    fn test_empty_capture_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_capture(&folder, "e Ana7_input.csv", &[(0.0, 1.0)]);
        write_capture(&folder, "e Ana8_cap.csv", &[]);

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert!(batch.jobs.is_empty());
        assert_eq!(
            batch.skipped[0].1,
            SkipReason::EmptyCapture(Channel::Capacitor)
        );
    }

    #[test]
    fn test_trim_option_can_empty_a_capture() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_capture(&folder, "z Ana7_input.csv", &[(0.0, 0.0), (1.0, 0.0)]);
        write_capture(&folder, "z Ana8_cap.csv", &[(0.0, 1.0)]);

        let mut config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();
        assert_eq!(batch.jobs.len(), 1);

        config.processing.trim_zero_edges = true;
        let batch = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();
        assert!(batch.jobs.is_empty());
        assert_eq!(batch.skipped[0].1, SkipReason::EmptyCapture(Channel::Input));
    }

    #[test]
    fn test_collection_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("exp");
        fs::create_dir(&folder).unwrap();
        write_pair(&folder, "p1 ");
        write_pair(&folder, "p2 ");

        let config = test_config(temp_dir.path(), temp_dir.path(), vec![]);
        let first = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();
        let second = collect_folder(temp_dir.path(), "exp", &config).unwrap().unwrap();

        assert_eq!(first.jobs, second.jobs);
    }

    #[test]
    fn test_run_experiments_writes_figures() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        let out = temp_dir.path().join("out");
        fs::create_dir_all(root.join("exp")).unwrap();
        write_pair(&root.join("exp"), "a, ");
        write_pair(&root.join("exp"), "b, ");

        let folders = vec![
            ExperimentFolder::new("exp", vec![1000.0, 1000.0, 470.0, 470.0]),
            ExperimentFolder::new("absent", vec![1000.0]),
        ];
        let config = test_config(&root, &out, folders);

        let summary = run_experiments(&config).unwrap();
        assert_eq!(summary.folders_processed, 1);
        assert_eq!(summary.folders_missing, vec!["absent".to_string()]);
        assert_eq!(summary.jobs, 2);
        assert_eq!(
            summary.outputs,
            vec![
                out.join("exp_plot_with_current_with_grid.png"),
                out.join("exp_plot_with_grid.png"),
            ]
        );
        assert!(summary.outputs.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_short_resistance_list_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        let out = temp_dir.path().join("out");
        fs::create_dir_all(root.join("exp")).unwrap();
        write_pair(&root.join("exp"), "a, ");
        write_pair(&root.join("exp"), "b, ");

        let folders = vec![ExperimentFolder::new("exp", vec![1000.0, 1000.0])];
        let config = test_config(&root, &out, folders);

        let err = run_experiments(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VisualizationError>(),
            Some(VisualizationError::MissingResistance { panel: 1, .. })
        ));
        assert!(!out.join("exp_plot_with_grid.png").exists());
    }
}
