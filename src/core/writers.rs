//! CSV export of aligned channel pairs.
//!
//! The combined file keeps the capture's own column naming: the time column
//! as-is and the value column suffixed `_1` (input) and `_2` (capacitor).
//! Unmatched second-channel rows are written as empty cells.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::config::ChannelConfig;
use crate::processors::alignment::CombinedSeries;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Header row for a combined file under the given channel naming.
pub fn combined_headers(channels: &ChannelConfig) -> [String; 3] {
    [
        channels.time_column.clone(),
        format!("{}_1", channels.value_column),
        format!("{}_2", channels.value_column),
    ]
}

/// Write an aligned series to CSV.
///
/// Values are written with Rust's shortest round-trip float formatting, so
/// reading the file back yields the exact same numbers.
///
/// # Errors
///
/// Returns an error if parent directories cannot be created or the file
/// cannot be created or written to.
///
/// # Example
///
/// ```no_run
/// use rc_lab_plot::config::ChannelConfig;
/// use rc_lab_plot::core::writers::write_combined_csv;
/// use rc_lab_plot::processors::alignment::CombinedSeries;
/// use std::path::Path;
///
/// let series = CombinedSeries::default();
/// write_combined_csv(Path::new("combined.csv"), &series, &ChannelConfig::default()).unwrap();
/// ```
pub fn write_combined_csv(
    path: &Path,
    series: &CombinedSeries,
    channels: &ChannelConfig,
) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    csv_writer
        .write_record(combined_headers(channels))
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for sample in &series.samples {
        csv_writer
            .write_record(&[
                sample.time.to_string(),
                sample.value_1.to_string(),
                sample.value_2.map(|v| v.to_string()).unwrap_or_default(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::alignment::CombinedSample;
    use tempfile::tempdir;

    fn create_test_series() -> CombinedSeries {
        CombinedSeries {
            samples: vec![
                CombinedSample {
                    time: 0.0,
                    value_1: 3.3,
                    value_2: Some(0.125),
                },
                CombinedSample {
                    time: 0.001,
                    value_1: 3.3,
                    value_2: None,
                },
            ],
        }
    }

    #[test]
    fn test_write_combined_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("combined.csv");

        write_combined_csv(&path, &create_test_series(), &ChannelConfig::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], " time, cal[0]_1, cal[0]_2");
        assert_eq!(lines[1], "0,3.3,0.125");
        assert_eq!(lines[2], "0.001,3.3,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_combined_csv_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("nested").join("combined.csv");

        write_combined_csv(&path, &CombinedSeries::default(), &ChannelConfig::default()).unwrap();

        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
