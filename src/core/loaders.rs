//! Loader for single-channel oscilloscope capture CSV files.
//!
//! Each capture file has a header row and at least a timestamp column and a
//! calibrated value column. Header names are matched exactly, including any
//! leading whitespace the acquisition software writes (`" time"`, `" cal[0]"`).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use crate::config::ChannelConfig;

/// Errors that can occur while loading a capture.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{column}' in {path}")]
    MissingColumns { path: PathBuf, column: String },

    #[error("Invalid value '{value}' in column '{column}' at row {row} of {path}")]
    ParseError {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One timestamped calibrated reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

impl Sample {
    #[inline]
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// An ordered sequence of samples from one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCapture {
    pub samples: Vec<Sample>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl RawCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a capture from `(time, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self {
            samples: pairs.into_iter().map(|(t, v)| Sample::new(t, v)).collect(),
            source_path: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns true if timestamps are non-decreasing.
    pub fn is_sorted_by_time(&self) -> bool {
        self.samples.windows(2).all(|w| w[0].time <= w[1].time)
    }
}

/// Load one capture CSV, keeping only the configured time and value columns.
///
/// A header-only file yields an empty capture rather than an error; the
/// caller decides whether an empty channel is worth reporting. A blank value
/// cell is read as `NaN` and kept, while a blank time cell is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, is not valid CSV, lacks
/// either column, or holds a cell that does not parse as a number.
pub fn load_capture_csv<P: AsRef<Path>>(path: P, channels: &ChannelConfig) -> Result<RawCapture> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoaderError::MissingColumns {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let time_idx = column_index(channels.time_column.as_str())?;
    let value_idx = column_index(channels.value_column.as_str())?;

    let mut samples = Vec::with_capacity(4096);

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let parse = |idx: usize, column: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or("");
            raw.trim().parse::<f64>().map_err(|_| LoaderError::ParseError {
                path: path.to_path_buf(),
                row: row + 1,
                column: column.to_string(),
                value: raw.to_string(),
            })
        };

        let time = parse(time_idx, channels.time_column.as_str())?;
        if !time.is_finite() {
            return Err(LoaderError::ParseError {
                path: path.to_path_buf(),
                row: row + 1,
                column: channels.time_column.clone(),
                value: record.get(time_idx).unwrap_or("").to_string(),
            });
        }
        // A blank value cell is a dropout, not a malformed file.
        let value = match record.get(value_idx).map(str::trim) {
            None | Some("") => f64::NAN,
            Some(_) => parse(value_idx, channels.value_column.as_str())?,
        };
        samples.push(Sample::new(time, value));
    }

    log::debug!("{}: {} samples", path.display(), samples.len());

    Ok(RawCapture {
        samples,
        source_path: Some(path.to_path_buf()),
    })
}
