//! Alignment and plotting of paired RC-circuit oscilloscope captures.
//!
//! This crate provides tools for:
//! - Loading single-channel capture CSV files (`time`, `cal[0]` columns)
//! - Pairing input-voltage and capacitor-voltage captures by filename prefix
//! - Aligning the two channels onto one time axis by nearest-time matching
//! - Rendering per-experiment voltage and current figures to PNG
//!
//! # Example
//!
//! ```no_run
//! use rc_lab_plot::config::ChannelConfig;
//! use rc_lab_plot::core::loaders::load_capture_csv;
//! use rc_lab_plot::processors::alignment::align;
//!
//! let channels = ChannelConfig::default();
//! let input = load_capture_csv("run1, Ana7_input.csv", &channels).unwrap();
//! let cap = load_capture_csv("run1, Ana8_cap.csv", &channels).unwrap();
//! let combined = align(&input, &cap);
//! assert_eq!(combined.len(), input.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    AlignmentConfig, ChannelConfig, ExperimentFolder, PipelineConfig, PlotConfig,
    ProcessingConfig,
};
pub use crate::core::loaders::{RawCapture, Sample};
pub use processors::alignment::{CombinedSeries, MatchStrategy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
