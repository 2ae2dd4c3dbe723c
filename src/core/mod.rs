//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_capture_csv, LoaderError, RawCapture, Sample};
pub use transforms::{derive_current, trim_by, trim_zero_edges};
pub use writers::{write_combined_csv, WriteError};
