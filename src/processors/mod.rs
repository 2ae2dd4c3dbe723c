//! Data processing modules.

pub mod alignment;
pub mod batch;
pub mod pairing;

// Re-export key types for convenience
pub use alignment::{align, align_with, CombinedSample, CombinedSeries, MatchStrategy};
pub use batch::{
    collect_folder, plot_folder, process_pair, run_experiments, Channel, FolderBatch,
    PairOutcome, PlotJob, RunSummary, SkipReason,
};
pub use pairing::{discover_pairs, FilePair, PairListing, PairingError};
