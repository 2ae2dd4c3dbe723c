//! Alignment of two independently sampled channels onto one time axis.
//!
//! The first channel is the anchor: every anchor sample produces exactly one
//! output row, and the second channel contributes the value of whichever of
//! its samples the [`MatchStrategy`] selects.

use serde::{Deserialize, Serialize};

use crate::config::AlignmentConfig;
use crate::core::loaders::{RawCapture, Sample};

/// Rule for picking the second-channel sample that matches an anchor time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Closest timestamp in either direction; equal distances prefer the earlier sample
    #[default]
    Nearest,
    /// Most recent sample at or before the anchor time (forward-fill)
    Backward,
    /// First sample at or after the anchor time
    Forward,
    /// Only a sample with exactly the anchor time
    Exact,
}

/// One aligned row: the anchor's time and value plus the matched value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedSample {
    pub time: f64,
    pub value_1: f64,
    /// `None` when the strategy found no acceptable match
    pub value_2: Option<f64>,
}

/// Two channels merged on the first channel's time axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedSeries {
    pub samples: Vec<CombinedSample>,
}

impl CombinedSeries {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of rows that received a second-channel value.
    pub fn matched_count(&self) -> usize {
        self.samples.iter().filter(|s| s.value_2.is_some()).count()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.time)
    }
}

fn sorted_by_time(samples: &[Sample]) -> Vec<Sample> {
    let mut sorted = samples.to_vec();
    // sort_by is stable: equal timestamps keep file order
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));
    sorted
}

/// Index of the last sample with `time <= t`.
fn backward_match(sorted: &[Sample], t: f64) -> Option<usize> {
    sorted.partition_point(|s| s.time <= t).checked_sub(1)
}

/// Index of the first sample with `time >= t`.
fn forward_match(sorted: &[Sample], t: f64) -> Option<usize> {
    let idx = sorted.partition_point(|s| s.time < t);
    (idx < sorted.len()).then_some(idx)
}

fn find_match(sorted: &[Sample], t: f64, strategy: MatchStrategy) -> Option<usize> {
    match strategy {
        MatchStrategy::Backward => backward_match(sorted, t),
        MatchStrategy::Forward => forward_match(sorted, t),
        MatchStrategy::Exact => backward_match(sorted, t).filter(|&i| sorted[i].time == t),
        MatchStrategy::Nearest => match (backward_match(sorted, t), forward_match(sorted, t)) {
            (Some(b), Some(f)) => {
                let back_dist = t - sorted[b].time;
                let fwd_dist = sorted[f].time - t;
                Some(if back_dist <= fwd_dist { b } else { f })
            }
            (b, f) => b.or(f),
        },
    }
}

/// Align `second` onto `first` with nearest-time matching and no tolerance.
pub fn align(first: &RawCapture, second: &RawCapture) -> CombinedSeries {
    align_with(first, second, &AlignmentConfig::default())
}

/// Align `second` onto `first` using the configured strategy and tolerance.
///
/// Both inputs are stably sorted by time first. The output always has
/// exactly `first.len()` rows; rows without an acceptable match (including
/// every row when `second` is empty) carry `value_2 = None`.
pub fn align_with(
    first: &RawCapture,
    second: &RawCapture,
    options: &AlignmentConfig,
) -> CombinedSeries {
    let anchor = sorted_by_time(&first.samples);
    let other = sorted_by_time(&second.samples);

    let samples = anchor
        .iter()
        .map(|a| {
            let value_2 = find_match(&other, a.time, options.strategy)
                .map(|i| other[i])
                .filter(|b| options.tolerance.map_or(true, |tol| (b.time - a.time).abs() <= tol))
                .map(|b| b.value);

            CombinedSample {
                time: a.time,
                value_1: a.value,
                value_2,
            }
        })
        .collect();

    CombinedSeries { samples }
}
