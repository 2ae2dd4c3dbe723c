//! Sample-level transforms: dead-time trimming and current derivation.

use super::loaders::{RawCapture, Sample};

/// Keep the contiguous run of samples from the first to the last one whose
/// `key` is non-zero.
///
/// Zero-valued samples between those bounds are kept. If no sample has a
/// non-zero key the result is empty.
pub fn trim_by<F>(capture: &RawCapture, key: F) -> RawCapture
where
    F: Fn(&Sample) -> f64,
{
    let first = capture.samples.iter().position(|s| key(s) != 0.0);
    let last = capture.samples.iter().rposition(|s| key(s) != 0.0);

    let samples = match (first, last) {
        (Some(start), Some(end)) => capture.samples[start..=end].to_vec(),
        _ => Vec::new(),
    };

    RawCapture {
        samples,
        source_path: capture.source_path.clone(),
    }
}

/// Trim dead time before the trigger and after capture end, where the
/// calibrated value reads exactly zero.
pub fn trim_zero_edges(capture: &RawCapture) -> RawCapture {
    trim_by(capture, |s| s.value)
}

/// Derive current (amps) from a voltage reading across `resistance_ohms`.
#[inline]
pub fn derive_current(voltage: f64, resistance_ohms: f64) -> f64 {
    voltage / resistance_ohms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(capture: &RawCapture) -> Vec<f64> {
        capture.samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_trim_zero_edges() {
        let capture = RawCapture::from_pairs(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 1.5),
            (3.0, 0.0),
            (4.0, 2.5),
            (5.0, 0.0),
        ]);

        let trimmed = trim_zero_edges(&capture);
        assert_eq!(values(&trimmed), vec![1.5, 0.0, 2.5]);
        assert_eq!(trimmed.samples[0].time, 2.0);
    }

    #[test]
    fn test_trim_all_zero_is_empty() {
        let capture = RawCapture::from_pairs(vec![(0.0, 0.0), (1.0, 0.0)]);
        assert!(trim_zero_edges(&capture).is_empty());
        assert!(trim_zero_edges(&RawCapture::new()).is_empty());
    }

    #[test]
    fn test_trim_without_zeros_is_identity() {
        let capture = RawCapture::from_pairs(vec![(0.0, 1.0), (1.0, -1.0)]);
        assert_eq!(trim_zero_edges(&capture), capture);
    }

    #[test]
    fn test_trim_by_time_reference() {
        let capture = RawCapture::from_pairs(vec![(0.0, 5.0), (1.0, 6.0), (2.0, 7.0)]);
        let trimmed = trim_by(&capture, |s| s.time);
        assert_eq!(values(&trimmed), vec![6.0, 7.0]);
    }

    #[test]
    fn test_derive_current() {
        assert_eq!(derive_current(3.3, 1000.0), 3.3 / 1000.0);
        assert!((derive_current(3.3, 1000.0) - 0.0033).abs() < 1e-15);
        assert_eq!(derive_current(0.0, 47.0), 0.0);
    }
}
