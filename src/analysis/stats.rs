//! Latency and uptime summaries.

use serde::Serialize;

use super::incidents::status_of;
use crate::series::Sample;

/// Summary of the latency samples in a window, in the samples' unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    /// Number of measured samples the summary covers.
    pub count: usize,
}

/// Summarise latency samples.
///
/// Zero latency means the probe failed and nothing was measured, so those
/// samples are left out. Returns `None` when no measured sample remains.
pub fn latency_stats(samples: &[Sample]) -> Option<LatencyStats> {
    let mut values: Vec<f64> = samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();

    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);

    let count = values.len();
    let sum: f64 = values.iter().sum();

    Some(LatencyStats {
        avg: sum / count as f64,
        min: values[0],
        max: values[count - 1],
        p95: quantile(&values, 0.95)?,
        count,
    })
}

/// Quantile of ascending `sorted` values by linear interpolation between
/// closest ranks.
///
/// With `r = q * (n - 1)`, the result is
/// `sorted[floor(r)] + (r - floor(r)) * (sorted[ceil(r)] - sorted[floor(r)])`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Fraction of "up" samples equal to 1. Values other than 0 and 1 are ignored.
pub fn uptime_ratio(samples: &[Sample]) -> Option<f64> {
    let (up, total) = samples
        .iter()
        .filter_map(|s| status_of(s.value))
        .fold((0usize, 0usize), |(up, total), s| (up + s as usize, total + 1));

    if total == 0 {
        None
    } else {
        Some(up as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(t0 + Duration::minutes(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_p95_linear_interpolation() {
        // rank = 0.95 * 4 = 3.8, so 130 + 0.8 * (500 - 130)
        let stats = latency_stats(&series(&[120.0, 100.0, 500.0, 110.0, 130.0])).unwrap();
        assert!((stats.p95 - 426.0).abs() < 1e-9);
        assert!(stats.p95 > 130.0 && stats.p95 < 500.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 500.0);
        assert!((stats.avg - 192.0).abs() < 1e-9);
        assert_eq!(stats.count, 5);
    }

    #[test]
    fn test_unmeasured_samples_excluded() {
        let stats = latency_stats(&series(&[0.0, 0.2, 0.0, 0.4])).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 0.2);
        assert!((stats.avg - 0.3).abs() < 1e-9);

        assert!(latency_stats(&series(&[0.0, 0.0])).is_none());
        assert!(latency_stats(&[]).is_none());
    }

    #[test]
    fn test_quantile_edges() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&[7.0], 0.95), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&sorted, 1.5), None);
    }

    #[test]
    fn test_uptime_ratio() {
        assert_eq!(uptime_ratio(&series(&[1.0, 1.0, 0.0, 1.0])), Some(0.75));
        assert_eq!(uptime_ratio(&series(&[1.0, 1.0])), Some(1.0));
        assert_eq!(uptime_ratio(&[]), None);
    }
}
