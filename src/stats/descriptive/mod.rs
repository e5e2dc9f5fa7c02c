//! Weighted descriptive statistics

use crate::data::ValidatedSample;
use crate::error::{Error, Result};
use crate::stats::frequency::{aggregate, percentile_sorted};
use crate::stats::DescriptiveStats;

/// Computes descriptive statistics of a (possibly weighted) sample
pub(crate) fn describe_impl(sample: &ValidatedSample) -> Result<DescriptiveStats> {
    let pairs = aggregate(sample);
    if pairs.is_empty() {
        return Err(Error::EmptyData(
            "descriptive statistics require at least one case with positive weight".into(),
        ));
    }

    let n: f64 = pairs.iter().map(|(_, w)| w).sum();
    let sum: f64 = pairs.iter().map(|(v, w)| v * w).sum();
    let mean = sum / n;

    // frequency-weighted variance with W − 1 in the denominator
    let variance = if n > 1.0 {
        let ss: f64 = pairs.iter().map(|(v, w)| w * (v - mean).powi(2)).sum();
        Some(ss / (n - 1.0))
    } else {
        None
    };
    let std = variance.map(f64::sqrt);
    let std_error = std.map(|s| s / n.sqrt());

    let min = pairs[0].0;
    let max = pairs[pairs.len() - 1].0;

    Ok(DescriptiveStats {
        count: sample.len(),
        n,
        sum,
        mean,
        variance,
        std,
        std_error,
        min,
        q1: percentile_sorted(&pairs, n, 25.0)?,
        median: percentile_sorted(&pairs, n, 50.0)?,
        q3: percentile_sorted(&pairs, n, 75.0)?,
        max,
        range: max - min,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_basic() {
        let sample = ValidatedSample::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], None).unwrap();
        let stats = describe_impl(&sample).unwrap();

        assert_eq!(stats.count, 5);
        assert_eq!(stats.n, 5.0);
        assert!((stats.mean - 3.0).abs() < 1e-10);
        assert!((stats.std.unwrap() - 1.5811388300841898).abs() < 1e-10);
        assert!((stats.std_error.unwrap() - 1.5811388300841898 / 5f64.sqrt()).abs() < 1e-10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.range, 4.0);
        assert_eq!(stats.median, Some(3.0));
        assert_eq!(stats.q1, Some(1.5));
        assert_eq!(stats.q3, Some(4.5));
    }

    #[test]
    fn test_describe_weighted() {
        // equivalent to [2, 2, 2, 6]
        let sample = ValidatedSample::new(vec![2.0, 6.0], Some(vec![3.0, 1.0])).unwrap();
        let stats = describe_impl(&sample).unwrap();

        assert_eq!(stats.n, 4.0);
        assert_eq!(stats.sum, 12.0);
        assert_eq!(stats.mean, 3.0);
        assert!((stats.variance.unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_describe_single_case() {
        let sample = ValidatedSample::new(vec![7.0], None).unwrap();
        let stats = describe_impl(&sample).unwrap();
        assert_eq!(stats.variance, None);
        assert_eq!(stats.std, None);
    }

    #[test]
    fn test_describe_empty() {
        let sample = ValidatedSample::new(Vec::new(), None).unwrap();
        assert!(describe_impl(&sample).is_err());
    }
}
