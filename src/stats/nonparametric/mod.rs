//! Nonparametric tests: Mann-Whitney U, Kruskal-Wallis H,
//! two-sample Kolmogorov-Smirnov and the runs test.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::stats::distributions::{chi_square_upper, kolmogorov_p_value, normal_two_tailed};
use crate::stats::rank::rank_groups;
use crate::stats::{
    CutPoint, KolmogorovSmirnovResult, KruskalWallisResult, MannWhitneyResult, RunsResult,
};

/// Exact Mann-Whitney p-values require `n1·n2` below this
pub const EXACT_MAX_PRODUCT: usize = 400;
/// ...and `n1·n2/2 + min(n1, n2)` at most this
pub const EXACT_MAX_BOUND: f64 = 220.0;

/// Whether the exact U distribution is computed for these group sizes
pub fn exact_computable(n1: usize, n2: usize) -> bool {
    let product = n1 * n2;
    product < EXACT_MAX_PRODUCT && product as f64 / 2.0 + n1.min(n2) as f64 <= EXACT_MAX_BOUND
}

pub(crate) fn mann_whitney_impl(sample1: &[f64], sample2: &[f64]) -> Result<MannWhitneyResult> {
    if sample1.is_empty() || sample2.is_empty() {
        return Err(Error::EmptyData(format!(
            "Mann-Whitney U test requires data in both groups (n1={}, n2={})",
            sample1.len(),
            sample2.len()
        )));
    }

    let summary = rank_groups(&[sample1, sample2]);
    let n1 = sample1.len();
    let n2 = sample2.len();
    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let total = n1f + n2f;
    let r1 = summary.rank_sums[0];
    let r2 = summary.rank_sums[1];

    let u1 = r1 - n1f * (n1f + 1.0) / 2.0;
    let u2 = n1f * n2f - u1;
    let (u, w) = if u1 <= u2 { (u1, r1) } else { (u2, r2) };

    let expected = n1f * n2f / 2.0;
    let variance = n1f * n2f / 12.0
        * ((total + 1.0) - summary.tie_correction / (total * (total - 1.0)));
    if !(variance > 0.0) {
        return Err(Error::ZeroVariance(
            "all values are tied; the Mann-Whitney U statistic has no variance".into(),
        ));
    }

    let z = (u - expected) / variance.sqrt();
    let asymptotic_p = normal_two_tailed(z)?;

    let (exact_p, exact_p_one_tailed) = if exact_computable(n1, n2) {
        let one_tailed = exact_u_cdf(n1, n2, u);
        (Some((2.0 * one_tailed).min(1.0)), Some(one_tailed))
    } else {
        log::debug!(
            "Skipping exact Mann-Whitney p-value for n1={}, n2={} (over cost threshold)",
            n1,
            n2
        );
        (None, None)
    };

    Ok(MannWhitneyResult {
        n1,
        n2,
        rank_sum1: r1,
        rank_sum2: r2,
        mean_rank1: r1 / n1f,
        mean_rank2: r2 / n2f,
        u,
        w,
        z,
        asymptotic_p,
        exact_p,
        exact_p_one_tailed,
        tie_correction: summary.tie_correction,
    })
}

/// Frequencies of each U value over all `C(n1+n2, n1)` arrangements
///
/// Built with `f(i, j)[u] = f(i, j−1)[u] + f(i−1, j)[u − j]`.
pub fn exact_u_distribution(n1: usize, n2: usize) -> Vec<f64> {
    // prev[j] holds f(i−1, j); cur[j] holds f(i, j)
    let mut prev: Vec<Vec<f64>> = (0..=n2).map(|_| vec![1.0]).collect();
    for i in 1..=n1 {
        let mut cur: Vec<Vec<f64>> = Vec::with_capacity(n2 + 1);
        cur.push(vec![1.0]);
        for j in 1..=n2 {
            let mut counts = vec![0.0; i * j + 1];
            for (u, c) in cur[j - 1].iter().enumerate() {
                counts[u] += c;
            }
            for (u, c) in prev[j].iter().enumerate() {
                counts[u + j] += c;
            }
            cur.push(counts);
        }
        prev = cur;
    }
    prev.pop().unwrap_or_else(|| vec![1.0])
}

/// `C(n, k)` in floating point
pub fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k.min(n));
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Exact `P(U ≤ u)`
fn exact_u_cdf(n1: usize, n2: usize, u: f64) -> f64 {
    let counts = exact_u_distribution(n1, n2);
    let limit = (u + 1e-9).floor().max(0.0) as usize;
    let hits: f64 = counts.iter().take(limit + 1).sum();
    (hits / binomial(n1 + n2, n1)).min(1.0)
}

pub(crate) fn kruskal_wallis_impl(groups: &[&[f64]]) -> Result<KruskalWallisResult> {
    let summary = rank_groups(groups);
    let n = summary.total();
    if n == 0 {
        return Err(Error::EmptyData(
            "Kruskal-Wallis test requires at least one valid case".into(),
        ));
    }

    let non_empty = summary.counts.iter().filter(|&&c| c > 0).count();
    if non_empty < 2 {
        return Err(Error::InsufficientData(format!(
            "Kruskal-Wallis test requires at least two non-empty groups, found {}",
            non_empty
        )));
    }

    let nf = n as f64;
    let sum_term: f64 = summary
        .counts
        .iter()
        .zip(&summary.rank_sums)
        .filter(|(c, _)| **c > 0)
        .map(|(&c, &r)| r * r / c as f64)
        .sum();
    let h_uncorrected = 12.0 / (nf * (nf + 1.0)) * sum_term - 3.0 * (nf + 1.0);

    let tie_factor = summary.tie_factor();
    if !(tie_factor > 0.0) {
        return Err(Error::ZeroVariance(
            "all values are tied; the Kruskal-Wallis H statistic is undefined".into(),
        ));
    }
    let h = h_uncorrected / tie_factor;
    let df = non_empty - 1;
    let p_value = chi_square_upper(h, df as f64)?;

    let mean_ranks = (0..groups.len()).map(|g| summary.mean_rank(g)).collect();

    Ok(KruskalWallisResult {
        h,
        h_uncorrected,
        tie_factor,
        df,
        p_value,
        counts: summary.counts,
        rank_sums: summary.rank_sums,
        mean_ranks,
    })
}

pub(crate) fn kolmogorov_smirnov_impl(
    sample1: &[f64],
    sample2: &[f64],
) -> Result<KolmogorovSmirnovResult> {
    if sample1.is_empty() || sample2.is_empty() {
        return Err(Error::EmptyData(format!(
            "Kolmogorov-Smirnov test requires data in both samples (n1={}, n2={})",
            sample1.len(),
            sample2.len()
        )));
    }

    let mut sorted1 = sample1.to_vec();
    let mut sorted2 = sample2.to_vec();
    sorted1.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted2.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n1 = sorted1.len();
    let n2 = sorted2.len();
    let (mut i, mut j) = (0, 0);
    let mut d_pos: f64 = 0.0;
    let mut d_neg: f64 = 0.0;

    // step both ECDFs through the sorted union of observed values
    while i < n1 || j < n2 {
        let next = match (sorted1.get(i), sorted2.get(j)) {
            (Some(&a), Some(&b)) => a.min(b),
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };
        while i < n1 && sorted1[i] <= next {
            i += 1;
        }
        while j < n2 && sorted2[j] <= next {
            j += 1;
        }
        let diff = i as f64 / n1 as f64 - j as f64 / n2 as f64;
        d_pos = d_pos.max(diff);
        d_neg = d_neg.min(diff);
    }

    let d = d_pos.max(-d_neg);
    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let z = d * (n1f * n2f / (n1f + n2f)).sqrt();

    Ok(KolmogorovSmirnovResult {
        n1,
        n2,
        most_extreme_absolute: d,
        most_extreme_positive: d_pos,
        most_extreme_negative: d_neg,
        z,
        p_value: kolmogorov_p_value(z),
    })
}

/// Resolves the cut point to a concrete test value
pub fn test_value(values: &[f64], cut_point: &CutPoint) -> Result<f64> {
    if values.is_empty() {
        return Err(Error::EmptyData("runs test requires data".into()));
    }
    let value = match cut_point {
        CutPoint::Mean => values.iter().sum::<f64>() / values.len() as f64,
        CutPoint::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let n = sorted.len();
            if n % 2 == 0 {
                (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
            } else {
                sorted[n / 2]
            }
        }
        CutPoint::Mode => first_mode(values),
        CutPoint::Custom(v) => *v,
    };
    Ok(value)
}

/// Most frequent value; ties go to the value seen first in input order
fn first_mode(values: &[f64]) -> f64 {
    let mut seen: Vec<(f64, usize)> = Vec::new();
    for &v in values {
        match seen.iter_mut().find(|(x, _)| *x == v) {
            Some((_, count)) => *count += 1,
            None => seen.push((v, 1)),
        }
    }
    let mut best = seen[0];
    for &(v, count) in &seen[1..] {
        if count > best.1 {
            best = (v, count);
        }
    }
    best.0
}

pub(crate) fn runs_impl(values: &[f64], cut_point: &CutPoint) -> Result<RunsResult> {
    let cut = test_value(values, cut_point)?;

    let below = values.iter().filter(|&&v| v < cut).count();
    let above = values.len() - below;
    if below == 0 || above == 0 {
        return Err(Error::InsufficientData(format!(
            "all {} cases fall on one side of the test value {}; the runs test needs both",
            values.len(),
            cut
        )));
    }

    let runs = 1 + values
        .windows(2)
        .filter(|w| (w[0] < cut) != (w[1] < cut))
        .count();

    let (n1, n2) = (below as f64, above as f64);
    let n = n1 + n2;
    let expected_runs = 1.0 + 2.0 * n1 * n2 / n;
    let variance = 2.0 * n1 * n2 * (2.0 * n1 * n2 - n) / (n * n * (n - 1.0));
    if !(variance > 0.0) {
        return Err(Error::ZeroVariance(format!(
            "runs variance is zero for {} cases below and {} above the test value",
            below, above
        )));
    }

    let diff = runs as f64 - expected_runs;
    let corrected = if diff > 0.5 {
        diff - 0.5
    } else if diff < -0.5 {
        diff + 0.5
    } else {
        0.0
    };
    let z = corrected / variance.sqrt();

    Ok(RunsResult {
        test_value: cut,
        cases_below: below,
        cases_above: above,
        total: values.len(),
        runs,
        expected_runs,
        variance,
        z,
        p_value: normal_two_tailed(z)?,
    })
}
