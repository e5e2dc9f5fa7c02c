mod common;

use common::{assert_close, lcg_values};
use statsuite::error::Error;
use statsuite::stats::nonparametric::{exact_computable, exact_u_distribution, binomial};
use statsuite::stats::{self, CutPoint};

#[test]
fn test_mann_whitney_complete_separation() {
    let a = [1.0, 2.0, 3.0];
    let b = [4.0, 5.0, 6.0];
    let result = stats::mann_whitney(a, b).unwrap();

    assert_eq!(result.u, 0.0);
    assert_eq!(result.w, 6.0);
    assert!(result.z < 0.0);
    assert!(result.asymptotic_p < 0.05);

    // one of C(6,3) = 20 arrangements reaches U = 0
    assert_close(result.exact_p_one_tailed.unwrap(), 0.05, 1e-12);
    assert_close(result.exact_p.unwrap(), 0.1, 1e-12);
}

#[test]
fn test_mann_whitney_is_symmetric() {
    let a = lcg_values(12, 7);
    let b: Vec<f64> = lcg_values(15, 11).iter().map(|v| v + 0.2).collect();

    let ab = stats::mann_whitney(&a, &b).unwrap();
    let ba = stats::mann_whitney(&b, &a).unwrap();
    assert_close(ab.u, ba.u, 1e-12);
    assert_close(ab.w, ba.w, 1e-12);
    assert_close(ab.asymptotic_p, ba.asymptotic_p, 1e-12);
    assert_close(ab.exact_p.unwrap(), ba.exact_p.unwrap(), 1e-12);
    assert_close(ab.rank_sum1 + ab.rank_sum2, 27.0 * 28.0 / 2.0, 1e-9);
}

#[test]
fn test_mann_whitney_exact_threshold() {
    assert!(exact_computable(19, 20));
    assert!(!exact_computable(20, 20));

    let a = lcg_values(25, 3);
    let b = lcg_values(25, 5);
    let result = stats::mann_whitney(&a, &b).unwrap();
    assert!(result.exact_p.is_none());
    assert!(result.asymptotic_p > 0.0 && result.asymptotic_p <= 1.0);
}

#[test]
fn test_exact_distribution_sums_to_arrangements() {
    for (n1, n2) in [(1, 1), (3, 4), (6, 5), (10, 10)] {
        let counts = exact_u_distribution(n1, n2);
        assert_eq!(counts.len(), n1 * n2 + 1);
        let total: f64 = counts.iter().sum();
        assert_close(total, binomial(n1 + n2, n1), 1e-6);
        // the U distribution is symmetric about n1·n2/2
        for u in 0..counts.len() {
            assert_eq!(counts[u], counts[counts.len() - 1 - u]);
        }
    }
}

#[test]
fn test_mann_whitney_empty_group() {
    let empty: [f64; 0] = [];
    assert!(matches!(
        stats::mann_whitney([1.0, 2.0], empty),
        Err(Error::EmptyData(_))
    ));
}

#[test]
fn test_kruskal_wallis_tie_factor() {
    let g1 = [1.0, 1.0];
    let g2 = [2.0, 2.0, 3.0];
    let result = stats::kruskal_wallis(&[&g1, &g2]).unwrap();

    // two ties of size 2: 1 − 12/120
    assert_close(result.tie_factor, 0.9, 1e-12);
    assert_close(result.h_uncorrected, 3.0, 1e-12);
    assert_close(result.h, result.h_uncorrected / 0.9, 1e-12);
    assert_eq!(result.df, 1);
    assert_eq!(result.rank_sums, vec![3.0, 12.0]);
}

#[test]
fn test_kruskal_wallis_empty_group_excluded_from_df() {
    let g1 = [1.0, 2.0, 3.0];
    let g2: [f64; 0] = [];
    let g3 = [4.0, 5.0, 6.0];
    let result = stats::kruskal_wallis(&[&g1, &g2, &g3]).unwrap();
    assert_eq!(result.df, 1);
    assert_eq!(result.mean_ranks, vec![Some(2.0), None, Some(5.0)]);

    assert!(matches!(
        stats::kruskal_wallis(&[&g1, &g2]),
        Err(Error::InsufficientData(_))
    ));
}

#[test]
fn test_kruskal_wallis_all_tied() {
    let g1 = [2.0, 2.0];
    let g2 = [2.0, 2.0];
    assert!(matches!(
        stats::kruskal_wallis(&[&g1, &g2]),
        Err(Error::ZeroVariance(_))
    ));
}

#[test]
fn test_kolmogorov_smirnov_separated() {
    let result = stats::kolmogorov_smirnov([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]).unwrap();
    assert_close(result.most_extreme_absolute, 1.0, 1e-12);
    assert_close(result.most_extreme_positive, 1.0, 1e-12);
    assert_close(result.most_extreme_negative, 0.0, 1e-12);
    assert_close(result.z, 1.5f64.sqrt(), 1e-12);
    assert_close(result.p_value, 0.0996, 1e-3);
}

#[test]
fn test_kolmogorov_smirnov_identical_samples() {
    let data = [3.0, 1.0, 2.0];
    let result = stats::kolmogorov_smirnov(data, data).unwrap();
    assert_eq!(result.most_extreme_absolute, 0.0);
    assert_eq!(result.p_value, 1.0);
}

#[test]
fn test_runs_alternating_sequence() {
    let seq = [1.0, 5.0, 1.0, 5.0, 1.0, 5.0];
    let result = stats::runs_test(seq, &CutPoint::Mean).unwrap();
    assert_eq!(result.test_value, 3.0);
    assert_eq!(result.runs, 6);
    assert_eq!((result.cases_below, result.cases_above), (3, 3));
    assert_close(result.expected_runs, 4.0, 1e-12);
    assert_close(result.variance, 1.2, 1e-12);
    assert_close(result.z, 1.5 / 1.2f64.sqrt(), 1e-12);
}

#[test]
fn test_runs_cut_points() {
    let seq = [2.0, 7.0, 7.0, 1.0, 9.0, 2.0];
    assert_eq!(stats::runs_test(seq, &CutPoint::Median).unwrap().test_value, 4.5);
    // 2 and 7 both occur twice; 2 comes first
    assert_eq!(stats::runs_test(seq, &CutPoint::Mode).unwrap().test_value, 2.0);
    assert_eq!(stats::runs_test(seq, &CutPoint::Custom(8.0)).unwrap().test_value, 8.0);

    assert!(matches!(
        stats::runs_test(seq, &CutPoint::Custom(0.0)),
        Err(Error::InsufficientData(_))
    ));
}
