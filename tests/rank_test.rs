mod common;

use common::assert_close;
use statsuite::stats::rank::{mid_ranks, rank_groups};

#[test]
fn test_three_way_tie_shares_mean_rank() {
    let ranks = mid_ranks(&[1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 7.0]);
    assert_eq!(ranks, vec![1.0, 2.0, 3.0, 5.0, 5.0, 5.0, 7.0]);
}

#[test]
fn test_rank_sums_cover_pool() {
    let a = [3.0, 1.0, 4.0, 1.0];
    let b = [5.0, 9.0, 2.0, 6.0, 5.0];
    let summary = rank_groups(&[&a, &b]);

    let n = summary.total() as f64;
    let total: f64 = summary.rank_sums.iter().sum();
    assert_close(total, n * (n + 1.0) / 2.0, 1e-12);
    assert_eq!(summary.counts, vec![4, 5]);

    // two pairs of ties: 1,1 and 5,5
    assert_eq!(summary.tie_sizes, vec![2, 2]);
    assert_close(summary.tie_correction, 12.0, 1e-12);
}

#[test]
fn test_group_ranks_keep_input_order() {
    let a = [30.0, 10.0];
    let b = [20.0];
    let summary = rank_groups(&[&a, &b]);
    assert_eq!(summary.group_ranks(0), vec![3.0, 1.0]);
    assert_eq!(summary.group_ranks(1), vec![2.0]);
    assert_close(summary.mean_rank(0).unwrap(), 2.0, 1e-12);
}

#[test]
fn test_empty_pool() {
    let empty: [f64; 0] = [];
    let summary = rank_groups(&[&empty, &empty]);
    assert!(summary.is_empty());
    assert_eq!(summary.rank_sums, vec![0.0, 0.0]);
    assert_eq!(summary.tie_correction, 0.0);
    assert_eq!(summary.mean_rank(0), None);
    assert_eq!(summary.tie_factor(), 1.0);
}
