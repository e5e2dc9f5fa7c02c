//! Rank and tie engine
//!
//! Pools one or more samples, assigns mid-ranks and accumulates the per-group
//! rank sums and the tie-correction term used by the rank-based tests.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A value with its mid-rank in the pooled sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub value: f64,
    pub rank: f64,
    /// Originating group
    pub group: usize,
    /// Position within the originating group
    pub index: usize,
}

/// Ranks of a pooled sample and their per-group aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct RankSummary {
    /// Pooled values in ascending order
    pub ranked: Vec<RankedValue>,
    /// Number of values per group
    pub counts: Vec<usize>,
    /// Sum of ranks per group
    pub rank_sums: Vec<f64>,
    /// Sizes of tie groups with more than one member
    pub tie_sizes: Vec<usize>,
    /// `Σ(t³ − t)` over tie groups
    pub tie_correction: f64,
}

impl RankSummary {
    /// Pooled sample size
    pub fn total(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Mean rank of group `g`, `None` for an empty group
    pub fn mean_rank(&self, g: usize) -> Option<f64> {
        match self.counts.get(g) {
            Some(&n) if n > 0 => Some(self.rank_sums[g] / n as f64),
            _ => None,
        }
    }

    /// Ranks of group `g` in its original order
    pub fn group_ranks(&self, g: usize) -> Vec<f64> {
        let n = self.counts.get(g).copied().unwrap_or(0);
        let mut ranks = vec![0.0; n];
        for rv in self.ranked.iter().filter(|rv| rv.group == g) {
            ranks[rv.index] = rv.rank;
        }
        ranks
    }

    /// Tie-correction denominator `1 − Σ(t³−t)/(N³−N)`
    pub fn tie_factor(&self) -> f64 {
        let n = self.total() as f64;
        if n < 2.0 {
            return 1.0;
        }
        1.0 - self.tie_correction / (n * n * n - n)
    }
}

/// Ranks the pooled values of `groups` with the mid-rank rule
pub fn rank_groups(groups: &[&[f64]]) -> RankSummary {
    let mut ranked: Vec<RankedValue> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, values)| {
            values.iter().enumerate().map(move |(index, &value)| RankedValue {
                value,
                rank: 0.0,
                group: g,
                index,
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

    let mut counts = vec![0usize; groups.len()];
    let mut rank_sums = vec![0.0; groups.len()];
    let mut tie_sizes = Vec::new();
    let mut tie_correction = 0.0;

    let n = ranked.len();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && ranked[j].value == ranked[i].value {
            j += 1;
        }

        // positions i..j hold ranks i+1..=j
        let rank = (i + 1 + j) as f64 / 2.0;
        for rv in &mut ranked[i..j] {
            rv.rank = rank;
            counts[rv.group] += 1;
            rank_sums[rv.group] += rank;
        }

        let t = j - i;
        if t > 1 {
            let tf = t as f64;
            tie_sizes.push(t);
            tie_correction += tf * tf * tf - tf;
        }
        i = j;
    }

    RankSummary {
        ranked,
        counts,
        rank_sums,
        tie_sizes,
        tie_correction,
    }
}

/// Mid-ranks of a single sample, aligned with the input
pub fn mid_ranks(values: &[f64]) -> Vec<f64> {
    rank_groups(&[values]).group_ranks(0)
}
