//! Weighted frequency and percentile engine

use std::cmp::Ordering;

use crate::data::{format_date, format_number, validate_weights, CellValue, ValidatedSample, Variable, VariableKind};
use crate::error::{Error, Result};
use crate::stats::{FrequencyRow, FrequencyTable, FrequencyValue};

/// Cumulative percent at the last row is forced to 100 from this floor up
pub const CUMULATIVE_FLOOR: f64 = 99.0;

impl FrequencyValue {
    /// Display label; dates are shown as `dd-mm-yyyy`
    pub fn label(&self) -> String {
        match self {
            FrequencyValue::Number(v) => format_number(*v),
            FrequencyValue::Date(secs) => format_date(*secs),
            FrequencyValue::Text(s) => s.clone(),
        }
    }

    /// Numeric position for numbers and dates
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FrequencyValue::Number(v) | FrequencyValue::Date(v) => Some(*v),
            FrequencyValue::Text(_) => None,
        }
    }

    fn sort_cmp(&self, other: &FrequencyValue) -> Ordering {
        match (self, other) {
            (FrequencyValue::Text(a), FrequencyValue::Text(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }
}

impl FrequencyTable {
    /// Value(s) with the largest frequency, in table order
    pub fn modes(&self) -> Vec<FrequencyValue> {
        let max = self.rows.iter().map(|r| r.frequency).fold(0.0, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        self.rows
            .iter()
            .filter(|r| r.frequency == max)
            .map(|r| r.value.clone())
            .collect()
    }

    /// Weighted-average percentile; `None` when there are no valid cases
    pub fn percentile(&self, p: f64) -> Result<Option<f64>> {
        if self.kind == VariableKind::String {
            return Err(Error::InvalidInput(format!(
                "percentiles are not defined for string variable '{}'",
                self.variable
            )));
        }
        let pairs: Vec<(f64, f64)> = self
            .rows
            .iter()
            .filter_map(|r| r.value.as_f64().map(|v| (v, r.frequency)))
            .collect();
        percentile_sorted(&pairs, self.valid, p)
    }
}

/// Builds the frequency table of a variable with optional case weights
pub(crate) fn frequencies_impl(variable: &Variable, weights: Option<&[f64]>) -> Result<FrequencyTable> {
    if let Some(w) = weights {
        if w.len() != variable.len() {
            return Err(Error::LengthMismatch {
                expected: variable.len(),
                actual: w.len(),
            });
        }
        validate_weights(w)?;
    }

    let mut observed: Vec<(FrequencyValue, f64)> = Vec::with_capacity(variable.len());
    let mut missing = 0.0;

    for row in 0..variable.len() {
        let weight = weights.map(|w| w[row]).unwrap_or(1.0);
        if weight == 0.0 {
            continue;
        }
        if variable.is_missing(row) {
            missing += weight;
            continue;
        }
        let value = match variable.kind {
            VariableKind::String => FrequencyValue::Text(match &variable.values[row] {
                CellValue::Text(s) => s.clone(),
                other => other.label(),
            }),
            VariableKind::Numeric => match variable.numeric_at(row)? {
                Some(v) => FrequencyValue::Number(v),
                None => continue,
            },
            VariableKind::Date => match variable.numeric_at(row)? {
                Some(v) => FrequencyValue::Date(v),
                None => continue,
            },
        };
        observed.push((value, weight));
    }

    observed.sort_by(|a, b| a.0.sort_cmp(&b.0));

    let mut grouped: Vec<(FrequencyValue, f64)> = Vec::new();
    for (value, weight) in observed {
        match grouped.last_mut() {
            Some((last, total)) if *last == value => *total += weight,
            _ => grouped.push((value, weight)),
        }
    }

    let valid: f64 = grouped.iter().map(|(_, w)| w).sum();
    let total = valid + missing;

    let mut rows = Vec::with_capacity(grouped.len());
    let mut cumulative = 0.0;
    let last = grouped.len().saturating_sub(1);
    for (i, (value, frequency)) in grouped.into_iter().enumerate() {
        let valid_percent = frequency / valid * 100.0;
        cumulative += valid_percent;
        if i == last && cumulative >= CUMULATIVE_FLOOR {
            cumulative = 100.0;
        }
        rows.push(FrequencyRow {
            value,
            frequency,
            percent: frequency / total * 100.0,
            valid_percent,
            cumulative_percent: cumulative,
        });
    }

    Ok(FrequencyTable {
        variable: variable.name.clone(),
        kind: variable.kind,
        rows,
        valid,
        missing,
        total,
    })
}

/// Distinct values of a sample with their summed weights, ascending
pub fn aggregate(sample: &ValidatedSample) -> Vec<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = sample.iter().filter(|(_, w)| *w > 0.0).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut grouped: Vec<(f64, f64)> = Vec::with_capacity(pairs.len());
    for (value, weight) in pairs {
        match grouped.last_mut() {
            Some((last, total)) if *last == value => *total += weight,
            _ => grouped.push((value, weight)),
        }
    }
    grouped
}

/// Weighted-average percentile over ascending `(value, weight)` pairs
///
/// The rank position is `(p/100)·(W+1)`; a fractional position interpolates
/// between the two bracketing order statistics.
pub fn percentile_sorted(pairs: &[(f64, f64)], total_weight: f64, p: f64) -> Result<Option<f64>> {
    if !(0.0..=100.0).contains(&p) {
        return Err(Error::InvalidInput(format!(
            "percentile must be between 0 and 100, got {}",
            p
        )));
    }
    if pairs.is_empty() || total_weight <= 0.0 {
        return Ok(None);
    }

    let first = pairs[0].0;
    let last = pairs[pairs.len() - 1].0;
    let position = p / 100.0 * (total_weight + 1.0);
    let k = position.floor();
    let fraction = position - k;

    if k < 1.0 {
        return Ok(Some(first));
    }
    if k >= total_weight {
        return Ok(Some(last));
    }

    let lower = order_statistic(pairs, k).unwrap_or(last);
    let upper = order_statistic(pairs, k + 1.0).unwrap_or(last);
    Ok(Some((1.0 - fraction) * lower + fraction * upper))
}

/// Smallest value whose cumulative weight reaches `position`
fn order_statistic(pairs: &[(f64, f64)], position: f64) -> Option<f64> {
    let mut cumulative = 0.0;
    for &(value, weight) in pairs {
        cumulative += weight;
        if cumulative >= position - 1e-9 {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_values(table: &FrequencyTable) -> Vec<(String, f64)> {
        table.rows.iter().map(|r| (r.value.label(), r.frequency)).collect()
    }

    #[test]
    fn test_weighted_frequencies() {
        let var = Variable::numeric("x", &[10.0, 20.0, 10.0, 30.0]);
        let table = frequencies_impl(&var, Some(&[1.5, 2.0, 0.5, 1.0])).unwrap();

        assert_eq!(
            row_values(&table),
            vec![("10".to_string(), 2.0), ("20".to_string(), 2.0), ("30".to_string(), 1.0)]
        );
        assert_eq!(table.valid, 5.0);
        assert_eq!(table.missing, 0.0);
        assert_eq!(table.total, 5.0);
        assert_eq!(table.rows[2].cumulative_percent, 100.0);
        assert_eq!(table.modes().len(), 2);
    }

    #[test]
    fn test_missing_counts() {
        let var = Variable::new(
            "x",
            vec![CellValue::Number(1.0), CellValue::Missing, CellValue::Number(1.0), CellValue::Number(2.0)],
        );
        let table = frequencies_impl(&var, None).unwrap();
        assert_eq!(table.valid, 3.0);
        assert_eq!(table.missing, 1.0);
        assert_eq!(table.total, 4.0);
        assert!((table.rows[0].percent - 50.0).abs() < 1e-12);
        assert!((table.rows[0].valid_percent - 200.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_string_and_date_ordering() {
        let strings = Variable::new("s", vec!["b".into(), "B".into(), "a".into(), "b".into()])
            .with_kind(VariableKind::String);
        let table = frequencies_impl(&strings, None).unwrap();
        let labels: Vec<String> = table.rows.iter().map(|r| r.value.label()).collect();
        assert_eq!(labels, vec!["B", "a", "b"]);
        assert!(table.percentile(50.0).is_err());

        let dates = Variable::new("d", vec!["2024-03-01".into(), "01-01-2024".into()])
            .with_kind(VariableKind::Date);
        let table = frequencies_impl(&dates, None).unwrap();
        let labels: Vec<String> = table.rows.iter().map(|r| r.value.label()).collect();
        assert_eq!(labels, vec!["01-01-2024", "01-03-2024"]);
    }

    #[test]
    fn test_empty_input_is_well_formed() {
        let var = Variable::new("x", Vec::new());
        let table = frequencies_impl(&var, None).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.total, 0.0);
        assert!(table.modes().is_empty());
        assert_eq!(table.percentile(50.0).unwrap(), None);
    }

    #[test]
    fn test_weighted_average_percentiles() {
        let pairs: Vec<(f64, f64)> = (1..=5).map(|v| (v as f64, 1.0)).collect();
        assert_eq!(percentile_sorted(&pairs, 5.0, 25.0).unwrap(), Some(1.5));
        assert_eq!(percentile_sorted(&pairs, 5.0, 50.0).unwrap(), Some(3.0));
        assert_eq!(percentile_sorted(&pairs, 5.0, 75.0).unwrap(), Some(4.5));
        assert_eq!(percentile_sorted(&pairs, 5.0, 0.0).unwrap(), Some(1.0));
        assert_eq!(percentile_sorted(&pairs, 5.0, 100.0).unwrap(), Some(5.0));
        assert!(percentile_sorted(&pairs, 5.0, 101.0).is_err());
    }

    #[test]
    fn test_percentile_uses_weights() {
        // weights expand to 1,1,1,2 → median position 2.5 lies between 1 and 1
        let pairs = vec![(1.0, 3.0), (2.0, 1.0)];
        assert_eq!(percentile_sorted(&pairs, 4.0, 50.0).unwrap(), Some(1.0));
        // 80th: position 4 → value at cumulative weight 4
        assert_eq!(percentile_sorted(&pairs, 4.0, 80.0).unwrap(), Some(2.0));
    }

    #[test]
    fn test_aggregate() {
        let sample = ValidatedSample::new(vec![3.0, 1.0, 3.0], Some(vec![1.0, 2.0, 0.5])).unwrap();
        assert_eq!(aggregate(&sample), vec![(1.0, 2.0), (3.0, 1.5)]);
    }
}
