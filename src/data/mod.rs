//! Input data model
//!
//! Columns arrive from the host as raw cells aligned by row position. This
//! module turns them into validated numeric samples and grouped views.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A raw cell as supplied by the data store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// System-missing check: null, blank text or a non-finite number
    pub fn is_system_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(v) => !v.is_finite(),
        }
    }

    /// Compares two cells as category codes
    pub fn matches(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => (a - b).abs() < 1e-9,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Number(a), CellValue::Text(b)) | (CellValue::Text(b), CellValue::Number(a)) => {
                b.trim().parse::<f64>().map(|b| (a - b).abs() < 1e-9).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Display label used in row headers
    pub fn label(&self) -> String {
        match self {
            CellValue::Number(v) => format_number(*v),
            CellValue::Text(s) => s.clone(),
            CellValue::Missing => "Missing".to_string(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Missing)
    }
}

/// Measurement kind of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    #[default]
    Numeric,
    String,
    Date,
}

/// A named column extracted from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub kind: VariableKind,
    pub values: Vec<CellValue>,
    /// User-defined missing codes, matched against numeric cells
    #[serde(default)]
    pub missing_values: Vec<f64>,
}

impl Variable {
    /// Creates a numeric variable
    pub fn new<S: Into<String>>(name: S, values: Vec<CellValue>) -> Self {
        Variable {
            name: name.into(),
            kind: VariableKind::Numeric,
            values,
            missing_values: Vec::new(),
        }
    }

    /// Creates a numeric variable with no missing cells
    pub fn numeric<S: Into<String>>(name: S, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|&v| CellValue::Number(v)).collect())
    }

    pub fn with_kind(mut self, kind: VariableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_missing_values(mut self, codes: Vec<f64>) -> Self {
        self.missing_values = codes;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether row `i` is system- or user-missing
    pub fn is_missing(&self, i: usize) -> bool {
        match self.values.get(i) {
            None => true,
            Some(cell) if cell.is_system_missing() => true,
            Some(CellValue::Number(v)) => self.missing_values.iter().any(|m| (m - v).abs() < 1e-9),
            Some(_) => false,
        }
    }

    /// Numeric value of row `i`, `None` when missing
    pub fn numeric_at(&self, i: usize) -> Result<Option<f64>> {
        if self.is_missing(i) {
            return Ok(None);
        }
        match &self.values[i] {
            CellValue::Number(v) => Ok(Some(*v)),
            CellValue::Text(s) => {
                let text = s.trim();
                if self.kind == VariableKind::Date {
                    if let Some(secs) = parse_date(text) {
                        return Ok(Some(secs as f64));
                    }
                }
                text.parse::<f64>().map(Some).map_err(|_| Error::NonNumeric {
                    variable: self.name.clone(),
                    value: s.clone(),
                })
            }
            CellValue::Missing => Ok(None),
        }
    }

    /// Coerces every row to a number
    pub fn to_numeric(&self) -> Result<Vec<Option<f64>>> {
        (0..self.len()).map(|i| self.numeric_at(i)).collect()
    }
}

/// Parses `yyyy-mm-dd` or `dd-mm-yyyy` into epoch seconds at midnight UTC
pub fn parse_date(text: &str) -> Option<i64> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d-%m-%Y"))
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Formats epoch seconds as `dd-mm-yyyy`
pub fn format_date(epoch_secs: f64) -> String {
    DateTime::from_timestamp(epoch_secs.round() as i64, 0)
        .map(|dt| dt.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| format_number(epoch_secs))
}

/// Formats a number without a trailing `.0` for integral values
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// A column after missing-value filtering and numeric coercion
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSample {
    values: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl ValidatedSample {
    /// Validates values and optional case weights
    pub fn new(values: Vec<f64>, weights: Option<Vec<f64>>) -> Result<Self> {
        if let Some(w) = &weights {
            if w.len() != values.len() {
                return Err(Error::LengthMismatch {
                    expected: values.len(),
                    actual: w.len(),
                });
            }
            validate_weights(w)?;
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite value {} at position {}",
                values[pos], pos
            )));
        }
        Ok(ValidatedSample { values, weights })
    }

    /// Builds a sample from a variable, dropping missing rows
    pub fn from_variable(variable: &Variable, weights: Option<&[f64]>) -> Result<Self> {
        if let Some(w) = weights {
            if w.len() != variable.len() {
                return Err(Error::LengthMismatch {
                    expected: variable.len(),
                    actual: w.len(),
                });
            }
            validate_weights(w)?;
        }

        let mut values = Vec::with_capacity(variable.len());
        let mut kept_weights = weights.map(|_| Vec::with_capacity(variable.len()));
        for i in 0..variable.len() {
            if let Some(v) = variable.numeric_at(i)? {
                values.push(v);
                if let (Some(kept), Some(w)) = (kept_weights.as_mut(), weights) {
                    kept.push(w[i]);
                }
            }
        }
        Self::new(values, kept_weights)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Weight of case `i`, 1 when unweighted
    pub fn weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map(|w| w[i]).unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of case weights (the case count when unweighted)
    pub fn total_weight(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().sum(),
            None => self.values.len() as f64,
        }
    }

    /// Iterates `(value, weight)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, &v)| (v, self.weight(i)))
    }
}

pub(crate) fn validate_weights(weights: &[f64]) -> Result<()> {
    match weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
        Some(index) => Err(Error::InvalidWeight {
            index,
            value: weights[index],
        }),
        None => Ok(()),
    }
}

/// How cases are assigned to groups by the grouping variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDefinition {
    /// Exact category values, one group each
    Values(Vec<CellValue>),
    /// Integer codes in `min..=max`; only codes present in the data form groups
    Range { min: i64, max: i64 },
}

/// One group of a [`GroupedSample`]
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub indices: Vec<usize>,
}

/// A validated sample partitioned into groups by index lists
#[derive(Debug, Clone)]
pub struct GroupedSample {
    sample: ValidatedSample,
    groups: Vec<Group>,
}

impl GroupedSample {
    /// Partitions `test` by the values of `grouping`
    pub fn new(test: &Variable, grouping: &Variable, definition: &GroupDefinition) -> Result<Self> {
        if test.len() != grouping.len() {
            return Err(Error::LengthMismatch {
                expected: test.len(),
                actual: grouping.len(),
            });
        }

        let mut values = Vec::new();
        let groups = match definition {
            GroupDefinition::Values(codes) => {
                if codes.is_empty() {
                    return Err(Error::InvalidInput("no group values defined".into()));
                }
                let mut groups: Vec<Group> = codes
                    .iter()
                    .map(|c| Group {
                        label: c.label(),
                        indices: Vec::new(),
                    })
                    .collect();
                for row in 0..test.len() {
                    let Some(value) = grouped_value(test, grouping, row)? else {
                        continue;
                    };
                    if let Some(g) = codes.iter().position(|c| c.matches(&grouping.values[row])) {
                        groups[g].indices.push(values.len());
                        values.push(value);
                    }
                }
                groups
            }
            GroupDefinition::Range { min, max } => {
                if min > max {
                    return Err(Error::InvalidInput(format!(
                        "group range minimum {} exceeds maximum {}",
                        min, max
                    )));
                }
                // only codes that occur become groups
                let mut observed: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
                for row in 0..test.len() {
                    let Some(value) = grouped_value(test, grouping, row)? else {
                        continue;
                    };
                    if let Some(code) = range_code(&grouping.values[row], *min, *max) {
                        observed.entry(code).or_default().push(values.len());
                        values.push(value);
                    }
                }
                observed
                    .into_iter()
                    .map(|(code, indices)| Group {
                        label: format_number(code as f64),
                        indices,
                    })
                    .collect()
            }
        };

        Ok(GroupedSample {
            sample: ValidatedSample::new(values, None)?,
            groups,
        })
    }

    pub fn sample(&self) -> &ValidatedSample {
        &self.sample
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Values belonging to group `g`
    pub fn group_values(&self, g: usize) -> Vec<f64> {
        self.groups[g]
            .indices
            .iter()
            .map(|&i| self.sample.values()[i])
            .collect()
    }

    /// Total number of grouped cases
    pub fn len(&self) -> usize {
        self.sample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample.is_empty()
    }
}

/// Test value of `row` when both it and its grouping cell are present
fn grouped_value(test: &Variable, grouping: &Variable, row: usize) -> Result<Option<f64>> {
    if grouping.is_missing(row) {
        return Ok(None);
    }
    test.numeric_at(row)
}

/// Integer grouping code of `cell` when it lies in `min..=max`
fn range_code(cell: &CellValue, min: i64, max: i64) -> Option<i64> {
    let value = match cell {
        CellValue::Number(v) => *v,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        CellValue::Missing => return None,
    };
    let code = value.round();
    if (value - code).abs() >= 1e-9 || code < min as f64 || code > max as f64 {
        return None;
    }
    Some(code as i64)
}
