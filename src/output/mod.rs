//! Structured analysis output
//!
//! Every analysis returns an [`AnalysisOutput`]: a list of tables with
//! (possibly nested) column headers and rows addressed by a row-header path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Numeric cell; non-finite values are spelled out since JSON cannot carry them
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else if value.is_nan() {
            Cell::Text("NaN".into())
        } else if value > 0.0 {
            Cell::Text("Infinity".into())
        } else {
            Cell::Text("-Infinity".into())
        }
    }

    /// Numeric cell rounded to `decimals` places
    pub fn rounded(value: f64, decimals: u32) -> Self {
        Cell::number(round_to(value, decimals))
    }

    /// Rounded cell, or empty when the value is undefined
    pub fn optional(value: Option<f64>, decimals: u32) -> Self {
        value.map(|v| Cell::rounded(v, decimals)).unwrap_or(Cell::Empty)
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Cell::Text(text.into())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

/// Rounds to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Column header, optionally grouping child headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub header: String,
    /// Cell key for leaf headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ColumnHeader>,
}

impl ColumnHeader {
    /// Leaf header whose cells are stored under `key`
    pub fn leaf<S: Into<String>, K: Into<String>>(header: S, key: K) -> Self {
        ColumnHeader {
            header: header.into(),
            key: Some(key.into()),
            children: Vec::new(),
        }
    }

    /// Header spanning `children`
    pub fn group<S: Into<String>>(header: S, children: Vec<ColumnHeader>) -> Self {
        ColumnHeader {
            header: header.into(),
            key: None,
            children,
        }
    }

    /// Leaf keys in left-to-right order
    pub fn leaf_keys(&self) -> Vec<&str> {
        match &self.key {
            Some(key) if self.children.is_empty() => vec![key.as_str()],
            _ => self.children.iter().flat_map(|c| c.leaf_keys()).collect(),
        }
    }
}

/// A table row: either a leaf with cells or a group of nested rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    Group {
        #[serde(rename = "rowHeader")]
        row_header: Vec<String>,
        children: Vec<Row>,
    },
    Leaf {
        #[serde(rename = "rowHeader")]
        row_header: Vec<String>,
        cells: BTreeMap<String, Cell>,
    },
}

impl Row {
    /// Empty leaf row at the given header path
    pub fn leaf<I, S>(row_header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row::Leaf {
            row_header: row_header.into_iter().map(Into::into).collect(),
            cells: BTreeMap::new(),
        }
    }

    /// Group row at the given header path
    pub fn group<I, S>(row_header: I, children: Vec<Row>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row::Group {
            row_header: row_header.into_iter().map(Into::into).collect(),
            children,
        }
    }

    /// Adds a cell to a leaf row; no-op on group rows
    pub fn cell<K: Into<String>>(mut self, key: K, value: Cell) -> Self {
        if let Row::Leaf { cells, .. } = &mut self {
            cells.insert(key.into(), value);
        }
        self
    }

    /// In-place variant of [`Row::cell`]
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Cell) {
        if let Row::Leaf { cells, .. } = self {
            cells.insert(key.into(), value);
        }
    }

    pub fn row_header(&self) -> &[String] {
        match self {
            Row::Group { row_header, .. } | Row::Leaf { row_header, .. } => row_header,
        }
    }

    /// Cell lookup on a leaf row
    pub fn get(&self, key: &str) -> Option<&Cell> {
        match self {
            Row::Leaf { cells, .. } => cells.get(key),
            Row::Group { .. } => None,
        }
    }
}

/// A titled result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub title: String,
    pub column_headers: Vec<ColumnHeader>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new<S: Into<String>>(title: S, column_headers: Vec<ColumnHeader>) -> Self {
        Table {
            title: title.into(),
            column_headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Finds a top-level or nested leaf row by its full header path
    pub fn find_row(&self, path: &[&str]) -> Option<&Row> {
        fn walk<'a>(rows: &'a [Row], path: &[&str]) -> Option<&'a Row> {
            for row in rows {
                let header: Vec<&str> = row.row_header().iter().map(String::as_str).collect();
                if header == path {
                    return Some(row);
                }
                if let Row::Group { children, .. } = row {
                    if let Some(found) = walk(children, path) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(&self.rows, path)
    }
}

/// Result of one analysis call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub tables: Vec<Table>,
}

impl AnalysisOutput {
    pub fn new(tables: Vec<Table>) -> Self {
        AnalysisOutput { tables }
    }

    /// First table with the given title
    pub fn table(&self, title: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.title == title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(-0.0004, 3), -0.0);
        assert!(round_to(f64::INFINITY, 3).is_infinite());
    }

    #[test]
    fn test_non_finite_cells_are_spelled_out() {
        assert_eq!(Cell::number(f64::INFINITY), Cell::Text("Infinity".into()));
        assert_eq!(Cell::optional(None, 3), Cell::Empty);
    }

    #[test]
    fn test_nested_headers_and_rows() {
        let headers = vec![
            ColumnHeader::leaf("N", "n"),
            ColumnHeader::group(
                "Percentiles",
                vec![ColumnHeader::leaf("25", "p25"), ColumnHeader::leaf("75", "p75")],
            ),
        ];
        let mut table = Table::new("Statistics", headers);
        table.push(Row::group(
            ["score"],
            vec![Row::leaf(["score", "Valid"]).cell("n", Cell::from(4usize))],
        ));

        assert_eq!(table.column_headers[1].leaf_keys(), vec!["p25", "p75"]);
        let row = table.find_row(&["score", "Valid"]).unwrap();
        assert_eq!(row.get("n").and_then(Cell::as_f64), Some(4.0));
    }

    #[test]
    fn test_serialized_shape() {
        let mut table = Table::new("T", vec![ColumnHeader::leaf("Value", "value")]);
        table.push(Row::leaf(["a"]).cell("value", Cell::Number(1.5)));
        let json = serde_json::to_value(AnalysisOutput::new(vec![table])).unwrap();

        assert_eq!(json["tables"][0]["columnHeaders"][0]["key"], "value");
        assert_eq!(json["tables"][0]["rows"][0]["rowHeader"][0], "a");
        assert_eq!(json["tables"][0]["rows"][0]["cells"]["value"], 1.5);
    }
}
