//! Frequencies analysis: statistics table plus one frequency table per variable

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{parse_params, unknown_method, AnalysisContext, ComputeModule};
use crate::data::{format_number, ValidatedSample, Variable, VariableKind};
use crate::error::Result;
use crate::output::{AnalysisOutput, Cell, ColumnHeader, Row, Table};
use crate::stats::{self, FrequencyTable, FrequencyValue};

pub const MODULE_NAME: &str = "frequencies";
const METHODS: &[&str] = &["frequencies"];

fn default_true() -> bool {
    true
}

/// Parameters of `frequencies.frequencies`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequenciesParams {
    pub variables: Vec<Variable>,
    /// Case weights aligned with every variable
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Percentiles (0–100) listed in the statistics table
    #[serde(default)]
    pub percentiles: Vec<f64>,
    #[serde(default = "default_true")]
    pub statistics: bool,
    #[serde(default = "default_true", alias = "frequencyTables")]
    pub frequency_tables: bool,
}

pub struct FrequenciesModule {
    context: AnalysisContext,
}

impl FrequenciesModule {
    pub fn new(context: AnalysisContext) -> Self {
        FrequenciesModule { context }
    }
}

impl ComputeModule for FrequenciesModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn call(&mut self, method: &str, params: &Value) -> Result<AnalysisOutput> {
        match method {
            "frequencies" => {
                let params: FrequenciesParams = parse_params(MODULE_NAME, method, params)?;
                frequencies_output(&params, &self.context)
            }
            _ => Err(unknown_method(MODULE_NAME, method)),
        }
    }
}

/// Runs the frequency engine over every variable and lays out the tables
pub fn frequencies_output(params: &FrequenciesParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let weights = params.weights.as_deref();
    let tables: Vec<FrequencyTable> = params
        .variables
        .iter()
        .map(|v| stats::frequencies(v, weights))
        .collect::<Result<_>>()?;

    let mut output = Vec::with_capacity(tables.len() + 1);
    if params.statistics {
        output.push(statistics_table(params, &tables, ctx)?);
    }
    if params.frequency_tables {
        for table in &tables {
            output.push(frequency_table(table, ctx));
        }
    }
    Ok(AnalysisOutput::new(output))
}

fn statistics_table(
    params: &FrequenciesParams,
    tables: &[FrequencyTable],
    ctx: &AnalysisContext,
) -> Result<Table> {
    let headers = params
        .variables
        .iter()
        .map(|v| ColumnHeader::leaf(v.name.clone(), v.name.clone()))
        .collect();
    let mut table = Table::new("Statistics", headers);

    let mut valid = Row::leaf(["N", "Valid"]);
    let mut missing = Row::leaf(["N", "Missing"]);
    let mut mean = Row::leaf(["Mean"]);
    let mut median = Row::leaf(["Median"]);
    let mut mode = Row::leaf(["Mode"]);
    let mut std_dev = Row::leaf(["Std. Deviation"]);
    let mut minimum = Row::leaf(["Minimum"]);
    let mut maximum = Row::leaf(["Maximum"]);
    let mut percentile_rows: Vec<Row> = params
        .percentiles
        .iter()
        .map(|p| Row::leaf(["Percentiles".to_string(), format_number(*p)]))
        .collect();

    for (variable, freq) in params.variables.iter().zip(tables) {
        let key = variable.name.as_str();
        valid.insert(key, ctx.cell(freq.valid));
        missing.insert(key, ctx.cell(freq.missing));
        mode.insert(
            key,
            match freq.modes().first() {
                Some(FrequencyValue::Number(v)) => ctx.cell(*v),
                Some(other) => Cell::text(other.label()),
                None => Cell::Empty,
            },
        );

        if variable.kind == VariableKind::String || freq.rows.is_empty() {
            for row in [&mut mean, &mut median, &mut std_dev, &mut minimum, &mut maximum] {
                row.insert(key, Cell::Empty);
            }
            for row in percentile_rows.iter_mut() {
                row.insert(key, Cell::Empty);
            }
            continue;
        }

        let (values, weights): (Vec<f64>, Vec<f64>) = freq
            .rows
            .iter()
            .filter_map(|r| r.value.as_f64().map(|v| (v, r.frequency)))
            .unzip();
        let summary = stats::describe_weighted(&ValidatedSample::new(values, Some(weights))?)?;

        mean.insert(key, ctx.scaled(variable, Some(summary.mean)));
        median.insert(key, ctx.scaled(variable, summary.median));
        std_dev.insert(
            key,
            match variable.kind {
                VariableKind::Date => Cell::Empty,
                _ => ctx.optional(summary.std),
            },
        );
        minimum.insert(key, ctx.scaled(variable, Some(summary.min)));
        maximum.insert(key, ctx.scaled(variable, Some(summary.max)));

        for (row, p) in percentile_rows.iter_mut().zip(&params.percentiles) {
            row.insert(key, ctx.scaled(variable, freq.percentile(*p)?));
        }
    }

    table.push(Row::group(["N"], vec![valid, missing]));
    for row in [mean, median, mode, std_dev, minimum, maximum] {
        table.push(row);
    }
    if !percentile_rows.is_empty() {
        table.push(Row::group(["Percentiles"], percentile_rows));
    }
    Ok(table)
}

fn frequency_table(freq: &FrequencyTable, ctx: &AnalysisContext) -> Table {
    let headers = vec![
        ColumnHeader::leaf("Frequency", "frequency"),
        ColumnHeader::leaf("Percent", "percent"),
        ColumnHeader::leaf("Valid Percent", "valid_percent"),
        ColumnHeader::leaf("Cumulative Percent", "cumulative_percent"),
    ];
    let mut table = Table::new(freq.variable.clone(), headers);

    if !freq.rows.is_empty() {
        let mut children: Vec<Row> = freq
            .rows
            .iter()
            .map(|r| {
                Row::leaf(["Valid".to_string(), r.value.label()])
                    .cell("frequency", ctx.cell(r.frequency))
                    .cell("percent", ctx.cell(r.percent))
                    .cell("valid_percent", ctx.cell(r.valid_percent))
                    .cell("cumulative_percent", ctx.cell(r.cumulative_percent))
            })
            .collect();
        children.push(
            Row::leaf(["Valid", "Total"])
                .cell("frequency", ctx.cell(freq.valid))
                .cell("percent", ctx.cell(freq.valid / freq.total * 100.0))
                .cell("valid_percent", ctx.cell(100.0)),
        );
        table.push(Row::group(["Valid"], children));
    }

    if freq.missing > 0.0 {
        table.push(
            Row::leaf(["Missing"])
                .cell("frequency", ctx.cell(freq.missing))
                .cell("percent", ctx.cell(freq.missing / freq.total * 100.0)),
        );
    }

    let total_percent = if freq.total > 0.0 { 100.0 } else { 0.0 };
    table.push(
        Row::leaf(["Total"])
            .cell("frequency", ctx.cell(freq.total))
            .cell("percent", ctx.cell(total_percent)),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;
    use serde_json::json;

    #[test]
    fn test_weighted_frequency_table_layout() {
        let mut module = FrequenciesModule::new(AnalysisContext::default());
        let output = module
            .call(
                "frequencies",
                &json!({
                    "variables": [{ "name": "score", "values": [10, 20, 10, 30] }],
                    "weights": [1.5, 2, 0.5, 1],
                    "percentiles": [50]
                }),
            )
            .unwrap();

        let stats = output.table("Statistics").unwrap();
        let valid = stats.find_row(&["N", "Valid"]).unwrap();
        assert_eq!(valid.get("score"), Some(&Cell::Number(5.0)));
        // 10 and 20 tie for the mode; the smaller is reported
        assert_eq!(stats.find_row(&["Mode"]).unwrap().get("score"), Some(&Cell::Number(10.0)));
        assert_eq!(stats.find_row(&["Mean"]).unwrap().get("score"), Some(&Cell::Number(18.0)));

        let freq = output.table("score").unwrap();
        let ten = freq.find_row(&["Valid", "10"]).unwrap();
        assert_eq!(ten.get("frequency"), Some(&Cell::Number(2.0)));
        assert_eq!(ten.get("percent"), Some(&Cell::Number(40.0)));
        let thirty = freq.find_row(&["Valid", "30"]).unwrap();
        assert_eq!(thirty.get("cumulative_percent"), Some(&Cell::Number(100.0)));
        assert!(freq.find_row(&["Missing"]).is_none());
        assert_eq!(
            freq.find_row(&["Total"]).unwrap().get("frequency"),
            Some(&Cell::Number(5.0))
        );
    }

    #[test]
    fn test_missing_and_string_variables() {
        let params = FrequenciesParams {
            variables: vec![
                Variable::new("city", vec!["Oslo".into(), "Bergen".into(), CellValue::Missing])
                    .with_kind(VariableKind::String),
            ],
            weights: None,
            percentiles: vec![25.0],
            statistics: true,
            frequency_tables: true,
        };
        let output = frequencies_output(&params, &AnalysisContext::default()).unwrap();

        let stats = output.table("Statistics").unwrap();
        assert_eq!(stats.find_row(&["Mean"]).unwrap().get("city"), Some(&Cell::Empty));
        assert_eq!(
            stats.find_row(&["Mode"]).unwrap().get("city"),
            Some(&Cell::Text("Bergen".into()))
        );
        assert_eq!(
            stats.find_row(&["Percentiles", "25"]).unwrap().get("city"),
            Some(&Cell::Empty)
        );

        let freq = output.table("city").unwrap();
        let missing = freq.find_row(&["Missing"]).unwrap();
        assert_eq!(missing.get("frequency"), Some(&Cell::Number(1.0)));
        assert_eq!(missing.get("percent"), Some(&Cell::Number(33.333)));
    }

    #[test]
    fn test_mismatched_weights_fail() {
        let params = FrequenciesParams {
            variables: vec![Variable::numeric("x", &[1.0, 2.0])],
            weights: Some(vec![1.0]),
            percentiles: Vec::new(),
            statistics: true,
            frequency_tables: true,
        };
        assert!(frequencies_output(&params, &AnalysisContext::default()).is_err());
    }
}
