//! Descriptives analysis

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{parse_params, unknown_method, AnalysisContext, ComputeModule};
use crate::data::{validate_weights, ValidatedSample, Variable, VariableKind};
use crate::error::{Error, Result};
use crate::output::{AnalysisOutput, Cell, ColumnHeader, Row, Table};
use crate::stats;

pub const MODULE_NAME: &str = "descriptives";
const METHODS: &[&str] = &["descriptives"];

/// Parameters of `descriptives.descriptives`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptivesParams {
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
}

pub struct DescriptivesModule {
    context: AnalysisContext,
}

impl DescriptivesModule {
    pub fn new(context: AnalysisContext) -> Self {
        DescriptivesModule { context }
    }
}

impl ComputeModule for DescriptivesModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn call(&mut self, method: &str, params: &Value) -> Result<AnalysisOutput> {
        match method {
            "descriptives" => {
                let params: DescriptivesParams = parse_params(MODULE_NAME, method, params)?;
                descriptives_output(&params, &self.context)
            }
            _ => Err(unknown_method(MODULE_NAME, method)),
        }
    }
}

pub fn descriptives_output(params: &DescriptivesParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    if let Some(v) = params.variables.iter().find(|v| v.kind == VariableKind::String) {
        return Err(Error::InvalidInput(format!(
            "descriptive statistics need a numeric or date variable, '{}' is a string variable",
            v.name
        )));
    }
    let weights = params.weights.as_deref();
    if let Some(w) = weights {
        validate_weights(w)?;
    }

    let headers = vec![
        ColumnHeader::leaf("N", "n"),
        ColumnHeader::leaf("Range", "range"),
        ColumnHeader::leaf("Minimum", "min"),
        ColumnHeader::leaf("Maximum", "max"),
        ColumnHeader::leaf("Sum", "sum"),
        ColumnHeader::group(
            "Mean",
            vec![
                ColumnHeader::leaf("Statistic", "mean"),
                ColumnHeader::leaf("Std. Error", "mean_se"),
            ],
        ),
        ColumnHeader::leaf("Std. Deviation", "std"),
        ColumnHeader::leaf("Variance", "variance"),
    ];
    let mut table = Table::new("Descriptive Statistics", headers);

    for variable in &params.variables {
        let sample = ValidatedSample::from_variable(variable, weights)?;
        let row = Row::leaf([variable.name.clone()]);
        let row = match stats::describe_weighted(&sample) {
            Ok(d) => row
                .cell("n", ctx.cell(d.n))
                .cell("range", ctx.cell(d.range))
                .cell("min", ctx.scaled(variable, Some(d.min)))
                .cell("max", ctx.scaled(variable, Some(d.max)))
                .cell("sum", ctx.cell(d.sum))
                .cell("mean", ctx.scaled(variable, Some(d.mean)))
                .cell("mean_se", ctx.optional(d.std_error))
                .cell("std", ctx.optional(d.std))
                .cell("variance", ctx.optional(d.variance)),
            Err(Error::EmptyData(_)) => {
                log::debug!("No valid cases for '{}'; reporting N = 0", variable.name);
                ["range", "min", "max", "sum", "mean", "mean_se", "std", "variance"]
                    .into_iter()
                    .fold(row.cell("n", ctx.cell(0.0)), |row, key| row.cell(key, Cell::Empty))
            }
            Err(e) => return Err(e),
        };
        table.push(row);
    }

    table.push(Row::leaf(["Valid N (listwise)"]).cell("n", ctx.cell(listwise_n(params)?)));
    Ok(AnalysisOutput::new(vec![table]))
}

/// Weighted count of rows valid for every variable
fn listwise_n(params: &DescriptivesParams) -> Result<f64> {
    let rows = params.variables.iter().map(Variable::len).max().unwrap_or(0);
    let mut n = 0.0;
    for row in 0..rows {
        let mut complete = true;
        for variable in &params.variables {
            if variable.numeric_at(row)?.is_none() {
                complete = false;
                break;
            }
        }
        if complete {
            n += params
                .weights
                .as_ref()
                .and_then(|w| w.get(row).copied())
                .unwrap_or(1.0);
        }
    }
    Ok(n)
}
