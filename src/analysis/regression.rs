//! Linear regression module

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{parse_params, unknown_method, AnalysisContext, ComputeModule};
use crate::data::Variable;
use crate::error::{Error, Result};
use crate::output::{AnalysisOutput, Cell, ColumnHeader, Row, Table};
use crate::stats::{self, RegressionModel, ResidualStatistics};

pub const MODULE_NAME: &str = "regression";
const METHODS: &[&str] = &["linear"];

/// Parameters of `regression.linear`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearParams {
    pub dependent: Variable,
    pub independent: Vec<Variable>,
}

pub struct RegressionModule {
    context: AnalysisContext,
}

impl RegressionModule {
    pub fn new(context: AnalysisContext) -> Self {
        RegressionModule { context }
    }
}

impl ComputeModule for RegressionModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn call(&mut self, method: &str, params: &Value) -> Result<AnalysisOutput> {
        match method {
            "linear" => {
                let params: LinearParams = parse_params(MODULE_NAME, method, params)?;
                linear_output(&params, &self.context)
            }
            _ => Err(unknown_method(MODULE_NAME, method)),
        }
    }
}

/// Listwise deletion: keeps rows where every variable has a valid value
fn complete_cases(params: &LinearParams) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
    let n = params.dependent.len();
    for variable in &params.independent {
        if variable.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                actual: variable.len(),
            });
        }
    }

    let mut y = Vec::with_capacity(n);
    let mut x: Vec<Vec<f64>> = vec![Vec::with_capacity(n); params.independent.len()];
    'rows: for row in 0..n {
        let Some(dep) = params.dependent.numeric_at(row)? else {
            continue;
        };
        let mut values = Vec::with_capacity(params.independent.len());
        for variable in &params.independent {
            match variable.numeric_at(row)? {
                Some(v) => values.push(v),
                None => continue 'rows,
            }
        }
        y.push(dep);
        for (column, v) in x.iter_mut().zip(values) {
            column.push(v);
        }
    }
    Ok((y, x))
}

pub fn linear_output(params: &LinearParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let (y, x) = complete_cases(params)?;
    let columns: Vec<&[f64]> = x.iter().map(Vec::as_slice).collect();
    let names: Vec<String> = params.independent.iter().map(|v| v.name.clone()).collect();
    let model = stats::linear_regression_named(&y, &columns, &names, ctx.singular_epsilon)?;

    Ok(AnalysisOutput::new(vec![
        model_summary(&model, ctx),
        anova(&model, ctx),
        coefficients(&model, ctx),
        residual_statistics(&model, ctx),
    ]))
}

fn model_summary(model: &RegressionModel, ctx: &AnalysisContext) -> Table {
    let mut table = Table::new(
        "Model Summary",
        vec![
            ColumnHeader::leaf("R", "r"),
            ColumnHeader::leaf("R Square", "r_squared"),
            ColumnHeader::leaf("Adjusted R Square", "adj_r_squared"),
            ColumnHeader::leaf("Std. Error of the Estimate", "std_error"),
            ColumnHeader::leaf("Durbin-Watson", "durbin_watson"),
        ],
    );
    table.push(
        Row::leaf(["1"])
            .cell("r", ctx.cell(model.r))
            .cell("r_squared", ctx.cell(model.r_squared))
            .cell("adj_r_squared", ctx.cell(model.adj_r_squared))
            .cell("std_error", ctx.cell(model.std_error_estimate))
            .cell("durbin_watson", ctx.optional(model.durbin_watson)),
    );
    table
}

fn anova(model: &RegressionModel, ctx: &AnalysisContext) -> Table {
    let mut table = Table::new(
        "ANOVA",
        vec![
            ColumnHeader::leaf("Sum of Squares", "ss"),
            ColumnHeader::leaf("df", "df"),
            ColumnHeader::leaf("Mean Square", "ms"),
            ColumnHeader::leaf("F", "f"),
            ColumnHeader::leaf("Sig.", "sig"),
        ],
    );
    table.push(Row::group(
        ["1"],
        vec![
            Row::leaf(["1", "Regression"])
                .cell("ss", ctx.cell(model.ss_regression))
                .cell("df", Cell::from(model.df_regression))
                .cell("ms", ctx.cell(model.ms_regression))
                .cell("f", ctx.optional(model.f_statistic))
                .cell("sig", ctx.optional(model.f_p_value)),
            Row::leaf(["1", "Residual"])
                .cell("ss", ctx.cell(model.ss_residual))
                .cell("df", Cell::from(model.df_residual))
                .cell("ms", ctx.cell(model.ms_residual)),
            Row::leaf(["1", "Total"])
                .cell("ss", ctx.cell(model.ss_total))
                .cell("df", Cell::from(model.n - 1)),
        ],
    ));
    table
}

fn coefficients(model: &RegressionModel, ctx: &AnalysisContext) -> Table {
    let mut table = Table::new(
        "Coefficients",
        vec![
            ColumnHeader::group(
                "Unstandardized Coefficients",
                vec![ColumnHeader::leaf("B", "b"), ColumnHeader::leaf("Std. Error", "std_error")],
            ),
            ColumnHeader::group("Standardized Coefficients", vec![ColumnHeader::leaf("Beta", "beta")]),
            ColumnHeader::leaf("t", "t"),
            ColumnHeader::leaf("Sig.", "sig"),
            ColumnHeader::group(
                "Collinearity Statistics",
                vec![ColumnHeader::leaf("Tolerance", "tolerance"), ColumnHeader::leaf("VIF", "vif")],
            ),
        ],
    );

    let rows = model
        .coefficients
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let row = Row::leaf(["1".to_string(), c.name.clone()])
                .cell("b", ctx.cell(c.estimate))
                .cell("std_error", ctx.cell(c.std_error))
                .cell("beta", ctx.optional(c.beta))
                .cell("t", ctx.optional(c.t))
                .cell("sig", ctx.optional(c.p_value));
            match i.checked_sub(1).and_then(|p| model.collinearity.get(p)) {
                Some(diag) => row
                    .cell("tolerance", ctx.cell(diag.tolerance))
                    .cell("vif", ctx.cell(diag.vif)),
                None => row,
            }
        })
        .collect();
    table.push(Row::group(["1"], rows));
    table
}

fn residual_statistics(model: &RegressionModel, ctx: &AnalysisContext) -> Table {
    let mut table = Table::new(
        "Residuals Statistics",
        vec![
            ColumnHeader::leaf("Minimum", "min"),
            ColumnHeader::leaf("Maximum", "max"),
            ColumnHeader::leaf("Mean", "mean"),
            ColumnHeader::leaf("Std. Deviation", "std_dev"),
            ColumnHeader::leaf("N", "n"),
        ],
    );

    let summary = &model.residual_summary;
    let series: [(&str, Option<&ResidualStatistics>); 4] = [
        ("Predicted Value", Some(&summary.predicted)),
        ("Residual", Some(&summary.residual)),
        ("Std. Predicted Value", summary.std_predicted.as_ref()),
        ("Std. Residual", summary.std_residual.as_ref()),
    ];
    for (label, stats) in series {
        let row = Row::leaf([label]);
        table.push(match stats {
            Some(s) => row
                .cell("min", ctx.cell(s.min))
                .cell("max", ctx.cell(s.max))
                .cell("mean", ctx.cell(s.mean))
                .cell("std_dev", ctx.cell(s.std_dev))
                .cell("n", Cell::from(s.n)),
            None => row
                .cell("min", Cell::Empty)
                .cell("max", Cell::Empty)
                .cell("mean", Cell::Empty)
                .cell("std_dev", Cell::Empty)
                .cell("n", Cell::from(model.n)),
        });
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;
    use serde_json::json;

    #[test]
    fn test_linear_tables() {
        let mut module = RegressionModule::new(AnalysisContext::default());
        let output = module
            .call(
                "linear",
                &json!({
                    "dependent": { "name": "y", "values": [1, 3, 2, 5, 4, 6] },
                    "independent": [{ "name": "x", "values": [1, 2, 3, 4, 5, 6] }]
                }),
            )
            .unwrap();

        let titles: Vec<&str> = output.tables.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Model Summary", "ANOVA", "Coefficients", "Residuals Statistics"]);

        let coef = output.table("Coefficients").unwrap();
        let x = coef.find_row(&["1", "x"]).unwrap();
        assert_eq!(x.get("tolerance"), Some(&Cell::Number(1.0)));
        assert_eq!(x.get("vif"), Some(&Cell::Number(1.0)));
        let constant = coef.find_row(&["1", "(Constant)"]).unwrap();
        assert_eq!(constant.get("beta"), Some(&Cell::Empty));

        let anova = output.table("ANOVA").unwrap();
        assert_eq!(anova.find_row(&["1", "Total"]).unwrap().get("df"), Some(&Cell::Number(5.0)));
    }

    #[test]
    fn test_listwise_deletion() {
        let params = LinearParams {
            dependent: Variable::new(
                "y",
                vec![
                    CellValue::Number(1.0),
                    CellValue::Missing,
                    CellValue::Number(2.0),
                    CellValue::Number(4.0),
                    CellValue::Number(3.0),
                ],
            ),
            independent: vec![Variable::new(
                "x",
                vec![
                    CellValue::Number(1.0),
                    CellValue::Number(2.0),
                    CellValue::Number(3.0),
                    CellValue::Missing,
                    CellValue::Number(5.0),
                ],
            )],
        };
        let (y, x) = complete_cases(&params).unwrap();
        assert_eq!(y, vec![1.0, 2.0, 3.0]);
        assert_eq!(x, vec![vec![1.0, 3.0, 5.0]]);
        // three cases for one predictor: n > p + 1 holds
        assert!(linear_output(&params, &AnalysisContext::default()).is_ok());
    }

    #[test]
    fn test_non_numeric_dependent() {
        let params = LinearParams {
            dependent: Variable::new("y", vec!["a".into(), "b".into(), "c".into()]),
            independent: vec![Variable::numeric("x", &[1.0, 2.0, 3.0])],
        };
        assert!(matches!(
            linear_output(&params, &AnalysisContext::default()),
            Err(Error::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_collinear_design_is_reported() {
        let params = LinearParams {
            dependent: Variable::numeric("y", &[1.0, 3.0, 2.0, 5.0, 4.0]),
            independent: vec![
                Variable::numeric("x1", &[1.0, 2.0, 3.0, 4.0, 5.0]),
                Variable::numeric("x2", &[2.0, 4.0, 6.0, 8.0, 10.0]),
            ],
        };
        assert!(matches!(
            linear_output(&params, &AnalysisContext::default()),
            Err(Error::SingularMatrix(_))
        ));
    }
}
