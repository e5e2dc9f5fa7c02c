//! Nonparametric tests module: Mann-Whitney, Kruskal-Wallis,
//! two-sample Kolmogorov-Smirnov and runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{parse_params, unknown_method, AnalysisContext, ComputeModule};
use crate::data::{CellValue, GroupDefinition, GroupedSample, ValidatedSample, Variable};
use crate::error::{Error, Result};
use crate::output::{AnalysisOutput, Cell, ColumnHeader, Row, Table};
use crate::stats::{self, CutPoint};

pub const MODULE_NAME: &str = "nonparametric";
const METHODS: &[&str] = &["mann_whitney", "kruskal_wallis", "kolmogorov_smirnov", "runs"];

/// Parameters of the two independent samples tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoGroupParams {
    #[serde(alias = "testVariables")]
    pub test_variables: Vec<Variable>,
    #[serde(alias = "groupingColumn", alias = "groupingVariable")]
    pub grouping_variable: Variable,
    #[serde(alias = "group1Value")]
    pub group1: CellValue,
    #[serde(alias = "group2Value")]
    pub group2: CellValue,
}

impl TwoGroupParams {
    fn definition(&self) -> GroupDefinition {
        GroupDefinition::Values(vec![self.group1.clone(), self.group2.clone()])
    }
}

/// Parameters of the k independent samples test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KGroupParams {
    #[serde(alias = "testVariables")]
    pub test_variables: Vec<Variable>,
    #[serde(alias = "groupingColumn", alias = "groupingVariable")]
    pub grouping_variable: Variable,
    /// Lowest grouping code (inclusive)
    pub min: i64,
    /// Highest grouping code (inclusive)
    pub max: i64,
}

/// Parameters of the runs test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsParams {
    #[serde(alias = "testVariables")]
    pub test_variables: Vec<Variable>,
    #[serde(default, alias = "cutPoint")]
    pub cut_point: CutPoint,
}

pub struct NonparametricModule {
    context: AnalysisContext,
}

impl NonparametricModule {
    pub fn new(context: AnalysisContext) -> Self {
        NonparametricModule { context }
    }
}

impl ComputeModule for NonparametricModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn call(&mut self, method: &str, params: &Value) -> Result<AnalysisOutput> {
        let ctx = &self.context;
        match method {
            "mann_whitney" => mann_whitney_output(&parse_params(MODULE_NAME, method, params)?, ctx),
            "kruskal_wallis" => kruskal_wallis_output(&parse_params(MODULE_NAME, method, params)?, ctx),
            "kolmogorov_smirnov" => {
                kolmogorov_smirnov_output(&parse_params(MODULE_NAME, method, params)?, ctx)
            }
            "runs" => runs_output(&parse_params(MODULE_NAME, method, params)?, ctx),
            _ => Err(unknown_method(MODULE_NAME, method)),
        }
    }
}

/// Groups every test variable, skipping variables without grouped cases
fn grouped_variables<'a>(
    test_variables: &'a [Variable],
    grouping: &Variable,
    definition: &GroupDefinition,
) -> Result<Vec<(&'a Variable, GroupedSample)>> {
    let mut grouped = Vec::with_capacity(test_variables.len());
    for variable in test_variables {
        let sample = GroupedSample::new(variable, grouping, definition)?;
        if sample.is_empty() {
            log::debug!(
                "Skipping '{}': no valid cases in the selected groups of '{}'",
                variable.name,
                grouping.name
            );
            continue;
        }
        grouped.push((variable, sample));
    }
    Ok(grouped)
}

/// Keeps a test result, or drops the variable when its data cannot support the test
fn computable<R>(variable: &Variable, result: Result<R>) -> Result<Option<R>> {
    match result {
        Ok(result) => Ok(Some(result)),
        Err(err @ (Error::EmptyData(_) | Error::InsufficientData(_) | Error::ZeroVariance(_))) => {
            log::debug!("Skipping '{}': {}", variable.name, err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn variable_columns<'a, I: IntoIterator<Item = &'a Variable>>(variables: I) -> Vec<ColumnHeader> {
    variables
        .into_iter()
        .map(|v| ColumnHeader::leaf(v.name.clone(), v.name.clone()))
        .collect()
}

pub fn mann_whitney_output(params: &TwoGroupParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let grouped = grouped_variables(&params.test_variables, &params.grouping_variable, &params.definition())?;
    let mut computed = Vec::with_capacity(grouped.len());
    for (variable, sample) in &grouped {
        let result = stats::mann_whitney(sample.group_values(0), sample.group_values(1));
        if let Some(result) = computable(variable, result)? {
            computed.push((*variable, sample, result));
        }
    }

    let mut ranks = Table::new(
        "Ranks",
        vec![
            ColumnHeader::leaf("N", "n"),
            ColumnHeader::leaf("Mean Rank", "mean_rank"),
            ColumnHeader::leaf("Sum of Ranks", "rank_sum"),
        ],
    );
    let mut statistics = Table::new("Test Statistics", variable_columns(computed.iter().map(|(v, _, _)| *v)));
    let mut u_row = Row::leaf(["Mann-Whitney U"]);
    let mut w_row = Row::leaf(["Wilcoxon W"]);
    let mut z_row = Row::leaf(["Z"]);
    let mut asymp_row = Row::leaf(["Asymp. Sig. (2-tailed)"]);
    let mut exact_row = Row::leaf(["Exact Sig. [2*(1-tailed Sig.)]"]);

    for (variable, sample, result) in &computed {
        let labels = [&sample.groups()[0].label, &sample.groups()[1].label];
        let name = variable.name.clone();

        ranks.push(Row::group(
            [name.clone()],
            vec![
                Row::leaf([name.clone(), labels[0].clone()])
                    .cell("n", Cell::from(result.n1))
                    .cell("mean_rank", ctx.cell(result.mean_rank1))
                    .cell("rank_sum", ctx.cell(result.rank_sum1)),
                Row::leaf([name.clone(), labels[1].clone()])
                    .cell("n", Cell::from(result.n2))
                    .cell("mean_rank", ctx.cell(result.mean_rank2))
                    .cell("rank_sum", ctx.cell(result.rank_sum2)),
                Row::leaf([name.clone(), "Total".to_string()]).cell("n", Cell::from(result.n1 + result.n2)),
            ],
        ));

        let key = variable.name.as_str();
        u_row.insert(key, ctx.cell(result.u));
        w_row.insert(key, ctx.cell(result.w));
        z_row.insert(key, ctx.cell(result.z));
        asymp_row.insert(key, ctx.cell(result.asymptotic_p));
        exact_row.insert(key, ctx.optional(result.exact_p));
    }

    for row in [u_row, w_row, z_row, asymp_row, exact_row] {
        statistics.push(row);
    }
    Ok(AnalysisOutput::new(vec![ranks, statistics]))
}

pub fn kruskal_wallis_output(params: &KGroupParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let definition = GroupDefinition::Range {
        min: params.min,
        max: params.max,
    };
    let grouped = grouped_variables(&params.test_variables, &params.grouping_variable, &definition)?;
    let mut computed = Vec::with_capacity(grouped.len());
    for (variable, sample) in &grouped {
        let groups: Vec<Vec<f64>> = (0..sample.groups().len()).map(|g| sample.group_values(g)).collect();
        let slices: Vec<&[f64]> = groups.iter().map(Vec::as_slice).collect();
        if let Some(result) = computable(variable, stats::kruskal_wallis(&slices))? {
            computed.push((*variable, sample, result));
        }
    }

    let mut ranks = Table::new(
        "Ranks",
        vec![ColumnHeader::leaf("N", "n"), ColumnHeader::leaf("Mean Rank", "mean_rank")],
    );
    let mut statistics = Table::new("Test Statistics", variable_columns(computed.iter().map(|(v, _, _)| *v)));
    let mut h_row = Row::leaf(["Kruskal-Wallis H"]);
    let mut df_row = Row::leaf(["df"]);
    let mut p_row = Row::leaf(["Asymp. Sig."]);

    for (variable, sample, result) in &computed {
        let name = variable.name.clone();
        let mut children: Vec<Row> = sample
            .groups()
            .iter()
            .enumerate()
            .filter(|(g, _)| result.counts[*g] > 0)
            .map(|(g, group)| {
                Row::leaf([name.clone(), group.label.clone()])
                    .cell("n", Cell::from(result.counts[g]))
                    .cell("mean_rank", ctx.optional(result.mean_ranks[g]))
            })
            .collect();
        children.push(Row::leaf([name.clone(), "Total".to_string()]).cell("n", Cell::from(sample.len())));
        ranks.push(Row::group([name], children));

        let key = variable.name.as_str();
        h_row.insert(key, ctx.cell(result.h));
        df_row.insert(key, Cell::from(result.df));
        p_row.insert(key, ctx.cell(result.p_value));
    }

    for row in [h_row, df_row, p_row] {
        statistics.push(row);
    }
    Ok(AnalysisOutput::new(vec![ranks, statistics]))
}

pub fn kolmogorov_smirnov_output(params: &TwoGroupParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let grouped = grouped_variables(&params.test_variables, &params.grouping_variable, &params.definition())?;
    let mut computed = Vec::with_capacity(grouped.len());
    for (variable, sample) in &grouped {
        let result = stats::kolmogorov_smirnov(sample.group_values(0), sample.group_values(1));
        if let Some(result) = computable(variable, result)? {
            computed.push((*variable, sample, result));
        }
    }

    let mut frequencies = Table::new("Frequencies", vec![ColumnHeader::leaf("N", "n")]);
    let mut statistics = Table::new("Test Statistics", variable_columns(computed.iter().map(|(v, _, _)| *v)));
    let mut absolute = Row::leaf(["Most Extreme Differences", "Absolute"]);
    let mut positive = Row::leaf(["Most Extreme Differences", "Positive"]);
    let mut negative = Row::leaf(["Most Extreme Differences", "Negative"]);
    let mut z_row = Row::leaf(["Kolmogorov-Smirnov Z"]);
    let mut p_row = Row::leaf(["Asymp. Sig. (2-tailed)"]);

    for (variable, sample, result) in &computed {
        let name = variable.name.clone();
        frequencies.push(Row::group(
            [name.clone()],
            vec![
                Row::leaf([name.clone(), sample.groups()[0].label.clone()]).cell("n", Cell::from(result.n1)),
                Row::leaf([name.clone(), sample.groups()[1].label.clone()]).cell("n", Cell::from(result.n2)),
                Row::leaf([name.clone(), "Total".to_string()]).cell("n", Cell::from(result.n1 + result.n2)),
            ],
        ));

        let key = variable.name.as_str();
        absolute.insert(key, ctx.cell(result.most_extreme_absolute));
        positive.insert(key, ctx.cell(result.most_extreme_positive));
        negative.insert(key, ctx.cell(result.most_extreme_negative));
        z_row.insert(key, ctx.cell(result.z));
        p_row.insert(key, ctx.cell(result.p_value));
    }

    statistics.push(Row::group(["Most Extreme Differences"], vec![absolute, positive, negative]));
    statistics.push(z_row);
    statistics.push(p_row);
    Ok(AnalysisOutput::new(vec![frequencies, statistics]))
}

pub fn runs_output(params: &RunsParams, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
    let mut samples = Vec::with_capacity(params.test_variables.len());
    for variable in &params.test_variables {
        let sample = ValidatedSample::from_variable(variable, None)?;
        if sample.is_empty() {
            log::debug!("Skipping '{}': no valid cases for the runs test", variable.name);
            continue;
        }
        let result = stats::runs_test(sample.values(), &params.cut_point);
        if let Some(result) = computable(variable, result)? {
            samples.push((variable, result));
        }
    }

    let title = format!("Runs Test ({})", params.cut_point.label());
    let mut table = Table::new(title, variable_columns(samples.iter().map(|(v, _)| *v)));
    let mut value_row = Row::leaf(["Test Value"]);
    let mut below_row = Row::leaf(["Cases < Test Value"]);
    let mut above_row = Row::leaf(["Cases >= Test Value"]);
    let mut total_row = Row::leaf(["Total Cases"]);
    let mut runs_row = Row::leaf(["Number of Runs"]);
    let mut z_row = Row::leaf(["Z"]);
    let mut p_row = Row::leaf(["Asymp. Sig. (2-tailed)"]);

    for (variable, result) in &samples {
        let key = variable.name.as_str();
        value_row.insert(key, ctx.cell(result.test_value));
        below_row.insert(key, Cell::from(result.cases_below));
        above_row.insert(key, Cell::from(result.cases_above));
        total_row.insert(key, Cell::from(result.total));
        runs_row.insert(key, Cell::from(result.runs));
        z_row.insert(key, ctx.cell(result.z));
        p_row.insert(key, ctx.cell(result.p_value));
    }

    for row in [value_row, below_row, above_row, total_row, runs_row, z_row, p_row] {
        table.push(row);
    }
    Ok(AnalysisOutput::new(vec![table]))
}
