//! Statistics module
//!
//! Rank-based nonparametric tests, weighted frequencies and percentiles,
//! descriptive statistics and OLS regression with diagnostics. The functions
//! here are the public entry points; the work happens in the submodules.

pub mod descriptive;
pub mod distributions;
pub mod frequency;
pub mod nonparametric;
pub mod rank;
pub mod regression;

use serde::{Deserialize, Serialize};

use crate::data::{ValidatedSample, Variable, VariableKind};
use crate::error::{Error, Result};
use crate::linalg::DEFAULT_SINGULAR_EPSILON;

/// Result of the Mann-Whitney U test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MannWhitneyResult {
    pub n1: usize,
    pub n2: usize,
    pub rank_sum1: f64,
    pub rank_sum2: f64,
    pub mean_rank1: f64,
    pub mean_rank2: f64,
    /// `min(U1, U2)`
    pub u: f64,
    /// Wilcoxon W: rank sum of the group that produced `u`
    pub w: f64,
    pub z: f64,
    /// Two-tailed normal-approximation p-value
    pub asymptotic_p: f64,
    /// Two-tailed exact p-value, `None` above the cost threshold
    pub exact_p: Option<f64>,
    /// Exact `P(U ≤ u)`
    pub exact_p_one_tailed: Option<f64>,
    /// `Σ(t³ − t)` over tie groups in the pooled sample
    pub tie_correction: f64,
}

/// Performs the Mann-Whitney U test on two independent samples
///
/// # Example
/// ```rust
/// use statsuite::stats;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![4.0, 5.0, 6.0];
/// let result = stats::mann_whitney(&a, &b).unwrap();
/// assert_eq!(result.u, 0.0);
/// assert!(result.exact_p.is_some());
/// ```
pub fn mann_whitney<T: AsRef<[f64]>, U: AsRef<[f64]>>(sample1: T, sample2: U) -> Result<MannWhitneyResult> {
    nonparametric::mann_whitney_impl(sample1.as_ref(), sample2.as_ref())
}

/// Result of the Kruskal-Wallis H test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KruskalWallisResult {
    /// Tie-corrected H
    pub h: f64,
    pub h_uncorrected: f64,
    /// `1 − Σ(t³−t)/(N³−N)`
    pub tie_factor: f64,
    /// Non-empty groups minus one
    pub df: usize,
    pub p_value: f64,
    pub counts: Vec<usize>,
    pub rank_sums: Vec<f64>,
    /// `None` for groups without cases
    pub mean_ranks: Vec<Option<f64>>,
}

/// Performs the Kruskal-Wallis H test over k groups
///
/// Empty groups are carried in the per-group vectors but do not count towards
/// the degrees of freedom.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<KruskalWallisResult> {
    nonparametric::kruskal_wallis_impl(groups)
}

/// Result of the two-sample Kolmogorov-Smirnov test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KolmogorovSmirnovResult {
    pub n1: usize,
    pub n2: usize,
    /// `max |F1 − F2|`
    pub most_extreme_absolute: f64,
    /// `max (F1 − F2)`, never negative
    pub most_extreme_positive: f64,
    /// `min (F1 − F2)`, never positive
    pub most_extreme_negative: f64,
    /// Kolmogorov-Smirnov Z
    pub z: f64,
    /// Asymptotic two-tailed p-value
    pub p_value: f64,
}

pub fn kolmogorov_smirnov<T: AsRef<[f64]>, U: AsRef<[f64]>>(
    sample1: T,
    sample2: U,
) -> Result<KolmogorovSmirnovResult> {
    nonparametric::kolmogorov_smirnov_impl(sample1.as_ref(), sample2.as_ref())
}

/// Test value used by the runs test to dichotomize a sequence
///
/// Serialized as `"mean"`, `"median"`, `"mode"` or a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "CutPointRepr", into = "CutPointRepr")]
pub enum CutPoint {
    Mean,
    #[default]
    Median,
    Mode,
    Custom(f64),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CutPointRepr {
    Named(String),
    Value(f64),
}

impl TryFrom<CutPointRepr> for CutPoint {
    type Error = String;

    fn try_from(repr: CutPointRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            CutPointRepr::Value(v) if v.is_finite() => Ok(CutPoint::Custom(v)),
            CutPointRepr::Value(v) => Err(format!("cut point must be finite, got {}", v)),
            CutPointRepr::Named(name) => match name.to_ascii_lowercase().as_str() {
                "mean" => Ok(CutPoint::Mean),
                "median" => Ok(CutPoint::Median),
                "mode" => Ok(CutPoint::Mode),
                other => other
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(CutPoint::Custom)
                    .ok_or_else(|| format!("unknown cut point '{}'", name)),
            },
        }
    }
}

impl From<CutPoint> for CutPointRepr {
    fn from(cut: CutPoint) -> Self {
        match cut {
            CutPoint::Mean => CutPointRepr::Named("mean".into()),
            CutPoint::Median => CutPointRepr::Named("median".into()),
            CutPoint::Mode => CutPointRepr::Named("mode".into()),
            CutPoint::Custom(v) => CutPointRepr::Value(v),
        }
    }
}

impl CutPoint {
    /// Label used in table headers
    pub fn label(&self) -> &'static str {
        match self {
            CutPoint::Mean => "Mean",
            CutPoint::Median => "Median",
            CutPoint::Mode => "Mode",
            CutPoint::Custom(_) => "Custom",
        }
    }
}

/// Result of the Wald-Wolfowitz runs test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunsResult {
    pub test_value: f64,
    /// Cases strictly below the test value
    pub cases_below: usize,
    /// Cases at or above the test value
    pub cases_above: usize,
    pub total: usize,
    pub runs: usize,
    pub expected_runs: f64,
    pub variance: f64,
    /// Continuity-corrected Z
    pub z: f64,
    pub p_value: f64,
}

/// Performs the runs test for randomness of a sequence
///
/// # Example
/// ```rust
/// use statsuite::stats::{self, CutPoint};
///
/// let seq = vec![1.0, 5.0, 1.0, 5.0, 1.0, 5.0];
/// let result = stats::runs_test(&seq, &CutPoint::Mean).unwrap();
/// assert_eq!(result.runs, 6);
/// ```
pub fn runs_test<T: AsRef<[f64]>>(values: T, cut_point: &CutPoint) -> Result<RunsResult> {
    nonparametric::runs_impl(values.as_ref(), cut_point)
}

/// A distinct observed value in a frequency table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FrequencyValue {
    Number(f64),
    Text(String),
    /// Epoch seconds
    Date(f64),
}

/// One row of a frequency table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub value: FrequencyValue,
    /// Sum of case weights for this value
    pub frequency: f64,
    /// Share of all cases, missing included
    pub percent: f64,
    /// Share of valid cases
    pub valid_percent: f64,
    pub cumulative_percent: f64,
}

/// Weighted frequency distribution of one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub variable: String,
    pub kind: VariableKind,
    /// Distinct valid values in ascending order
    pub rows: Vec<FrequencyRow>,
    pub valid: f64,
    pub missing: f64,
    pub total: f64,
}

/// Builds the weighted frequency table of a variable
///
/// Cases with zero weight are ignored. Missing cells (system or user-defined)
/// are counted under `missing`.
///
/// # Example
/// ```rust
/// use statsuite::data::Variable;
/// use statsuite::stats;
///
/// let var = Variable::numeric("x", &[10.0, 20.0, 10.0, 30.0]);
/// let table = stats::frequencies(&var, Some(&[1.5, 2.0, 0.5, 1.0])).unwrap();
/// assert_eq!(table.valid, 5.0);
/// assert_eq!(table.rows[0].frequency, 2.0);
/// ```
pub fn frequencies(variable: &Variable, weights: Option<&[f64]>) -> Result<FrequencyTable> {
    frequency::frequencies_impl(variable, weights)
}

/// Weighted-average percentile of unweighted data
///
/// Returns `None` for empty input.
pub fn percentile<T: AsRef<[f64]>>(data: T, p: f64) -> Result<Option<f64>> {
    let sample = ValidatedSample::new(data.as_ref().to_vec(), None)?;
    let pairs = frequency::aggregate(&sample);
    frequency::percentile_sorted(&pairs, sample.total_weight(), p)
}

/// Descriptive statistics of a weighted sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    /// Number of cases
    pub count: usize,
    /// Sum of weights
    pub n: f64,
    pub sum: f64,
    pub mean: f64,
    /// `None` when `n ≤ 1`
    pub variance: Option<f64>,
    pub std: Option<f64>,
    /// Standard error of the mean
    pub std_error: Option<f64>,
    pub min: f64,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: f64,
    pub range: f64,
}

/// Computes descriptive statistics of unweighted data
///
/// # Example
/// ```rust
/// use statsuite::stats;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let stats = stats::describe(&data).unwrap();
/// assert_eq!(stats.mean, 3.0);
/// ```
pub fn describe<T: AsRef<[f64]>>(data: T) -> Result<DescriptiveStats> {
    let sample = ValidatedSample::new(data.as_ref().to_vec(), None)?;
    descriptive::describe_impl(&sample)
}

/// Computes descriptive statistics honouring case weights
pub fn describe_weighted(sample: &ValidatedSample) -> Result<DescriptiveStats> {
    descriptive::describe_impl(sample)
}

/// Inference for one regression coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientStats {
    /// `"(Constant)"` or the predictor name
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    /// Standardized coefficient; `None` for the constant or a constant response
    pub beta: Option<f64>,
    /// `None` when the standard error is zero
    pub t: Option<f64>,
    pub p_value: Option<f64>,
}

/// Collinearity diagnostics of one predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collinearity {
    /// `1 − R²` of the predictor regressed on the others
    pub tolerance: f64,
    /// `1 / tolerance`; infinite under perfect collinearity
    pub vif: f64,
}

/// Min/max/mean/std. deviation of one residual series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub n: usize,
}

/// The residual statistics table of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub predicted: ResidualStatistics,
    pub residual: ResidualStatistics,
    /// `None` when all predicted values are equal
    pub std_predicted: Option<ResidualStatistics>,
    /// `None` when the fit is exact
    pub std_residual: Option<ResidualStatistics>,
}

/// A fitted OLS model with ANOVA and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub n: usize,
    /// Number of predictors, intercept excluded
    pub predictors: usize,
    /// Intercept first, then one entry per predictor
    pub coefficients: Vec<CoefficientStats>,
    pub fitted_values: Vec<f64>,
    pub residuals: Vec<f64>,
    pub ss_total: f64,
    pub ss_regression: f64,
    pub ss_residual: f64,
    pub df_regression: usize,
    pub df_residual: usize,
    pub ms_regression: f64,
    pub ms_residual: f64,
    pub r: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    /// `√MSE`
    pub std_error_estimate: f64,
    /// `None` when the residual sum of squares is zero
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
    pub durbin_watson: Option<f64>,
    pub residual_summary: ResidualSummary,
    /// One entry per predictor
    pub collinearity: Vec<Collinearity>,
}

impl RegressionModel {
    pub fn intercept(&self) -> f64 {
        self.coefficients[0].estimate
    }

    /// Slopes in predictor order
    pub fn slopes(&self) -> Vec<f64> {
        self.coefficients[1..].iter().map(|c| c.estimate).collect()
    }
}

/// Fits `y = Xβ + ε` by ordinary least squares with an intercept
///
/// # Example
/// ```rust
/// use statsuite::stats;
///
/// let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let y = vec![2.1, 3.9, 6.2, 7.8, 10.1];
/// let model = stats::linear_regression(&y, &[&x]).unwrap();
/// assert!(model.r_squared > 0.99);
/// ```
pub fn linear_regression(y: &[f64], x: &[&[f64]]) -> Result<RegressionModel> {
    regression::linear_regression_impl(y, x, &[], DEFAULT_SINGULAR_EPSILON)
}

/// [`linear_regression`] with predictor names and a custom pivot threshold
pub fn linear_regression_named(
    y: &[f64],
    x: &[&[f64]],
    names: &[String],
    singular_epsilon: f64,
) -> Result<RegressionModel> {
    if !names.is_empty() && names.len() != x.len() {
        return Err(Error::LengthMismatch {
            expected: x.len(),
            actual: names.len(),
        });
    }
    regression::linear_regression_impl(y, x, names, singular_epsilon)
}
