//! OLS regression with ANOVA, residual and collinearity diagnostics

use crate::error::{Error, Result};
use crate::linalg::Matrix;
use crate::stats::distributions::{f_upper, t_two_tailed};
use crate::stats::{
    CoefficientStats, Collinearity, RegressionModel, ResidualStatistics, ResidualSummary,
};

/// Label of the intercept row
pub const CONSTANT_LABEL: &str = "(Constant)";

/// A residual sum of squares at or below this share of the total is an exact fit
pub const EXACT_FIT_TOLERANCE: f64 = 1e-12;

/// Least-squares solution of one design
struct OlsFit {
    coefficients: Vec<f64>,
    /// `(XᵀX)⁻¹`
    inverse: Matrix,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

/// Solves `β = (XᵀX)⁻¹Xᵀy` with an intercept column prepended to `x`.
///
/// Predictors are centred before the Gram matrix is formed, so the
/// singularity check sees their correlations rather than their location or
/// units. Coefficients and `(XᵀX)⁻¹` are mapped back to the original design.
fn fit(y: &[f64], x: &[&[f64]], epsilon: f64) -> Result<OlsFit> {
    let n = y.len();
    let means: Vec<f64> = x.iter().map(|column| mean(column)).collect();
    let centred: Vec<Vec<f64>> = x
        .iter()
        .zip(&means)
        .map(|(column, m)| column.iter().map(|v| v - m).collect())
        .collect();
    let ones = vec![1.0; n];
    let mut columns: Vec<&[f64]> = Vec::with_capacity(x.len() + 1);
    columns.push(&ones);
    columns.extend(centred.iter().map(Vec::as_slice));

    let design = Matrix::from_columns(&columns)?;
    let centred_inverse = design.gram().inverse_symmetric(epsilon)?;
    let xty = design.transpose_multiply_vector(y)?;
    let centred_coefficients = centred_inverse.multiply_vector(&xty)?;
    let fitted = design.multiply_vector(&centred_coefficients)?;
    let residuals = y.iter().zip(&fitted).map(|(obs, pred)| obs - pred).collect();

    // X = Xc·T with T = [[1, x̄ᵀ], [0, I]], so β = T⁻¹βc and (XᵀX)⁻¹ = T⁻¹(XcᵀXc)⁻¹T⁻ᵀ
    let mut shift = Matrix::identity(x.len() + 1);
    for (j, m) in means.iter().enumerate() {
        shift[(0, j + 1)] = -m;
    }
    let coefficients = shift.multiply_vector(&centred_coefficients)?;
    let inverse = shift
        .multiply(&centred_inverse)?
        .multiply(&shift.transpose())?;

    Ok(OlsFit {
        coefficients,
        inverse,
        fitted,
        residuals,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator)
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn sum_of_squares_about_mean(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum()
}

/// Whether `sse` is numerically zero relative to `sst`
fn is_exact_fit(sse: f64, sst: f64) -> bool {
    sse <= EXACT_FIT_TOLERANCE * sst.max(1.0)
}

fn summarize(values: &[f64]) -> ResidualStatistics {
    ResidualStatistics {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean: mean(values),
        std_dev: std_dev(values),
        n: values.len(),
    }
}

pub(crate) fn linear_regression_impl(
    y: &[f64],
    x: &[&[f64]],
    names: &[String],
    epsilon: f64,
) -> Result<RegressionModel> {
    let p = x.len();
    if p == 0 {
        return Err(Error::InvalidInput(
            "regression requires at least one independent variable".into(),
        ));
    }
    let n = y.len();
    for column in x {
        if column.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                actual: column.len(),
            });
        }
    }
    if n <= p + 1 {
        return Err(Error::InsufficientData(format!(
            "regression with {} predictors needs more than {} observations, got {}",
            p,
            p + 1,
            n
        )));
    }
    if let Some(pos) = y.iter().chain(x.iter().flat_map(|c| c.iter())).position(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "regression input contains a non-finite value (flat position {})",
            pos
        )));
    }

    let ols = fit(y, x, epsilon)?;

    // ANOVA decomposition
    let y_mean = mean(y);
    let ss_total = sum_of_squares_about_mean(y);
    let ss_regression: f64 = ols.fitted.iter().map(|f| (f - y_mean).powi(2)).sum();
    let ss_residual: f64 = ols.residuals.iter().map(|e| e * e).sum();

    let df_regression = p;
    let df_residual = n - p - 1;
    let ms_regression = ss_regression / df_regression as f64;
    let ms_residual = ss_residual / df_residual as f64;

    let r_squared = if ss_total == 0.0 {
        0.0
    } else {
        (1.0 - ss_residual / ss_total).clamp(0.0, 1.0)
    };
    let adj_r_squared = 1.0 - (n - 1) as f64 / df_residual as f64 * (1.0 - r_squared);
    let std_error_estimate = ms_residual.sqrt();

    let exact_fit = is_exact_fit(ss_residual, ss_total);
    let (f_statistic, f_p_value) = if exact_fit {
        (None, None)
    } else {
        let f = ms_regression / ms_residual;
        (Some(f), Some(f_upper(f, df_regression as f64, df_residual as f64)?))
    };

    let durbin_watson = if exact_fit {
        None
    } else {
        let num: f64 = ols.residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        Some(num / ss_residual)
    };

    // coefficient inference
    let sd_y = std_dev(y);
    let mut coefficients = Vec::with_capacity(p + 1);
    for (i, &b) in ols.coefficients.iter().enumerate() {
        let std_error = (ms_residual * ols.inverse[(i, i)]).max(0.0).sqrt();
        let (t, p_value) = if std_error > 0.0 {
            let t = b / std_error;
            (Some(t), Some(t_two_tailed(t, df_residual as f64)?))
        } else {
            (None, None)
        };
        let (name, beta) = if i == 0 {
            (CONSTANT_LABEL.to_string(), None)
        } else {
            let name = names
                .get(i - 1)
                .cloned()
                .unwrap_or_else(|| format!("x{}", i));
            let beta = (sd_y > 0.0).then(|| b * std_dev(x[i - 1]) / sd_y);
            (name, beta)
        };
        coefficients.push(CoefficientStats {
            name,
            estimate: b,
            std_error,
            beta,
            t,
            p_value,
        });
    }

    // residual statistics
    let pred_mean = mean(&ols.fitted);
    let pred_sd = std_dev(&ols.fitted);
    let std_predicted = (pred_sd > 0.0).then(|| {
        let z: Vec<f64> = ols.fitted.iter().map(|f| (f - pred_mean) / pred_sd).collect();
        summarize(&z)
    });
    let std_residual = (!exact_fit).then(|| {
        let z: Vec<f64> = ols.residuals.iter().map(|e| e / std_error_estimate).collect();
        summarize(&z)
    });
    let residual_summary = ResidualSummary {
        predicted: summarize(&ols.fitted),
        residual: summarize(&ols.residuals),
        std_predicted,
        std_residual,
    };

    let collinearity = collinearity_impl(x, epsilon)?;

    log::debug!(
        "OLS fit: n={}, predictors={}, R²={:.6}, SSE={:.6e}",
        n,
        p,
        r_squared,
        ss_residual
    );

    Ok(RegressionModel {
        n,
        predictors: p,
        coefficients,
        fitted_values: ols.fitted,
        residuals: ols.residuals,
        ss_total,
        ss_regression,
        ss_residual,
        df_regression,
        df_residual,
        ms_regression,
        ms_residual,
        r: r_squared.sqrt(),
        r_squared,
        adj_r_squared,
        std_error_estimate,
        f_statistic,
        f_p_value,
        durbin_watson,
        residual_summary,
        collinearity,
    })
}

/// Tolerance and VIF of every predictor via auxiliary regressions
pub(crate) fn collinearity_impl(x: &[&[f64]], epsilon: f64) -> Result<Vec<Collinearity>> {
    if x.len() == 1 {
        return Ok(vec![Collinearity {
            tolerance: 1.0,
            vif: 1.0,
        }]);
    }

    let mut diagnostics = Vec::with_capacity(x.len());
    for (i, target) in x.iter().enumerate() {
        let others: Vec<&[f64]> = x
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, c)| *c)
            .collect();
        let aux = fit(target, &others, epsilon)?;

        let sst = sum_of_squares_about_mean(target);
        let sse: f64 = aux.residuals.iter().map(|e| e * e).sum();
        let tolerance = if sst > 0.0 && is_exact_fit(sse, sst) {
            0.0
        } else if sst == 0.0 {
            1.0
        } else {
            (sse / sst).clamp(0.0, 1.0)
        };
        let vif = if tolerance == 0.0 {
            f64::INFINITY
        } else {
            1.0 / tolerance
        };
        diagnostics.push(Collinearity { tolerance, vif });
    }
    Ok(diagnostics)
}
