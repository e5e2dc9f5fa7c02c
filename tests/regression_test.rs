mod common;

use common::{assert_close, lcg_values};
use statsuite::error::Error;
use statsuite::linalg::Matrix;
use statsuite::stats;

fn noisy_design(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let x1: Vec<f64> = lcg_values(n, 1).iter().map(|v| v * 10.0).collect();
    let x2: Vec<f64> = x1
        .iter()
        .zip(lcg_values(n, 2))
        .map(|(a, e)| 0.5 * a + 4.0 * e)
        .collect();
    let y: Vec<f64> = x1
        .iter()
        .zip(&x2)
        .zip(lcg_values(n, 3))
        .map(|((a, b), e)| 1.0 + 2.0 * a - b + e - 0.5)
        .collect();
    (y, x1, x2)
}

#[test]
fn test_residuals_are_orthogonal_to_predictors() {
    let (y, x1, x2) = noisy_design(60);
    let model = stats::linear_regression(&y, &[&x1, &x2]).unwrap();

    let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(p, q)| p * q).sum::<f64>();
    assert_close(model.residuals.iter().sum::<f64>(), 0.0, 1e-8);
    assert_close(dot(&model.residuals, &x1), 0.0, 1e-7);
    assert_close(dot(&model.residuals, &x2), 0.0, 1e-7);

    assert_close(model.ss_total, model.ss_regression + model.ss_residual, 1e-7);
    assert_eq!(model.df_residual, 57);
    assert_close(model.slopes()[0], 2.0, 0.2);
    assert_close(model.slopes()[1], -1.0, 0.2);
}

#[test]
fn test_anova_and_goodness_of_fit() {
    let (y, x1, x2) = noisy_design(40);
    let model = stats::linear_regression(&y, &[&x1, &x2]).unwrap();

    let f = model.f_statistic.unwrap();
    assert_close(f, model.ms_regression / model.ms_residual, 1e-9);
    assert!(model.f_p_value.unwrap() < 1e-6);
    assert!(model.adj_r_squared <= model.r_squared);
    assert_close(model.r * model.r, model.r_squared, 1e-12);

    let dw = model.durbin_watson.unwrap();
    assert!((0.0..=4.0).contains(&dw));
}

#[test]
fn test_variance_inflation_bounds() {
    let (_, x1, x2) = noisy_design(50);
    let x3 = lcg_values(50, 99);
    let y: Vec<f64> = x1.iter().zip(&x3).map(|(a, c)| a + c).collect();
    let model = stats::linear_regression(&y, &[&x1, &x2, &x3]).unwrap();

    assert_eq!(model.collinearity.len(), 3);
    for c in &model.collinearity {
        assert!(c.tolerance > 0.0 && c.tolerance <= 1.0);
        assert!(c.vif >= 1.0);
        assert_close(c.vif * c.tolerance, 1.0, 1e-9);
    }
    // x1 and x2 are correlated, x3 is not
    assert!(model.collinearity[0].vif > model.collinearity[2].vif);
}

#[test]
fn test_single_predictor_collinearity_is_trivial() {
    let (y, x1, _) = noisy_design(20);
    let model = stats::linear_regression(&y, &[&x1]).unwrap();
    assert_eq!(model.collinearity[0].tolerance, 1.0);
    assert_eq!(model.collinearity[0].vif, 1.0);
}

#[test]
fn test_collinear_predictors_are_singular() {
    let x1 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let x2: Vec<f64> = x1.iter().map(|v| 2.0 * v).collect();
    let y = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
    assert!(matches!(
        stats::linear_regression(&y, &[&x1, &x2]),
        Err(Error::SingularMatrix(_))
    ));
}

#[test]
fn test_collinear_predictors_are_singular_at_large_scale() {
    let x1 = [1000.3, 2017.7, 3004.1, 4022.9, 5013.3, 7001.9];
    let x2: Vec<f64> = x1.iter().map(|v| 3.1 * v).collect();
    let y = [12.0, 9.5, 14.2, 11.1, 16.8, 15.3];
    assert!(matches!(
        stats::linear_regression(&y, &[&x1, &x2]),
        Err(Error::SingularMatrix(_))
    ));
}

#[test]
fn test_small_valued_predictor_is_not_singular() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let micro: Vec<f64> = x.iter().map(|v| v * 1e-6).collect();
    let y = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];

    let unit = stats::linear_regression(&y, &[&x]).unwrap();
    let scaled = stats::linear_regression(&y, &[&micro]).unwrap();

    assert_close(scaled.intercept(), unit.intercept(), 1e-9);
    assert_close(scaled.slopes()[0] * 1e-6, unit.slopes()[0], 1e-9);
    assert_close(scaled.r_squared, unit.r_squared, 1e-12);
    // the t statistic does not depend on the units of the predictor
    assert_close(
        scaled.coefficients[1].t.unwrap(),
        unit.coefficients[1].t.unwrap(),
        1e-8,
    );
}

#[test]
fn test_predictor_location_does_not_change_the_fit() {
    let (y, x1, x2) = noisy_design(30);
    let shifted: Vec<f64> = x1.iter().map(|v| v + 1e6).collect();

    let base = stats::linear_regression(&y, &[&x1, &x2]).unwrap();
    let moved = stats::linear_regression(&y, &[&shifted, &x2]).unwrap();

    assert_close(moved.slopes()[0], base.slopes()[0], 1e-6);
    assert_close(moved.slopes()[1], base.slopes()[1], 1e-6);
    assert_close(moved.intercept(), base.intercept() - 1e6 * base.slopes()[0], 1e-3);
    assert_close(moved.r_squared, base.r_squared, 1e-9);
    // slope standard errors are invariant under a shift of the predictor
    assert_close(moved.coefficients[1].std_error, base.coefficients[1].std_error, 1e-8);
}

#[test]
fn test_input_validation() {
    let x = [1.0, 2.0, 3.0];
    let y = [1.0, 2.0, 4.0];
    assert!(matches!(
        stats::linear_regression(&y, &[&x, &x]),
        Err(Error::InsufficientData(_))
    ));
    assert!(matches!(
        stats::linear_regression(&y[..2], &[&x]),
        Err(Error::LengthMismatch { expected: 2, actual: 3 })
    ));
    assert!(matches!(
        stats::linear_regression(&y, &[]),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        stats::linear_regression_named(&y, &[&x], &["a".into(), "b".into()], 1e-10),
        Err(Error::LengthMismatch { .. })
    ));
}

#[test]
fn test_inverse_of_well_conditioned_matrix() {
    let a = Matrix::from_rows(&[vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap();
    let inv = a.inverse().unwrap();
    let product = a.multiply(&inv).unwrap();
    for i in 0..2 {
        for j in 0..2 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_close(product[(i, j)], expected, 1e-12);
        }
    }
}
