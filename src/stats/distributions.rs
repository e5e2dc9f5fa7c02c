//! Distribution tail probabilities used by the test statistics

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use statrs::function::beta::beta_reg;

use crate::error::{Error, Result};

/// Terms below this magnitude end the Kolmogorov series
pub const KOLMOGOROV_TOLERANCE: f64 = 1e-6;
/// Maximum number of Kolmogorov series terms
pub const KOLMOGOROV_MAX_TERMS: usize = 100;

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| Error::ComputationError(format!("normal distribution: {}", e)))
}

/// Standard normal CDF
pub fn normal_cdf(z: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(z))
}

/// Two-tailed p-value of a standard normal deviate
pub fn normal_two_tailed(z: f64) -> Result<f64> {
    Ok((2.0 * standard_normal()?.sf(z.abs())).min(1.0))
}

/// Upper tail of the chi-square distribution
pub fn chi_square_upper(x: f64, df: f64) -> Result<f64> {
    let dist = ChiSquared::new(df)
        .map_err(|e| Error::ComputationError(format!("chi-square distribution with df={}: {}", df, e)))?;
    if x <= 0.0 {
        return Ok(1.0);
    }
    Ok(dist.sf(x))
}

/// Two-tailed Student t p-value
pub fn t_two_tailed(t: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| Error::ComputationError(format!("t distribution with df={}: {}", df, e)))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

/// Upper tail `P(F > f)` of the F distribution via the regularized incomplete beta
pub fn f_upper(f: f64, df1: f64, df2: f64) -> Result<f64> {
    if !(df1 > 0.0 && df2 > 0.0) {
        return Err(Error::ComputationError(format!(
            "F distribution requires positive degrees of freedom, got ({}, {})",
            df1, df2
        )));
    }
    if f.is_nan() {
        return Err(Error::ComputationError("F statistic is NaN".into()));
    }
    if f <= 0.0 {
        return Ok(1.0);
    }
    if f.is_infinite() {
        return Ok(0.0);
    }
    let x = df2 / (df2 + df1 * f);
    Ok(beta_reg(df2 / 2.0, df1 / 2.0, x))
}

/// Kolmogorov asymptotic p-value `2·Σ(−1)^(k−1)·exp(−2k²d²)`
pub fn kolmogorov_p_value(d: f64) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    let mut sum = 0.0;
    for k in 1..=KOLMOGOROV_MAX_TERMS {
        let kf = k as f64;
        let term = (-2.0 * kf * kf * d * d).exp();
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        sum += sign * term;
        if term < KOLMOGOROV_TOLERANCE {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_tails() {
        assert!((normal_cdf(0.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((normal_two_tailed(1.959964).unwrap() - 0.05).abs() < 1e-5);
        assert!((normal_two_tailed(-1.959964).unwrap() - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_chi_square_upper() {
        // 3.841459 is the 95th percentile for df = 1
        assert!((chi_square_upper(3.841459, 1.0).unwrap() - 0.05).abs() < 1e-5);
        assert_eq!(chi_square_upper(0.0, 2.0).unwrap(), 1.0);
    }

    #[test]
    fn test_f_upper() {
        // 4.964603 is the 95th percentile for F(1, 10)
        assert!((f_upper(4.964603, 1.0, 10.0).unwrap() - 0.05).abs() < 1e-5);
        assert_eq!(f_upper(f64::INFINITY, 2.0, 3.0).unwrap(), 0.0);
        assert!(f_upper(1.0, 0.0, 3.0).is_err());
    }

    #[test]
    fn test_t_two_tailed() {
        // 2.228139 is the 97.5th percentile for df = 10
        assert!((t_two_tailed(2.228139, 10.0).unwrap() - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_kolmogorov_series() {
        // Q_KS(1.36) ≈ 0.0494
        assert!((kolmogorov_p_value(1.36) - 0.0494).abs() < 1e-3);
        assert_eq!(kolmogorov_p_value(0.0), 1.0);
        assert!(kolmogorov_p_value(0.1) <= 1.0);
        assert!(kolmogorov_p_value(3.0) < 1e-6);
    }
}
