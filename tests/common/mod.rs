//! Shared helpers for integration tests

/// Asserts that two floats agree within `tol`
#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} ± {}, got {}",
        expected,
        tol,
        actual
    );
}

/// Deterministic pseudo-random values in `[0, 1)`
#[allow(dead_code)]
pub fn lcg_values(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as f64 / (1u64 << 31) as f64
        })
        .collect()
}
