//! Dense linear algebra kernel
//!
//! Row-major matrices with transpose, products and Gauss-Jordan inversion.
//! Every operation is stateless and returns a new value.

use std::ops::{Index, IndexMut};

use crate::error::{Error, Result};

/// Default pivot threshold for [`Matrix::inverse`]
pub const DEFAULT_SINGULAR_EPSILON: f64 = 1e-10;

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Builds a matrix from row vectors
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::DimensionMismatch(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Builds a matrix whose columns are the given vectors
    pub fn from_columns(columns: &[&[f64]]) -> Result<Self> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut m = Self::zeros(rows, columns.len());
        for (j, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(Error::LengthMismatch {
                    expected: rows,
                    actual: column.len(),
                });
            }
            for (i, &v) in column.iter().enumerate() {
                m[(i, j)] = v;
            }
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copy of column `j`
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self[(i, j)]).collect()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Transpose
    pub fn transpose(&self) -> Matrix {
        let mut t = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    /// Matrix product `self * other`
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(Error::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    result[(i, j)] += a * other[(k, j)];
                }
            }
        }
        Ok(result)
    }

    /// Matrix-vector product `self * v`
    pub fn multiply_vector(&self, v: &[f64]) -> Result<Vec<f64>> {
        if self.cols != v.len() {
            return Err(Error::DimensionMismatch(format!(
                "cannot multiply {}x{} matrix by vector of length {}",
                self.rows,
                self.cols,
                v.len()
            )));
        }
        Ok((0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// `selfᵀ * self` without materialising the transpose
    pub fn gram(&self) -> Matrix {
        let mut result = Matrix::zeros(self.cols, self.cols);
        for i in 0..self.cols {
            for j in i..self.cols {
                let sum: f64 = (0..self.rows).map(|k| self[(k, i)] * self[(k, j)]).sum();
                result[(i, j)] = sum;
                result[(j, i)] = sum;
            }
        }
        result
    }

    /// `selfᵀ * v`
    pub fn transpose_multiply_vector(&self, v: &[f64]) -> Result<Vec<f64>> {
        if self.rows != v.len() {
            return Err(Error::DimensionMismatch(format!(
                "cannot multiply transpose of {}x{} matrix by vector of length {}",
                self.rows,
                self.cols,
                v.len()
            )));
        }
        Ok((0..self.cols)
            .map(|j| (0..self.rows).map(|i| self[(i, j)] * v[i]).sum())
            .collect())
    }

    /// Inverse with the default pivot threshold
    pub fn inverse(&self) -> Result<Matrix> {
        self.inverse_with_epsilon(DEFAULT_SINGULAR_EPSILON)
    }

    /// Gauss-Jordan inversion of `[A | I]` with partial pivoting
    pub fn inverse_with_epsilon(&self, epsilon: f64) -> Result<Matrix> {
        let n = self.rows;
        if n == 0 {
            return Err(Error::InvalidInput("cannot invert an empty matrix".into()));
        }
        if !self.is_square() {
            return Err(Error::DimensionMismatch(format!(
                "cannot invert non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }

        let width = 2 * n;
        let mut aug = Matrix::zeros(n, width);
        for i in 0..n {
            for j in 0..n {
                aug[(i, j)] = self[(i, j)];
            }
            aug[(i, n + i)] = 1.0;
        }

        for col in 0..n {
            // largest magnitude in the pivot column
            let mut pivot_row = col;
            let mut pivot_abs = aug[(col, col)].abs();
            for r in col + 1..n {
                let candidate = aug[(r, col)].abs();
                if candidate > pivot_abs {
                    pivot_row = r;
                    pivot_abs = candidate;
                }
            }

            if !(pivot_abs >= epsilon) {
                return Err(Error::SingularMatrix(format!(
                    "pivot {:.3e} in column {} is below {:.0e}",
                    pivot_abs, col, epsilon
                )));
            }

            if pivot_row != col {
                aug.swap_rows(pivot_row, col);
            }

            let pivot = aug[(col, col)];
            for j in 0..width {
                aug[(col, j)] /= pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = aug[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..width {
                    let delta = factor * aug[(col, j)];
                    aug[(r, j)] -= delta;
                }
            }
        }

        let mut inverse = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                inverse[(i, j)] = aug[(i, n + j)];
            }
        }
        Ok(inverse)
    }

    /// Inverse of a symmetric matrix with a positive diagonal, such as a Gram matrix.
    ///
    /// The matrix is scaled to unit diagonal before elimination, so `epsilon`
    /// bounds the pivots relative to each column's own magnitude and the
    /// singularity decision does not depend on the units of the data.
    pub fn inverse_symmetric(&self, epsilon: f64) -> Result<Matrix> {
        if !self.is_square() {
            return Err(Error::DimensionMismatch(format!(
                "cannot invert non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }
        let n = self.rows;
        let mut scale = Vec::with_capacity(n);
        for i in 0..n {
            let d = self[(i, i)];
            if !(d > 0.0 && d.is_finite()) {
                return Err(Error::SingularMatrix(format!(
                    "diagonal entry {:.3e} in column {} is not positive",
                    d, i
                )));
            }
            scale.push(d.sqrt().recip());
        }

        let mut scaled = self.clone();
        for i in 0..n {
            for j in 0..n {
                scaled[(i, j)] *= scale[i] * scale[j];
            }
        }
        let mut inverse = scaled.inverse_with_epsilon(epsilon)?;
        for i in 0..n {
            for j in 0..n {
                inverse[(i, j)] *= scale[i] * scale[j];
            }
        }
        Ok(inverse)
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}
