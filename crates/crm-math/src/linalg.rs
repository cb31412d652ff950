// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Linear Systems
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Square linear systems behind a common capability.
//!
//! [`LinearSystem`] is what the rate-matrix code is written against:
//! assemble entries with `set`/`add`, then `solve` or `multiply`.
//! [`DenseSystem`] stores an `ndarray` matrix and solves by LU with
//! partial pivoting; the factorisation is cached until the next write.

use ndarray::Array2;

use crate::error::{MathError, MathResult};

pub trait LinearSystem: Clone + Send + Sync + std::fmt::Debug {
    /// All-zero system of dimension `dim`.
    fn zeros(dim: usize) -> Self;

    fn dim(&self) -> usize;

    fn get(&self, row: usize, col: usize) -> f64;

    fn set(&mut self, row: usize, col: usize, value: f64);

    fn add(&mut self, row: usize, col: usize, value: f64);

    /// Stored entries as `(row, col, value)`. Backends may omit zeros.
    fn entries(&self) -> Vec<(usize, usize, f64)>;

    /// `y = A x`.
    fn multiply(&self, x: &[f64]) -> MathResult<Vec<f64>>;

    /// Solve `A x = rhs`. Takes `&mut self` so a factorisation or
    /// preconditioner can be cached between calls.
    fn solve(&mut self, rhs: &[f64]) -> MathResult<Vec<f64>>;

    /// Relative tolerance for iterative backends. Direct backends ignore it.
    fn set_tolerance(&mut self, _tol: f64) {}

    /// Overwrite every entry of `row` with `value`.
    fn fill_row(&mut self, row: usize, value: f64) {
        for col in 0..self.dim() {
            self.set(row, col, value);
        }
    }

    fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.dim()];
        for (_, col, v) in self.entries() {
            sums[col] += v;
        }
        sums
    }

    /// `I - scale * A`, e.g. the backward-Euler operator.
    fn identity_minus_scaled(&self, scale: f64) -> Self {
        let mut out = Self::zeros(self.dim());
        for (row, col, v) in self.entries() {
            out.add(row, col, -scale * v);
        }
        for i in 0..self.dim() {
            out.add(i, i, 1.0);
        }
        out
    }

    fn to_dense(&self) -> Array2<f64> {
        let n = self.dim();
        let mut out = Array2::zeros((n, n));
        for (row, col, v) in self.entries() {
            out[[row, col]] += v;
        }
        out
    }
}

/// LU factors of a square matrix, packed: strict lower part holds L
/// (unit diagonal implied), upper part holds U.
#[derive(Debug, Clone)]
struct LuFactors {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

impl LuFactors {
    fn factor(a: &Array2<f64>) -> MathResult<Self> {
        let n = a.nrows();
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Partial pivoting
            let mut p = k;
            let mut max_val = lu[[k, k]].abs();
            for i in (k + 1)..n {
                let v = lu[[i, k]].abs();
                if v > max_val {
                    max_val = v;
                    p = i;
                }
            }
            if !max_val.is_finite() {
                return Err(MathError::NonFinite("matrix"));
            }
            if max_val < f64::MIN_POSITIVE {
                return Err(MathError::Singular { column: k });
            }
            if p != k {
                for j in 0..n {
                    lu.swap([k, j], [p, j]);
                }
                perm.swap(k, p);
            }

            let pivot = lu[[k, k]];
            for i in (k + 1)..n {
                let factor = lu[[i, k]] / pivot;
                lu[[i, k]] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        lu[[i, j]] -= factor * lu[[k, j]];
                    }
                }
            }
        }

        Ok(LuFactors { lu, perm })
    }

    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.perm.len();
        let mut x: Vec<f64> = self.perm.iter().map(|&p| rhs[p]).collect();

        // Forward: L y = P b
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }
        // Backward: U x = y
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum / self.lu[[i, i]];
        }
        x
    }
}

/// Dense square system.
#[derive(Debug, Clone)]
pub struct DenseSystem {
    matrix: Array2<f64>,
    factors: Option<LuFactors>,
}

impl DenseSystem {
    pub fn from_array(matrix: Array2<f64>) -> MathResult<Self> {
        let (r, c) = matrix.dim();
        if r != c {
            return Err(MathError::DimensionMismatch { expected: r, got: c });
        }
        Ok(DenseSystem {
            matrix,
            factors: None,
        })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}

impl LinearSystem for DenseSystem {
    fn zeros(dim: usize) -> Self {
        DenseSystem {
            matrix: Array2::zeros((dim, dim)),
            factors: None,
        }
    }

    fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[[row, col]]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.factors = None;
        self.matrix[[row, col]] = value;
    }

    fn add(&mut self, row: usize, col: usize, value: f64) {
        self.factors = None;
        self.matrix[[row, col]] += value;
    }

    fn entries(&self) -> Vec<(usize, usize, f64)> {
        self.matrix
            .indexed_iter()
            .filter(|(_, v)| **v != 0.0)
            .map(|((r, c), v)| (r, c, *v))
            .collect()
    }

    fn multiply(&self, x: &[f64]) -> MathResult<Vec<f64>> {
        let n = self.dim();
        if x.len() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                got: x.len(),
            });
        }
        Ok(self
            .matrix
            .rows()
            .into_iter()
            .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect())
    }

    fn solve(&mut self, rhs: &[f64]) -> MathResult<Vec<f64>> {
        let n = self.dim();
        if rhs.len() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                got: rhs.len(),
            });
        }
        if self.factors.is_none() {
            self.factors = Some(LuFactors::factor(&self.matrix)?);
        }
        let x = match &self.factors {
            Some(f) => f.solve(rhs),
            None => return Err(MathError::Singular { column: 0 }),
        };
        if x.iter().any(|v| !v.is_finite()) {
            return Err(MathError::NonFinite("solution"));
        }
        Ok(x)
    }

    fn fill_row(&mut self, row: usize, value: f64) {
        self.factors = None;
        self.matrix.row_mut(row).fill(value);
    }

    fn to_dense(&self) -> Array2<f64> {
        self.matrix.clone()
    }
}
