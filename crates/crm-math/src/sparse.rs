// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Sparse Linear System
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sparse backend: row maps during assembly, CSR for solves.
//!
//! Rate matrices have a handful of entries per column (one per
//! transition leaving a state), so assembly goes through ordered
//! per-row maps and is compressed lazily the first time the system is
//! multiplied or solved.

use std::collections::BTreeMap;

use crate::error::{MathError, MathResult};
use crate::gmres::{gmres_solve, GmresConfig};
use crate::linalg::LinearSystem;

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pub n: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `out = A x`. Lengths are not checked.
    pub fn matvec(&self, x: &[f64], out: &mut [f64]) {
        for (i, o) in out.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *o = sum;
        }
    }

    pub fn diagonal(&self) -> Vec<f64> {
        let mut diag = vec![0.0; self.n];
        for (i, d) in diag.iter_mut().enumerate() {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i {
                    *d += self.values[k];
                }
            }
        }
        diag
    }
}

#[derive(Debug, Clone)]
pub struct SparseSystem {
    rows: Vec<BTreeMap<usize, f64>>,
    csr: Option<CsrMatrix>,
    config: GmresConfig,
    last_solution: Option<Vec<f64>>,
}

impl SparseSystem {
    pub fn with_config(dim: usize, config: GmresConfig) -> Self {
        SparseSystem {
            rows: vec![BTreeMap::new(); dim],
            csr: None,
            config,
            last_solution: None,
        }
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    fn invalidate(&mut self) {
        self.csr = None;
        self.last_solution = None;
    }

    fn compress(&self) -> CsrMatrix {
        let n = self.rows.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        row_ptr.push(0);
        for row in &self.rows {
            for (&c, &v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        CsrMatrix {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn csr(&mut self) -> &CsrMatrix {
        let csr = match self.csr.take() {
            Some(csr) => csr,
            None => self.compress(),
        };
        self.csr.insert(csr)
    }
}

impl LinearSystem for SparseSystem {
    fn zeros(dim: usize) -> Self {
        Self::with_config(dim, GmresConfig::default())
    }

    fn dim(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.invalidate();
        self.rows[row].insert(col, value);
    }

    fn add(&mut self, row: usize, col: usize, value: f64) {
        self.invalidate();
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    fn entries(&self) -> Vec<(usize, usize, f64)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().map(move |(&c, &v)| (r, c, v)))
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
        let mut out = vec![0.0; n];
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = row.iter().map(|(&c, &v)| v * x[c]).sum();
        }
        Ok(out)
    }

    /// GMRES with a Jacobi preconditioner, warm-started from the previous
    /// solution of the same operator.
    fn solve(&mut self, rhs: &[f64]) -> MathResult<Vec<f64>> {
        let n = self.dim();
        if rhs.len() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                got: rhs.len(),
            });
        }
        let config = self.config.clone();
        let mut x = self.last_solution.clone().unwrap_or_else(|| vec![0.0; n]);
        let result = gmres_solve(self.csr(), rhs, &mut x, &config);
        if !result.converged {
            return Err(MathError::NotConverged {
                iterations: result.iterations,
                residual: result.residual,
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(MathError::NonFinite("solution"));
        }
        self.last_solution = Some(x.clone());
        Ok(x)
    }

    fn set_tolerance(&mut self, tol: f64) {
        self.config.tol = tol;
    }

    fn fill_row(&mut self, row: usize, value: f64) {
        self.invalidate();
        let n = self.dim();
        self.rows[row] = (0..n).map(|c| (c, value)).collect();
    }
}
