// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Interpolation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Piecewise-linear interpolation on 1D tables.

use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};

/// Tabulated function `y(x)` with strictly increasing abscissae.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTable {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearTable {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> MathResult<Self> {
        if x.len() != y.len() {
            return Err(MathError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        if x.is_empty() {
            return Err(MathError::InvalidTable("empty table".into()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(MathError::NonFinite("interpolation table"));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MathError::InvalidTable(
                "abscissae must be strictly increasing".into(),
            ));
        }
        Ok(LinearTable { x, y })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Linear interpolation inside the table, linear extrapolation from
    /// the two end points outside it. A single-point table is constant.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }
        // Segment index i such that x lies in [x[i], x[i+1]] (clamped to ends)
        let i = match self.x.partition_point(|&xi| xi <= x) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    /// Like [`eval`](Self::eval) but zero outside `[x_min, x_max]`.
    pub fn eval_or_zero(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] || x > self.x[n - 1] {
            0.0
        } else {
            self.eval(x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_nodes() {
        let t = LinearTable::new(vec![0.0, 1.0, 3.0], vec![1.0, 2.0, 6.0]).unwrap();
        assert!((t.eval(0.0) - 1.0).abs() < 1e-15);
        assert!((t.eval(1.0) - 2.0).abs() < 1e-15);
        assert!((t.eval(3.0) - 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_midpoints() {
        let t = LinearTable::new(vec![0.0, 1.0, 3.0], vec![1.0, 2.0, 6.0]).unwrap();
        assert!((t.eval(0.5) - 1.5).abs() < 1e-15);
        assert!((t.eval(2.0) - 4.0).abs() < 1e-15);
    }

    #[test]
    fn test_linear_extrapolation_both_ends() {
        let t = LinearTable::new(vec![1.0, 2.0, 4.0], vec![10.0, 8.0, 8.0]).unwrap();
        // Left slope -2
        assert!((t.eval(0.0) - 12.0).abs() < 1e-12);
        // Right slope 0
        assert!((t.eval(10.0) - 8.0).abs() < 1e-12);
        // Extrapolation can go negative
        assert!(t.eval(7.0) >= 0.0);
        assert!(t.eval(-5.0) > 12.0);
    }

    #[test]
    fn test_eval_or_zero() {
        let t = LinearTable::new(vec![1.0, 2.0], vec![3.0, 5.0]).unwrap();
        assert_eq!(t.eval_or_zero(0.5), 0.0);
        assert_eq!(t.eval_or_zero(2.5), 0.0);
        assert!((t.eval_or_zero(1.5) - 4.0).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(LinearTable::new(vec![], vec![]).is_err());
        assert!(LinearTable::new(vec![1.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(LinearTable::new(vec![1.0], vec![0.0, 1.0]).is_err());
        assert!(LinearTable::new(vec![1.0, f64::NAN], vec![0.0, 1.0]).is_err());
    }
}
