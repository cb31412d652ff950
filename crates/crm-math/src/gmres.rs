// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — GMRES
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Restarted GMRES(m) Krylov subspace solver for CSR matrices.
//!
//! GMRES (Generalised Minimal RESidual) builds an orthonormal Krylov
//! basis via Arnoldi iteration with modified Gram-Schmidt, then solves
//! the projected least-squares problem using Givens rotations on the
//! upper Hessenberg matrix.  When the basis reaches size `m` without
//! convergence the solver restarts from the current approximate
//! solution.
//!
//! A left Jacobi preconditioner is applied: instead of solving
//! `A x = b`, we solve `D⁻¹ A x = D⁻¹ b` with `D = diag(A)`. Zero
//! diagonal entries are treated as 1. Convergence is measured on the
//! preconditioned residual relative to `‖D⁻¹ b‖`.

use crate::sparse::CsrMatrix;

// ───────────────────────────── configuration ─────────────────────────

/// Configuration for the GMRES(m) solver.
#[derive(Debug, Clone)]
pub struct GmresConfig {
    /// Krylov subspace dimension before restart (default: 30).
    pub restart: usize,
    /// Maximum number of outer (restart) iterations (default: 100).
    pub max_iter: usize,
    /// Relative tolerance on the preconditioned residual (default: 1e-12).
    pub tol: f64,
}

impl Default for GmresConfig {
    fn default() -> Self {
        GmresConfig {
            restart: 30,
            max_iter: 100,
            tol: 1e-12,
        }
    }
}

/// Result of a GMRES solve.
#[derive(Debug, Clone)]
pub struct GmresResult {
    /// Total number of matrix-vector products (inner iterations summed
    /// over all restarts).
    pub iterations: usize,
    /// Final preconditioned L2 residual norm.
    pub residual: f64,
    /// Whether convergence was achieved.
    pub converged: bool,
}

// ───────────────────────── BLAS-like helpers ─────────────────────────

#[inline]
fn vec_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[inline]
fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `y = y + alpha * x` (axpy).
#[inline]
fn vec_axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// `out = D⁻¹ (b - A x)`.
fn precond_residual(a: &CsrMatrix, inv_diag: &[f64], b: &[f64], x: &[f64], out: &mut [f64]) {
    a.matvec(x, out);
    for ((o, &bi), &d) in out.iter_mut().zip(b.iter()).zip(inv_diag.iter()) {
        *o = (bi - *o) * d;
    }
}

// ───────────────────── Givens rotation helpers ──────────────────────

/// A single Givens rotation storing (c, s) such that
/// ```text
/// | c  s | | a |   | r |
/// |-s  c | | b | = | 0 |
/// ```
#[derive(Clone, Copy)]
struct GivensRotation {
    c: f64,
    s: f64,
}

impl GivensRotation {
    fn compute(a: f64, b: f64) -> Self {
        if b.abs() < 1e-300 {
            GivensRotation { c: 1.0, s: 0.0 }
        } else if b.abs() > a.abs() {
            let tau = -a / b;
            let s = 1.0 / (1.0 + tau * tau).sqrt();
            let c = s * tau;
            GivensRotation { c, s }
        } else {
            let tau = -b / a;
            let c = 1.0 / (1.0 + tau * tau).sqrt();
            let s = c * tau;
            GivensRotation { c, s }
        }
    }

    #[inline]
    fn apply(&self, a: &mut f64, b: &mut f64) {
        let ta = *a;
        let tb = *b;
        *a = self.c * ta - self.s * tb;
        *b = self.s * ta + self.c * tb;
    }
}

// ─────────────────────────── main solver ─────────────────────────────

/// Solve `A x = b` with restarted, Jacobi-preconditioned GMRES(m).
///
/// `x` is the initial guess on entry and the solution on exit.
pub fn gmres_solve(a: &CsrMatrix, b: &[f64], x: &mut [f64], config: &GmresConfig) -> GmresResult {
    let n = a.n;
    if n == 0 {
        return GmresResult {
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let inv_diag: Vec<f64> = a
        .diagonal()
        .iter()
        .map(|&d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
        .collect();

    let m = config.restart.min(n).max(1);
    let pb: Vec<f64> = b.iter().zip(inv_diag.iter()).map(|(bi, d)| bi * d).collect();
    let abs_tol = config.tol * vec_norm(&pb).max(1e-300);

    let mut r = vec![0.0; n];
    let mut av = vec![0.0; n];
    let mut total_iters: usize = 0;

    precond_residual(a, &inv_diag, b, x, &mut r);
    let mut beta = vec_norm(&r);
    if beta <= abs_tol {
        return GmresResult {
            iterations: 0,
            residual: beta,
            converged: true,
        };
    }

    // ───── outer restart loop ─────
    for _restart in 0..config.max_iter {
        let mut v_basis: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
        v_basis.push(r.iter().map(|ri| ri / beta).collect());

        // Upper Hessenberg matrix H[(m+1) x m] stored column-major
        let h_rows = m + 1;
        let mut h_store = vec![0.0; h_rows * m];
        let mut givens: Vec<GivensRotation> = Vec::with_capacity(m);
        let mut g = vec![0.0; m + 1];
        g[0] = beta;

        let mut converged_inner = false;
        let mut inner_iters: usize = 0;

        // ───── Arnoldi iteration ─────
        for j in 0..m {
            inner_iters = j + 1;
            total_iters += 1;

            a.matvec(&v_basis[j], &mut av);
            let mut w: Vec<f64> = av.iter().zip(inv_diag.iter()).map(|(v, d)| v * d).collect();

            for (i, vi) in v_basis.iter().enumerate().take(j + 1) {
                let h_ij = vec_dot(&w, vi);
                h_store[j * h_rows + i] = h_ij;
                vec_axpy(-h_ij, vi, &mut w);
            }

            let h_jp1_j = vec_norm(&w);
            h_store[j * h_rows + (j + 1)] = h_jp1_j;

            if h_jp1_j > 1e-300 {
                v_basis.push(w.iter().map(|wi| wi / h_jp1_j).collect());
            } else {
                v_basis.push(vec![0.0; n]);
            }

            for (i, rot) in givens.iter().enumerate() {
                let mut ha = h_store[j * h_rows + i];
                let mut hb = h_store[j * h_rows + i + 1];
                rot.apply(&mut ha, &mut hb);
                h_store[j * h_rows + i] = ha;
                h_store[j * h_rows + i + 1] = hb;
            }

            let rot = GivensRotation::compute(h_store[j * h_rows + j], h_store[j * h_rows + j + 1]);
            {
                let mut ha = h_store[j * h_rows + j];
                let mut hb = h_store[j * h_rows + j + 1];
                rot.apply(&mut ha, &mut hb);
                h_store[j * h_rows + j] = ha;
                h_store[j * h_rows + j + 1] = hb;
            }
            {
                let mut ga = g[j];
                let mut gb = g[j + 1];
                rot.apply(&mut ga, &mut gb);
                g[j] = ga;
                g[j + 1] = gb;
            }
            givens.push(rot);

            if g[j + 1].abs() < abs_tol || h_jp1_j < 1e-300 {
                converged_inner = true;
                break;
            }
        }

        // ───── back-substitution H y = g ─────
        let k = inner_iters;
        let mut y = vec![0.0; k];
        for i in (0..k).rev() {
            let mut sum = g[i];
            for (jj, yj) in y.iter().enumerate().skip(i + 1) {
                sum -= h_store[jj * h_rows + i] * yj;
            }
            let diag = h_store[i * h_rows + i];
            y[i] = if diag.abs() > 1e-300 { sum / diag } else { 0.0 };
        }

        for (yi, vi) in y.iter().zip(v_basis.iter()) {
            vec_axpy(*yi, vi, x);
        }

        precond_residual(a, &inv_diag, b, x, &mut r);
        beta = vec_norm(&r);

        // The Givens estimate can undershoot the true residual by rounding.
        if beta <= abs_tol || (converged_inner && beta <= 100.0 * abs_tol) {
            return GmresResult {
                iterations: total_iters,
                residual: beta,
                converged: true,
            };
        }
        if !beta.is_finite() {
            break;
        }
    }

    GmresResult {
        iterations: total_iters,
        residual: beta,
        converged: beta <= abs_tol,
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
