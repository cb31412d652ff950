// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Rate Integrals
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cross sections on the velocity grid and their rate integrals.
//!
//! All speeds are in units of `v_th`, energies in units of `T_norm` and
//! cross sections in units of `σ₀`. The collisional rate of a process
//! with cross section σ is
//!
//! ```text
//! K = collrate_const · 4π Σ_i v_i³ dv_i σ_i f_i
//! ```
//!
//! Inverse processes use kernels derived by detailed balance, with the
//! forward cross section evaluated at the threshold-shifted speed
//! `v'² = v² + ε`:
//!
//! ```text
//! de-excitation     σ_deex(v) = (g_from/g_to) (v'²/v²) σ_ex(v')
//! three-body recomb σ_tbr(v)  = ½ (g_from/g_to) T^{-3/2} (v'²/v²) σ_ion(v')
//! ```

use std::f64::consts::PI;

use crm_math::interp::LinearTable;
use crm_types::state::{Normalization, VelocityGrid};
use ndarray::{Array1, ArrayView1};

/// `4π Σ v³ dv σ f`.
pub fn collisional_integral(grid: &VelocityGrid, sigma: &Array1<f64>, f: ArrayView1<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..grid.len() {
        let s = sigma[i];
        if s != 0.0 {
            let v = grid.v[i];
            sum += v * v * v * grid.dv[i] * s * f[i];
        }
    }
    4.0 * PI * sum
}

/// σ(E)/σ₀ at `energy_ev`, zero below `threshold_ev` or outside the table.
fn sample(table: &LinearTable, energy_ev: f64, threshold_ev: f64, sigma_0: f64) -> f64 {
    if energy_ev < threshold_ev {
        return 0.0;
    }
    table.eval_or_zero(energy_ev).max(0.0) / sigma_0
}

/// Forward cross section on the grid, `E = T_norm v²`.
pub fn cross_section_on_grid(
    table: &LinearTable,
    threshold_ev: f64,
    grid: &VelocityGrid,
    norm: &Normalization,
) -> Array1<f64> {
    grid.v
        .mapv(|v| sample(table, norm.temperature * v * v, threshold_ev, norm.cross_section))
}

/// Detailed-balance kernel `(v'²/v²) σ(v')` for the inverse of a process
/// with threshold `threshold_ev`, without statistical-weight factors.
///
/// σ(v') is read from the table at `E + threshold` directly rather than
/// interpolated between grid points.
pub fn shifted_kernel(
    table: &LinearTable,
    threshold_ev: f64,
    grid: &VelocityGrid,
    norm: &Normalization,
) -> Array1<f64> {
    let eps = threshold_ev / norm.temperature;
    grid.v.mapv(|v| {
        let v2 = v * v;
        let e_shifted = norm.temperature * (v2 + eps);
        (v2 + eps) / v2 * sample(table, e_shifted, threshold_ev, norm.cross_section)
    })
}
