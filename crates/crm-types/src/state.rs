// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::constants::{EL_CHARGE, EL_MASS, EPSILON_0, PLANCK_H, SIGMA_0};
use crate::error::{CrmError, CrmResult};

/// Cell widths for a cell-centred grid.
///
/// `w[0] = 2 c[0]`, `w[i] = 2 (c[i] - c[i-1]) - w[i-1]`, i.e. the first
/// cell starts at zero and each cell edge sits halfway between centres
/// as seen from the previous edge.
pub fn cell_widths(centres: &[f64]) -> Array1<f64> {
    let n = centres.len();
    let mut w = Array1::zeros(n);
    if n == 0 {
        return w;
    }
    w[0] = 2.0 * centres[0];
    for i in 1..n {
        w[i] = 2.0 * (centres[i] - centres[i - 1]) - w[i - 1];
    }
    w
}

/// Speed grid in units of the thermal speed `v_th`.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityGrid {
    pub v: Array1<f64>, // cell centres
    pub dv: Array1<f64>, // cell widths
}

/// Default geometric grid: 120 cells, first width 0.02 v_th, growth 1.03.
/// Reaches ~22 v_th, i.e. ~500 T_norm.
const DEFAULT_NUM_V: usize = 120;
const DEFAULT_DV0: f64 = 0.02;
const DEFAULT_DV_GROWTH: f64 = 1.03;

impl VelocityGrid {
    /// Build from cell centres. Centres must be positive and strictly
    /// increasing, and the implied widths must be positive.
    pub fn from_centres(v: Array1<f64>) -> CrmResult<Self> {
        if v.is_empty() {
            return Err(CrmError::PhysicsViolation(
                "velocity grid must contain at least one cell".into(),
            ));
        }
        if v.iter().any(|x| !x.is_finite() || *x <= 0.0) {
            return Err(CrmError::PhysicsViolation(
                "velocity grid centres must be finite and > 0".into(),
            ));
        }
        for i in 1..v.len() {
            if v[i] <= v[i - 1] {
                return Err(CrmError::PhysicsViolation(format!(
                    "velocity grid not strictly increasing at {i}: {} <= {}",
                    v[i],
                    v[i - 1]
                )));
            }
        }
        let dv = cell_widths(&v.to_vec());
        if let Some((i, w)) = dv.iter().enumerate().find(|(_, w)| **w <= 0.0) {
            return Err(CrmError::PhysicsViolation(format!(
                "velocity grid implies non-positive cell width {w} at {i}"
            )));
        }
        Ok(VelocityGrid { v, dv })
    }

    /// Uniform grid with `n` cells of width `dv`; centres at `(i + ½) dv`.
    pub fn uniform(n: usize, dv: f64) -> Self {
        let v = Array1::from_shape_fn(n, |i| (i as f64 + 0.5) * dv);
        let widths = Array1::from_elem(n, dv);
        VelocityGrid { v, dv: widths }
    }

    /// Geometric grid: widths `dv0 * growth^i`, first cell starting at 0.
    pub fn geometric(n: usize, dv0: f64, growth: f64) -> Self {
        let dv = Array1::from_shape_fn(n, |i| dv0 * growth.powi(i as i32));
        let mut v = Array1::zeros(n);
        if n > 0 {
            v[0] = 0.5 * dv[0];
        }
        for i in 1..n {
            v[i] = v[i - 1] + 0.5 * (dv[i - 1] + dv[i]);
        }
        VelocityGrid { v, dv }
    }

    pub fn default_normalised() -> Self {
        Self::geometric(DEFAULT_NUM_V, DEFAULT_DV0, DEFAULT_DV_GROWTH)
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }
}

/// 1D spatial grid [m] with integration widths.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid {
    pub x: Array1<f64>,
    pub dx: Array1<f64>,
}

impl SpatialGrid {
    /// Widths are half the distance between neighbouring centres, one-sided
    /// at the ends. A single cell has unit width.
    pub fn new(x: Array1<f64>) -> Self {
        let n = x.len();
        let mut dx = Array1::zeros(n);
        if n == 1 {
            dx[0] = 1.0;
        } else if n > 1 {
            dx[0] = x[1] - x[0];
            dx[n - 1] = x[n - 1] - x[n - 2];
            for i in 1..n - 1 {
                dx[i] = 0.5 * (x[i + 1] - x[i - 1]);
            }
        }
        SpatialGrid { x, dx }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// NRL electron-ion Coulomb logarithm (Z = 1), `te` in eV, `ne` in m⁻³.
pub fn coulomb_log_ei(te_ev: f64, ne_m3: f64) -> f64 {
    let ne_cm3 = ne_m3 * 1e-6;
    if te_ev < 10.0 {
        23.0 - (ne_cm3.sqrt() * te_ev.powf(-1.5)).ln()
    } else {
        24.0 - (ne_cm3.sqrt() / te_ev).ln()
    }
}

/// Normalisation constants. Every quantity inside the model is divided by
/// the matching scale; multiply back to recover physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Temperature scale [eV].
    pub temperature: f64,
    /// Density scale [m⁻³].
    pub density: f64,
    /// Thermal speed `sqrt(2 T e / m_e)` [m/s].
    pub velocity: f64,
    /// Electron-ion collision time [s].
    pub time: f64,
    /// `velocity * time` [m].
    pub length: f64,
    /// Cross-section scale [m²].
    pub cross_section: f64,
    /// `density * velocity * cross_section * time`: converts the normalised
    /// velocity-space integral into a normalised rate.
    pub collrate_const: f64,
    /// `density * λ_dB(T_norm)³`: three-body recombination scale.
    pub tbrec_norm: f64,
}

impl Normalization {
    /// Derive the scales from electron profiles.
    /// `T_norm = mean(Te)`, `n_norm = mean(ne) * frac_imp_dens`.
    pub fn from_profiles(te_ev: &[f64], ne_m3: &[f64], frac_imp_dens: f64) -> CrmResult<Self> {
        if te_ev.is_empty() || te_ev.len() != ne_m3.len() {
            return Err(CrmError::GridMismatch {
                expected: te_ev.len(),
                got: ne_m3.len(),
            });
        }
        if te_ev.iter().chain(ne_m3.iter()).any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(CrmError::PhysicsViolation(
                "electron temperature and density must be finite and > 0".into(),
            ));
        }
        let t_norm = te_ev.iter().sum::<f64>() / te_ev.len() as f64;
        let n_norm = ne_m3.iter().sum::<f64>() / ne_m3.len() as f64 * frac_imp_dens;
        let v_th = (2.0 * t_norm * EL_CHARGE / EL_MASS).sqrt();

        let gamma_ee_0 = EL_CHARGE.powi(4) / (4.0 * std::f64::consts::PI * (EL_MASS * EPSILON_0).powi(2));
        let gamma_ei_0 = gamma_ee_0;
        let t_scale = v_th.powi(3) / (gamma_ei_0 * n_norm * coulomb_log_ei(t_norm, n_norm));
        let de_broglie = (PLANCK_H * PLANCK_H
            / (2.0 * std::f64::consts::PI * EL_MASS * t_norm * EL_CHARGE))
            .sqrt();

        Ok(Normalization {
            temperature: t_norm,
            density: n_norm,
            velocity: v_th,
            time: t_scale,
            length: v_th * t_scale,
            cross_section: SIGMA_0,
            collrate_const: n_norm * v_th * SIGMA_0 * t_scale,
            tbrec_norm: n_norm * de_broglie.powi(3),
        })
    }

    /// Identity scales, for inputs that are already normalised.
    pub fn unit() -> Self {
        Normalization {
            temperature: 1.0,
            density: 1.0,
            velocity: 1.0,
            time: 1.0,
            length: 1.0,
            cross_section: 1.0,
            collrate_const: 1.0,
            tbrec_norm: 1.0,
        }
    }

    /// Rate coefficient [m³ s⁻¹] → normalised rate per unit normalised density.
    pub fn rate_coefficient(&self, alpha_m3_s: f64) -> f64 {
        alpha_m3_s * self.density * self.time
    }

    /// Rate [s⁻¹] → normalised rate.
    pub fn rate(&self, per_second: f64) -> f64 {
        per_second * self.time
    }

    /// Power density [W m⁻³] of a process with energy `energy_ev` per event,
    /// normalised rate `rate` acting on normalised density `density`.
    pub fn power_density(&self, energy_ev: f64, rate: f64, density: f64) -> f64 {
        energy_ev * EL_CHARGE * density * self.density * rate / self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_widths_match_rule() {
        let grid = VelocityGrid::uniform(10, 0.1);
        let w = cell_widths(grid.v.as_slice().unwrap());
        for i in 0..10 {
            assert!((w[i] - 0.1).abs() < 1e-12, "width[{i}] = {}", w[i]);
            assert!((grid.dv[i] - 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_geometric_grid_widths_consistent() {
        let grid = VelocityGrid::geometric(50, 0.02, 1.05);
        let w = cell_widths(grid.v.as_slice().unwrap());
        for i in 0..50 {
            assert!(
                (w[i] - grid.dv[i]).abs() < 1e-10,
                "width mismatch at {i}: {} vs {}",
                w[i],
                grid.dv[i]
            );
        }
        // Edges: sum of widths equals the outer edge position.
        let edge = grid.v[49] + 0.5 * grid.dv[49];
        assert!((grid.dv.sum() - edge).abs() < 1e-10);
    }

    #[test]
    fn test_from_centres_rejects_bad_grids() {
        assert!(VelocityGrid::from_centres(Array1::from(vec![])).is_err());
        assert!(VelocityGrid::from_centres(Array1::from(vec![0.0, 1.0])).is_err());
        assert!(VelocityGrid::from_centres(Array1::from(vec![1.0, 0.5])).is_err());
        assert!(VelocityGrid::from_centres(Array1::from(vec![0.05, 0.15, 0.25])).is_ok());
    }

    #[test]
    fn test_default_grid_reaches_high_energy() {
        let grid = VelocityGrid::default_normalised();
        assert_eq!(grid.len(), 120);
        assert!(grid.v[119] > 15.0, "v_max = {}", grid.v[119]);
    }

    #[test]
    fn test_spatial_widths() {
        let grid = SpatialGrid::new(Array1::linspace(0.0, 9.0, 10));
        for i in 0..10 {
            assert!((grid.dx[i] - 1.0).abs() < 1e-12);
        }
        let single = SpatialGrid::new(Array1::from(vec![3.0]));
        assert_eq!(single.dx[0], 1.0);
    }

    #[test]
    fn test_normalization_scales() {
        let te = vec![10.0; 4];
        let ne = vec![1.0e19; 4];
        let norm = Normalization::from_profiles(&te, &ne, 0.05).unwrap();
        assert!((norm.temperature - 10.0).abs() < 1e-12);
        assert!((norm.density - 5.0e17).abs() < 1.0);
        // v_th = sqrt(2 * 10 eV / m_e) ≈ 1.8755e6 m/s
        assert!((norm.velocity - 1.8755e6).abs() / 1.8755e6 < 1e-3);
        assert!(norm.time > 0.0 && norm.time.is_finite());
        assert!((norm.length - norm.velocity * norm.time).abs() / norm.length < 1e-12);
        let expected = norm.density * norm.velocity * SIGMA_0 * norm.time;
        assert!((norm.collrate_const - expected).abs() / expected < 1e-12);
        assert!(norm.tbrec_norm > 0.0);
    }

    #[test]
    fn test_normalization_rejects_mismatch() {
        assert!(Normalization::from_profiles(&[1.0, 2.0], &[1.0], 0.1).is_err());
        assert!(Normalization::from_profiles(&[1.0], &[-1.0], 0.1).is_err());
    }

    #[test]
    fn test_coulomb_log_branches_are_continuous_enough() {
        let below = coulomb_log_ei(9.999, 1e19);
        let above = coulomb_log_ei(10.001, 1e19);
        assert!((below - above).abs() < 0.2, "{below} vs {above}");
    }
}
