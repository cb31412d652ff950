// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Electron Background
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Electron background: profiles, distributions and their moments.
//!
//! Physical input lives in [`ElectronBackground`]; everything handed to
//! the rate code is normalised ([`NormalisedElectrons`]).

use std::f64::consts::PI;

use crm_types::constants::{EL_CHARGE, EL_MASS};
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::{cell_widths, Normalization, VelocityGrid};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// `4π Σ v² dv f`.
pub fn density_moment(v: &Array1<f64>, dv: &Array1<f64>, f: ArrayView1<f64>) -> f64 {
    4.0 * PI * v.iter().zip(dv).zip(f).map(|((v, dv), f)| v * v * dv * f).sum::<f64>()
}

/// `4π Σ v⁴ dv f`.
fn fourth_moment(v: &Array1<f64>, dv: &Array1<f64>, f: ArrayView1<f64>) -> f64 {
    4.0 * PI * v.iter().zip(dv).zip(f).map(|((v, dv), f)| v.powi(4) * dv * f).sum::<f64>()
}

/// Normalised temperature `(2/3)·4π Σ v⁴ dv f / n`; zero for an empty cell.
pub fn temperature_moment(grid: &VelocityGrid, f: ArrayView1<f64>) -> f64 {
    let n = density_moment(&grid.v, &grid.dv, f);
    if n <= 0.0 {
        return 0.0;
    }
    (2.0 / 3.0) * fourth_moment(&grid.v, &grid.dv, f) / n
}

/// Normalised Maxwellian `n (πT)^{-3/2} exp(-v²/T)` on `grid`.
pub fn maxwellian(grid: &VelocityGrid, density: f64, temperature: f64) -> Array1<f64> {
    let prefactor = density * (PI * temperature).powf(-1.5);
    grid.v.mapv(|v| prefactor * (-v * v / temperature).exp())
}

/// Maxwellians for every cell, `[num_x, num_v]`.
pub fn maxwellians(grid: &VelocityGrid, density: &Array1<f64>, temperature: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((density.len(), grid.len()));
    for (mut row, (&n, &t)) in out
        .axis_iter_mut(Axis(0))
        .zip(density.iter().zip(temperature.iter()))
    {
        row.assign(&maxwellian(grid, n, t));
    }
    out
}

/// Electron background in physical units.
#[derive(Debug, Clone)]
pub struct ElectronBackground {
    /// Cell centres [m].
    pub x: Array1<f64>,
    /// [eV]
    pub temperature: Array1<f64>,
    /// [m⁻³]
    pub density: Array1<f64>,
    /// Isotropic distribution `[num_x, num_v]` [s³ m⁻⁶], if known.
    pub distribution: Option<Array2<f64>>,
    /// Speed grid of `distribution` [m/s].
    pub velocity_grid: Option<Array1<f64>>,
}

impl ElectronBackground {
    /// Temperature/density profiles only; kinetic runs are unavailable.
    pub fn from_profiles(x: Array1<f64>, temperature: Array1<f64>, density: Array1<f64>) -> CrmResult<Self> {
        if temperature.len() != x.len() {
            return Err(CrmError::GridMismatch {
                expected: x.len(),
                got: temperature.len(),
            });
        }
        if density.len() != x.len() {
            return Err(CrmError::GridMismatch {
                expected: x.len(),
                got: density.len(),
            });
        }
        Ok(ElectronBackground {
            x,
            temperature,
            density,
            distribution: None,
            velocity_grid: None,
        })
    }

    /// From a distribution function; temperature and density are its moments.
    pub fn from_distribution(
        x: Array1<f64>,
        distribution: Array2<f64>,
        velocity_grid: Array1<f64>,
    ) -> CrmResult<Self> {
        let (num_x, num_v) = distribution.dim();
        if num_x != x.len() {
            return Err(CrmError::GridMismatch { expected: x.len(), got: num_x });
        }
        if num_v != velocity_grid.len() {
            return Err(CrmError::GridMismatch {
                expected: velocity_grid.len(),
                got: num_v,
            });
        }
        let dv = cell_widths(&velocity_grid.to_vec());
        let mut density = Array1::zeros(num_x);
        let mut temperature = Array1::zeros(num_x);
        for (i, f) in distribution.axis_iter(Axis(0)).enumerate() {
            let n = density_moment(&velocity_grid, &dv, f);
            if n <= 0.0 || !n.is_finite() {
                return Err(CrmError::PhysicsViolation(format!(
                    "distribution in cell {i} has non-positive density {n}"
                )));
            }
            density[i] = n;
            temperature[i] = EL_MASS * fourth_moment(&velocity_grid, &dv, f) / (3.0 * n * EL_CHARGE);
        }
        Ok(ElectronBackground {
            x,
            temperature,
            density,
            distribution: Some(distribution),
            velocity_grid: Some(velocity_grid),
        })
    }

    pub fn num_x(&self) -> usize {
        self.x.len()
    }
}

/// Normalised electron quantities on the model's velocity grid.
#[derive(Debug, Clone)]
pub struct NormalisedElectrons {
    pub grid: VelocityGrid,
    pub density: Array1<f64>,
    pub temperature: Array1<f64>,
    pub kinetic: Option<Array2<f64>>,
    pub maxwellian: Array2<f64>,
}

impl NormalisedElectrons {
    pub fn new(background: &ElectronBackground, norm: &Normalization) -> CrmResult<Self> {
        let grid = match &background.velocity_grid {
            Some(v) => VelocityGrid::from_centres(v.mapv(|v| v / norm.velocity))?,
            None => VelocityGrid::default_normalised(),
        };
        let density = background.density.mapv(|n| n / norm.density);
        let temperature = background.temperature.mapv(|t| t / norm.temperature);
        let f_scale = norm.velocity.powi(3) / norm.density;
        let kinetic = background.distribution.as_ref().map(|f| f.mapv(|f| f * f_scale));
        let maxwellian = maxwellians(&grid, &density, &temperature);
        Ok(NormalisedElectrons {
            grid,
            density,
            temperature,
            kinetic,
            maxwellian,
        })
    }
}
