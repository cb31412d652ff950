// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Rate Matrix Builder
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-cell rate matrices.
//!
//! Column `s` of a rate matrix holds every process leaving state `s`:
//! a loss on the diagonal and a matching gain in the destination row,
//! so `dn/dt = R n` conserves the cell total and every column sums to
//! zero.

use crm_math::linalg::LinearSystem;
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::{Normalization, VelocityGrid};
use ndarray::{Array1, ArrayView2, Axis};
use rayon::prelude::*;

pub use crate::transitions::LocalElectronState;
use crate::transitions::{RatePair, TransitionSet};

/// Rate matrix of one cell together with the rates that built it.
#[derive(Debug, Clone)]
pub struct RateMatrix<S: LinearSystem> {
    pub cell: usize,
    pub system: S,
    /// Forward/inverse rate per transition, in `TransitionSet` order.
    rates: Vec<RatePair>,
}

impl<S: LinearSystem> RateMatrix<S> {
    /// Wrap an assembled system that has no per-transition rates.
    pub fn from_system(cell: usize, system: S) -> Self {
        RateMatrix {
            cell,
            system,
            rates: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.system.dim()
    }

    pub fn column_sums(&self) -> Vec<f64> {
        self.system.column_sums()
    }

    /// Normalised rates per transition.
    pub fn rate_coefficients(&self) -> &[RatePair] {
        &self.rates
    }

    /// `R n`.
    pub fn apply(&self, densities: &[f64]) -> CrmResult<Vec<f64>> {
        Ok(self.system.multiply(densities)?)
    }
}

pub struct RateMatrixBuilder<'a> {
    transitions: &'a TransitionSet,
    grid: &'a VelocityGrid,
    norm: &'a Normalization,
}

impl<'a> RateMatrixBuilder<'a> {
    pub fn new(transitions: &'a TransitionSet, grid: &'a VelocityGrid, norm: &'a Normalization) -> Self {
        RateMatrixBuilder { transitions, grid, norm }
    }

    pub fn build<S: LinearSystem>(&self, cell: usize, local: &LocalElectronState) -> CrmResult<RateMatrix<S>> {
        if local.distribution.len() != self.grid.len() {
            return Err(CrmError::GridMismatch {
                expected: self.grid.len(),
                got: local.distribution.len(),
            });
        }
        if !local.temperature.is_finite() || local.temperature <= 0.0 || !local.density.is_finite() || local.density < 0.0 {
            return Err(CrmError::PhysicsViolation(format!(
                "cell {cell}: electron temperature {} / density {} out of range",
                local.temperature, local.density
            )));
        }
        let mut system = S::zeros(self.transitions.num_states());
        let rates = self
            .transitions
            .iter()
            .map(|t| t.accumulate(&mut system, local, self.grid, self.norm))
            .collect();
        Ok(RateMatrix { cell, system, rates })
    }

    /// One matrix per cell. `distribution` is `[num_x, num_v]`.
    pub fn build_all<S: LinearSystem>(
        &self,
        density: &Array1<f64>,
        temperature: &Array1<f64>,
        distribution: ArrayView2<f64>,
    ) -> CrmResult<Vec<RateMatrix<S>>> {
        let num_x = density.len();
        if temperature.len() != num_x {
            return Err(CrmError::GridMismatch {
                expected: num_x,
                got: temperature.len(),
            });
        }
        if distribution.nrows() != num_x {
            return Err(CrmError::GridMismatch {
                expected: num_x,
                got: distribution.nrows(),
            });
        }
        let rows: Vec<_> = distribution.axis_iter(Axis(0)).collect();
        let matrices = rows
            .into_par_iter()
            .enumerate()
            .map(|(cell, f)| {
                let local = LocalElectronState {
                    density: density[cell],
                    temperature: temperature[cell],
                    distribution: f,
                };
                self.build::<S>(cell, &local)
            })
            .collect::<CrmResult<Vec<_>>>()?;
        log::debug!(
            "Built {} rate matrices of dimension {}",
            matrices.len(),
            self.transitions.num_states()
        );
        Ok(matrices)
    }
}
