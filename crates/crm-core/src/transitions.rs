// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Transition Set
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Typed transitions between catalogued states.
//!
//! A [`Transition`] is built once per run from a [`TransitionRecord`]
//! and carries everything needed to evaluate its rate in any cell:
//! cross sections sampled on the velocity grid, detailed-balance
//! kernels for the inverse process, or a fixed/interpolated rate.
//! [`Transition::accumulate`] is the uniform entry point used by the
//! rate-matrix builder.

use std::collections::BTreeMap;

use crm_math::interp::LinearTable;
use crm_math::linalg::LinearSystem;
use crm_types::config::ProcessToggles;
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::{Normalization, VelocityGrid};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::atomic::{State, StateTable};
use crate::rates::{collisional_integral, cross_section_on_grid, shifted_kernel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Ionization,
    RadiativeRecombination,
    Excitation,
    Deexcitation,
    SpontaneousEmission,
    Autoionization,
}

/// `(stage, name)` reference to a catalogued state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateKey {
    pub stage: usize,
    pub name: String,
}

impl StateKey {
    pub fn new(stage: usize, name: &str) -> Self {
        StateKey {
            stage,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateData {
    /// Energy [eV] → cross section [m²].
    CrossSection { energy: Vec<f64>, sigma: Vec<f64> },
    /// Fixed rate [s⁻¹].
    RateCoefficient { rate: f64 },
    /// Electron temperature [eV] → rate coefficient [m³ s⁻¹].
    Interpolant { temperature: Vec<f64>, coefficient: Vec<f64> },
}

/// One row of the transition catalog.
///
/// Accepted kinds are `Ionization` and `Excitation` (with
/// `CrossSection`), `RadiativeRecombination` (with `Interpolant`) and
/// `Autoionization` (with `RateCoefficient`). De-excitation and
/// three-body recombination are derived; spontaneous emission comes
/// from [`SpontaneousEmissionRecord`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: TransitionKind,
    pub from: StateKey,
    pub to: StateKey,
    pub data: RateData,
}

/// Row of the spontaneous-emission rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpontaneousEmissionRecord {
    pub stage: usize,
    pub upper: String,
    pub lower: String,
    /// [s⁻¹]
    pub rate: f64,
}

/// Local electron state of one cell, normalised.
#[derive(Debug, Clone, Copy)]
pub struct LocalElectronState<'a> {
    pub density: f64,
    pub temperature: f64,
    /// Distribution on the shared velocity grid.
    pub distribution: ArrayView1<'a, f64>,
}

/// Rate model of a built transition.
#[derive(Debug, Clone)]
pub enum RateModel {
    /// Ionization with three-body recombination as inverse. `sigma_tbr`
    /// already holds ½ (g_from/g_to) (v'²/v²) σ(v'); the `T^{-3/2}` factor
    /// is applied per cell.
    Ionization { sigma: Array1<f64>, sigma_tbr: Array1<f64> },
    /// Excitation with de-excitation as inverse.
    Excitation { sigma: Array1<f64>, sigma_deex: Array1<f64> },
    /// α(T_e) [m³ s⁻¹], table in eV.
    RadiativeRecombination(LinearTable),
    /// Normalised fixed rate.
    Constant(f64),
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub kind: TransitionKind,
    pub from: usize,
    pub to: usize,
    /// `E_to - E_from` [eV].
    pub threshold: f64,
    pub model: RateModel,
}

/// Forward (`from → to`) and inverse (`to → from`) normalised rates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatePair {
    pub forward: f64,
    pub inverse: f64,
}

impl Transition {
    /// Kind of the derived inverse process, if any.
    pub fn inverse_kind(&self) -> Option<TransitionKind> {
        match self.kind {
            TransitionKind::Excitation => Some(TransitionKind::Deexcitation),
            _ => None,
        }
    }

    pub fn has_inverse(&self) -> bool {
        matches!(self.model, RateModel::Ionization { .. } | RateModel::Excitation { .. })
    }

    /// Rates in one cell.
    pub fn rates(&self, local: &LocalElectronState, grid: &VelocityGrid, norm: &Normalization) -> RatePair {
        match &self.model {
            RateModel::Ionization { sigma, sigma_tbr } => {
                let f = local.distribution;
                let forward = norm.collrate_const * collisional_integral(grid, sigma, f);
                let inverse = local.density
                    * norm.collrate_const
                    * norm.tbrec_norm
                    * local.temperature.powf(-1.5)
                    * collisional_integral(grid, sigma_tbr, f);
                RatePair { forward, inverse }
            }
            RateModel::Excitation { sigma, sigma_deex } => {
                let f = local.distribution;
                RatePair {
                    forward: norm.collrate_const * collisional_integral(grid, sigma, f),
                    inverse: norm.collrate_const * collisional_integral(grid, sigma_deex, f),
                }
            }
            RateModel::RadiativeRecombination(table) => {
                let alpha = table.eval(local.temperature * norm.temperature);
                if alpha < 0.0 {
                    log::warn!(
                        "Radiative recombination {} -> {} clamped: alpha = {alpha:.3e} at Te = {:.3} eV",
                        self.from,
                        self.to,
                        local.temperature * norm.temperature
                    );
                }
                RatePair {
                    forward: local.density * norm.rate_coefficient(alpha).max(0.0),
                    inverse: 0.0,
                }
            }
            RateModel::Constant(rate) => RatePair {
                forward: *rate,
                inverse: 0.0,
            },
        }
    }

    /// Add this transition's loss/gain pairs to `matrix` and return the rates used.
    pub fn accumulate<S: LinearSystem>(
        &self,
        matrix: &mut S,
        local: &LocalElectronState,
        grid: &VelocityGrid,
        norm: &Normalization,
    ) -> RatePair {
        let pair = self.rates(local, grid, norm);
        if pair.forward != 0.0 {
            matrix.add(self.from, self.from, -pair.forward);
            matrix.add(self.to, self.from, pair.forward);
        }
        if pair.inverse != 0.0 {
            matrix.add(self.to, self.to, -pair.inverse);
            matrix.add(self.from, self.to, pair.inverse);
        }
        pair
    }
}

#[derive(Debug, Clone)]
pub struct TransitionSet {
    transitions: Vec<Transition>,
    num_states: usize,
}

fn resolve<'a>(states: &'a StateTable, key: &StateKey) -> Option<&'a State> {
    states.lookup(key.stage, &key.name)
}

fn cross_section_table(energy: &[f64], sigma: &[f64]) -> CrmResult<LinearTable> {
    LinearTable::new(energy.to_vec(), sigma.to_vec())
        .map_err(|e| CrmError::DataError(format!("cross-section table: {e}")))
}

impl TransitionSet {
    pub fn build(
        states: &StateTable,
        catalog: &[TransitionRecord],
        spontem: &[SpontaneousEmissionRecord],
        enabled: &ProcessToggles,
        grid: &VelocityGrid,
        norm: &Normalization,
    ) -> CrmResult<Self> {
        let mut transitions = Vec::new();
        let mut dropped = 0usize;

        for rec in catalog {
            let (from, to) = match (resolve(states, &rec.from), resolve(states, &rec.to)) {
                (Some(f), Some(t)) => (f, t),
                _ => {
                    log::debug!(
                        "Dropping {:?} {}:{} -> {}:{}: state not in table",
                        rec.kind,
                        rec.from.stage,
                        rec.from.name,
                        rec.to.stage,
                        rec.to.name
                    );
                    dropped += 1;
                    continue;
                }
            };
            let threshold = to.energy - from.energy;
            let g_ratio = from.statistical_weight as f64 / to.statistical_weight as f64;

            let model = match (rec.kind, &rec.data) {
                (TransitionKind::Ionization, RateData::CrossSection { energy, sigma }) => {
                    if !enabled.ionization {
                        continue;
                    }
                    if to.ionization_stage != from.ionization_stage + 1 {
                        return Err(CrmError::DataError(format!(
                            "ionization {}:{} -> {}:{} must raise the stage by one",
                            from.ionization_stage, from.name, to.ionization_stage, to.name
                        )));
                    }
                    if threshold <= 0.0 {
                        return Err(CrmError::DataError(format!(
                            "ionization {}:{} -> {}:{} has non-positive threshold {threshold}",
                            from.ionization_stage, from.name, to.ionization_stage, to.name
                        )));
                    }
                    let table = cross_section_table(energy, sigma)?;
                    let sigma = cross_section_on_grid(&table, threshold, grid, norm);
                    let sigma_tbr = shifted_kernel(&table, threshold, grid, norm) * (0.5 * g_ratio);
                    RateModel::Ionization { sigma, sigma_tbr }
                }
                (TransitionKind::Excitation, RateData::CrossSection { energy, sigma }) => {
                    if !enabled.excitation {
                        continue;
                    }
                    if threshold < 0.0 {
                        return Err(CrmError::DataError(format!(
                            "excitation {}:{} -> {}:{} goes down in energy",
                            from.ionization_stage, from.name, to.ionization_stage, to.name
                        )));
                    }
                    let table = cross_section_table(energy, sigma)?;
                    let sigma = cross_section_on_grid(&table, threshold, grid, norm);
                    let sigma_deex = shifted_kernel(&table, threshold, grid, norm) * g_ratio;
                    RateModel::Excitation { sigma, sigma_deex }
                }
                (
                    TransitionKind::RadiativeRecombination,
                    RateData::Interpolant {
                        temperature,
                        coefficient,
                    },
                ) => {
                    if !enabled.radiative_recombination {
                        continue;
                    }
                    let table = LinearTable::new(temperature.clone(), coefficient.clone())
                        .map_err(|e| CrmError::DataError(format!("radiative recombination table: {e}")))?;
                    RateModel::RadiativeRecombination(table)
                }
                (TransitionKind::Autoionization, RateData::RateCoefficient { rate }) => {
                    if !enabled.autoionization {
                        continue;
                    }
                    if !rate.is_finite() || *rate < 0.0 {
                        return Err(CrmError::DataError(format!("autoionization rate {rate} is invalid")));
                    }
                    RateModel::Constant(norm.rate(*rate))
                }
                (kind, data) => {
                    return Err(CrmError::DataError(format!(
                        "unsupported catalog entry: {kind:?} with {}",
                        match data {
                            RateData::CrossSection { .. } => "cross section",
                            RateData::RateCoefficient { .. } => "rate coefficient",
                            RateData::Interpolant { .. } => "interpolant",
                        }
                    )));
                }
            };

            transitions.push(Transition {
                kind: rec.kind,
                from: from.location_index,
                to: to.location_index,
                threshold,
                model,
            });
        }

        if enabled.emission {
            // (stage, upper, lower) -> (sum, count)
            let mut grouped: BTreeMap<(usize, &str, &str), (f64, usize)> = BTreeMap::new();
            for rec in spontem {
                let entry = grouped
                    .entry((rec.stage, rec.upper.as_str(), rec.lower.as_str()))
                    .or_insert((0.0, 0));
                entry.0 += rec.rate;
                entry.1 += 1;
            }
            for ((stage, upper, lower), (sum, count)) in grouped {
                let (Some(from), Some(to)) = (states.lookup(stage, upper), states.lookup(stage, lower)) else {
                    log::debug!("Dropping spontaneous emission {stage}:{upper} -> {lower}: state not in table");
                    dropped += 1;
                    continue;
                };
                let rate = sum / count as f64;
                if !rate.is_finite() || rate < 0.0 {
                    return Err(CrmError::DataError(format!(
                        "spontaneous emission {stage}:{upper} -> {lower} has invalid rate {rate}"
                    )));
                }
                transitions.push(Transition {
                    kind: TransitionKind::SpontaneousEmission,
                    from: from.location_index,
                    to: to.location_index,
                    threshold: to.energy - from.energy,
                    model: RateModel::Constant(norm.rate(rate)),
                });
            }
        }

        log::info!(
            "Built {} transitions over {} states ({} dropped)",
            transitions.len(),
            states.len(),
            dropped
        );
        Ok(TransitionSet {
            transitions,
            num_states: states.len(),
        })
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Transition> {
        self.transitions.get(i)
    }

    /// Indices of transitions whose forward kind is `kind`.
    pub fn indices_of(&self, kind: TransitionKind) -> Vec<usize> {
        self.transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }
}
