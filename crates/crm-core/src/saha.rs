// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Saha-Boltzmann Equilibrium
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Local thermodynamic equilibrium reference populations.
//!
//! Stage balance (normalised units):
//!
//! ```text
//! n_{z+1} / n_z = 2 (U_{z+1} / U_z) T^{3/2} exp(-χ_z / T) / (n_e · tbrec_norm)
//! ```
//!
//! with `U_z = Σ g_s exp(-(E_s - E_ground) / T)` the partition function of
//! stage `z`. Within a stage, states follow Boltzmann. Ratios are chained
//! in log space so deep stages do not overflow.

use crm_types::error::{CrmError, CrmResult};
use crm_types::state::Normalization;
use ndarray::{Array1, Array2, Axis};

use crate::atomic::StateTable;

/// `U_z` at `te_ev`, relative to the stage ground state.
pub fn partition_function(states: &StateTable, stage: usize, te_ev: f64) -> CrmResult<f64> {
    let e0 = states.ground_state(stage)?.energy;
    Ok(states
        .states_in_stage(stage)
        .map(|s| s.statistical_weight as f64 * (-(s.energy - e0) / te_ev).exp())
        .sum())
}

/// Boltzmann fraction of every state of `stage`, as `(location_index, fraction)`.
pub fn boltzmann_fractions(states: &StateTable, stage: usize, te_ev: f64) -> CrmResult<Vec<(usize, f64)>> {
    let e0 = states.ground_state(stage)?.energy;
    let u = partition_function(states, stage, te_ev)?;
    Ok(states
        .states_in_stage(stage)
        .map(|s| {
            let w = s.statistical_weight as f64 * (-(s.energy - e0) / te_ev).exp();
            (s.location_index, w / u)
        })
        .collect())
}

/// Fraction of the species in each stage of `states.stages()`.
/// `ne` and `te` are normalised.
pub fn stage_fractions(states: &StateTable, ne: f64, te: f64, norm: &Normalization) -> CrmResult<Vec<f64>> {
    if !(ne.is_finite() && ne > 0.0 && te.is_finite() && te > 0.0) {
        return Err(CrmError::PhysicsViolation(format!(
            "Saha balance needs positive n_e and T_e, got {ne} and {te}"
        )));
    }
    let stages = states.stages();
    let te_ev = te * norm.temperature;
    let mut log_n = Vec::with_capacity(stages.len());
    log_n.push(0.0);
    for pair in stages.windows(2) {
        let (z, z1) = (pair[0], pair[1]);
        if z1 != z + 1 {
            return Err(CrmError::DataError(format!(
                "ionization stages {z} and {z1} are not consecutive"
            )));
        }
        let chi = states.ionization_energy(z)? / norm.temperature;
        let u_ratio = partition_function(states, z1, te_ev)? / partition_function(states, z, te_ev)?;
        let log_ratio = (2.0 * u_ratio).ln() + 1.5 * te.ln() - chi / te - (ne * norm.tbrec_norm).ln();
        let prev = log_n[log_n.len() - 1];
        log_n.push(prev + log_ratio);
    }
    let max = log_n.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = log_n.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / sum).collect())
}

/// Saha-Boltzmann densities of one cell holding `total` particles.
pub fn saha_boltzmann_cell(
    states: &StateTable,
    ne: f64,
    te: f64,
    total: f64,
    norm: &Normalization,
) -> CrmResult<Vec<f64>> {
    let fractions = stage_fractions(states, ne, te, norm)?;
    let te_ev = te * norm.temperature;
    let mut out = vec![0.0; states.len()];
    for (&stage, frac) in states.stages().iter().zip(fractions) {
        for (loc, f) in boltzmann_fractions(states, stage, te_ev)? {
            out[loc] = total * frac * f;
        }
    }
    Ok(out)
}

/// Saha-Boltzmann densities over the grid, `[num_x, num_states]`.
pub fn saha_boltzmann(
    states: &StateTable,
    ne: &Array1<f64>,
    te: &Array1<f64>,
    totals: &Array1<f64>,
    norm: &Normalization,
) -> CrmResult<Array2<f64>> {
    let num_x = ne.len();
    if te.len() != num_x || totals.len() != num_x {
        return Err(CrmError::GridMismatch {
            expected: num_x,
            got: te.len().min(totals.len()),
        });
    }
    let mut out = Array2::zeros((num_x, states.len()));
    for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let cell = saha_boltzmann_cell(states, ne[i], te[i], totals[i], norm)?;
        row.assign(&Array1::from(cell));
    }
    Ok(out)
}
