// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Diagnostics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Derived quantities of a density field: charge moments, stage
//! densities, radiated power and effective (reduced) rate matrices.
//! Nothing here is cached; every call recomputes from its inputs.

use crm_math::linalg::{DenseSystem, LinearSystem};
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::{Normalization, SpatialGrid};
use ndarray::{s, Array1, Array2, Axis};

use crate::atomic::StateTable;
use crate::rate_matrix::RateMatrix;
use crate::transitions::{TransitionKind, TransitionSet};

/// `Σ n_s Z_s² / n_e` per cell; zero where the cell holds no impurity.
pub fn z_eff(states: &StateTable, densities: &Array2<f64>, ne: &Array1<f64>) -> CrmResult<Array1<f64>> {
    if ne.len() != densities.nrows() {
        return Err(CrmError::GridMismatch {
            expected: densities.nrows(),
            got: ne.len(),
        });
    }
    let z = states.charges();
    Ok(densities
        .axis_iter(Axis(0))
        .zip(ne.iter())
        .map(|(row, &ne)| {
            if row.sum() == 0.0 || ne <= 0.0 {
                return 0.0;
            }
            row.iter().zip(&z).map(|(n, z)| n * z * z).sum::<f64>() / ne
        })
        .collect())
}

/// Mean charge `Σ n_s Z_s / Σ n_s` per cell.
pub fn z_avg(states: &StateTable, densities: &Array2<f64>) -> Array1<f64> {
    let z = states.charges();
    densities
        .axis_iter(Axis(0))
        .map(|row| {
            let total = row.sum();
            if total == 0.0 {
                0.0
            } else {
                row.iter().zip(&z).map(|(n, z)| n * z).sum::<f64>() / total
            }
        })
        .collect()
}

/// Densities summed per ionization stage, `[num_x, stages().len()]`.
pub fn stage_densities(states: &StateTable, densities: &Array2<f64>) -> Array2<f64> {
    let stages = states.stages();
    let mut out = Array2::zeros((densities.nrows(), stages.len()));
    for (col, &stage) in stages.iter().enumerate() {
        for s in states.states_in_stage(stage) {
            let mut target = out.column_mut(col);
            target += &densities.column(s.location_index);
        }
    }
    out
}

/// Radiated power density [W m⁻³] per cell of one mechanism.
///
/// Photon energy is `E_from - E_to` for radiative recombination and
/// spontaneous emission. Excitation counts the threshold energy taken
/// from the electrons; de-excitation the same energy handed back.
pub fn radiated_power<S: LinearSystem>(
    kind: TransitionKind,
    transitions: &TransitionSet,
    matrices: &[RateMatrix<S>],
    densities: &Array2<f64>,
    norm: &Normalization,
) -> CrmResult<Array1<f64>> {
    if matrices.len() != densities.nrows() {
        return Err(CrmError::GridMismatch {
            expected: densities.nrows(),
            got: matrices.len(),
        });
    }
    let source_kind = match kind {
        TransitionKind::RadiativeRecombination | TransitionKind::SpontaneousEmission | TransitionKind::Excitation => kind,
        TransitionKind::Deexcitation => TransitionKind::Excitation,
        other => {
            return Err(CrmError::ConfigError(format!("{other:?} is not a radiative mechanism")));
        }
    };
    let selected = transitions.indices_of(source_kind);

    let mut power = Array1::zeros(densities.nrows());
    for (cell, m) in matrices.iter().enumerate() {
        let rates = m.rate_coefficients();
        if rates.len() != transitions.len() {
            return Err(CrmError::GridMismatch {
                expected: transitions.len(),
                got: rates.len(),
            });
        }
        let n = densities.row(cell);
        let mut p = 0.0;
        for &i in &selected {
            let Some(t) = transitions.get(i) else { continue };
            let pair = rates[i];
            p += match kind {
                TransitionKind::Deexcitation => norm.power_density(t.threshold, pair.inverse, n[t.to]),
                TransitionKind::Excitation => norm.power_density(t.threshold, pair.forward, n[t.from]),
                _ => norm.power_density(-t.threshold, pair.forward, n[t.from]),
            };
        }
        power[cell] = p;
    }
    Ok(power)
}

/// `Σ P dx` [W m⁻²] over the spatial grid.
pub fn line_integrated_power(power: &Array1<f64>, grid: &SpatialGrid) -> CrmResult<f64> {
    if power.len() != grid.len() {
        return Err(CrmError::GridMismatch {
            expected: grid.len(),
            got: power.len(),
        });
    }
    Ok(power.iter().zip(grid.dx.iter()).map(|(p, dx)| p * dx).sum())
}

/// Reduce `matrix` onto the states `p_states` by eliminating the rest
/// quasi-statically: `M_eff = M_PP - M_PQ M_QQ⁻¹ M_QP`.
pub fn effective_rate_matrix(matrix: &Array2<f64>, p_states: &[usize]) -> CrmResult<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(CrmError::GridMismatch {
            expected: n,
            got: matrix.ncols(),
        });
    }
    if let Some(&bad) = p_states.iter().find(|&&p| p >= n) {
        return Err(CrmError::ConfigError(format!("P state {bad} out of range for {n} states")));
    }
    let mut is_p = vec![false; n];
    for &p in p_states {
        is_p[p] = true;
    }
    let q_states: Vec<usize> = (0..n).filter(|&i| !is_p[i]).collect();
    let np = p_states.len();
    let nq = q_states.len();

    let pick = |rows: &[usize], cols: &[usize]| {
        Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| matrix[[rows[i], cols[j]]])
    };
    let m_pp = pick(p_states, p_states);
    if nq == 0 {
        return Ok(m_pp);
    }
    let m_pq = pick(p_states, &q_states);
    let m_qp = pick(&q_states, p_states);
    let mut m_qq = DenseSystem::from_array(pick(&q_states, &q_states))?;

    // X = M_QQ⁻¹ M_QP, one column per P state
    let mut x = Array2::zeros((nq, np));
    for j in 0..np {
        let col = m_qp.column(j).to_vec();
        let sol = m_qq.solve(&col)?;
        x.slice_mut(s![.., j]).assign(&Array1::from(sol));
    }
    Ok(m_pp - m_pq.dot(&x))
}
