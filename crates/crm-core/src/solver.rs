// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Equilibrium Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Direct equilibrium solve and backward-Euler evolution of state densities.
//!
//! Densities are `[num_x, num_states]` arrays; row `i` belongs to cell `i`
//! and is driven by the rate matrix of that cell.
//!
//! The direct solve replaces the last (linearly dependent) rate equation
//! by particle conservation, `Σ_s n_s = N_cell`. Evolution solves
//! `(I - Δt R) n_{k+1} = n_k` each step; every worker reduces the step
//! residual `max |n_{k+1} - n_k| / Δt` over all workers before deciding
//! to stop, so all workers take identical branches.

use crm_math::linalg::LinearSystem;
use crm_types::config::RunConfig;
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::Normalization;
use ndarray::{Array2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::partition::{decompose, Communicator, SerialCommunicator, ThreadGroup};
use crate::rate_matrix::RateMatrix;

/// Message of the error returned by workers whose own cells all solved.
const REMOTE_FAILURE: &str = "solve failed on another worker";

/// Normalised evolution controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolveSettings {
    /// Normalised time step.
    pub delta_t: f64,
    /// Convergence threshold on the global residual.
    pub dndt_thresh: f64,
    pub max_steps: usize,
    /// A rising residual stops the run once `step / max_steps` exceeds this.
    pub divergence_window: f64,
    /// Relative tolerance handed to iterative backends.
    pub tolerance: f64,
}

impl EvolveSettings {
    pub fn from_config(config: &RunConfig, norm: &Normalization) -> Self {
        EvolveSettings {
            delta_t: config.delta_t / norm.time,
            dndt_thresh: config.dndt_thresh,
            max_steps: config.max_steps,
            divergence_window: config.solver.divergence_window,
            tolerance: config.solver.ksp_tol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    MaxSteps,
    /// Residual rose after the divergence window; the rising step was discarded.
    Diverged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolveReport {
    /// Committed steps.
    pub steps: usize,
    /// Global residual of the last committed step.
    pub residual: f64,
    /// Global residual of every attempted step.
    pub residual_history: Vec<f64>,
    pub stop: StopReason,
}

/// Equilibrium densities of one cell holding `total` particles.
pub fn solve_cell<S: LinearSystem>(matrix: &RateMatrix<S>, total: f64, tolerance: f64) -> CrmResult<Vec<f64>> {
    let n = matrix.dim();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut system = matrix.system.clone();
    system.set_tolerance(tolerance);
    system.fill_row(n - 1, 1.0);
    let mut rhs = vec![0.0; n];
    rhs[n - 1] = total;
    system.solve(&rhs).map_err(|e| CrmError::SingularMatrix {
        cell: matrix.cell,
        message: e.to_string(),
    })
}

/// Replace every row of `densities` by the equilibrium with the same total.
pub fn solve_direct<S: LinearSystem>(
    matrices: &[RateMatrix<S>],
    densities: &mut Array2<f64>,
    tolerance: f64,
) -> CrmResult<()> {
    check_shapes(matrices, densities.nrows(), densities.ncols())?;
    let totals: Vec<f64> = densities.axis_iter(Axis(0)).map(|row| row.sum()).collect();
    let solved = matrices
        .par_iter()
        .zip(totals.par_iter())
        .map(|(m, &total)| solve_cell(m, total, tolerance))
        .collect::<CrmResult<Vec<_>>>()?;
    for (mut row, n) in densities.axis_iter_mut(Axis(0)).zip(solved) {
        row.assign(&ndarray::ArrayView1::from(&n[..]));
    }
    log::info!("Direct solve finished for {} cells", matrices.len());
    Ok(())
}

fn check_shapes<S: LinearSystem>(matrices: &[RateMatrix<S>], num_x: usize, num_states: usize) -> CrmResult<()> {
    if matrices.len() != num_x {
        return Err(CrmError::GridMismatch {
            expected: num_x,
            got: matrices.len(),
        });
    }
    if let Some(m) = matrices.iter().find(|m| m.dim() != num_states) {
        return Err(CrmError::GridMismatch {
            expected: num_states,
            got: m.dim(),
        });
    }
    Ok(())
}

/// One backward-Euler step of a cell: new densities and the local residual.
fn step_cell<S: LinearSystem>(op: &mut S, n_old: &[f64], delta_t: f64) -> Result<(Vec<f64>, f64), String> {
    let n_new = op.solve(n_old).map_err(|e| e.to_string())?;
    if n_new.iter().any(|v| !v.is_finite()) {
        return Err("non-finite densities".into());
    }
    let residual = n_new
        .iter()
        .zip(n_old)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
        / delta_t;
    Ok((n_new, residual))
}

/// Evolve this worker's cells until the global residual converges,
/// rises after the divergence window, or `max_steps` is reached.
///
/// `matrices` and `densities` cover only the worker's own cells. All
/// workers sharing `comm` must call this with the same `settings`.
pub fn evolve<S: LinearSystem, C: Communicator>(
    matrices: &[RateMatrix<S>],
    mut densities: ArrayViewMut2<f64>,
    settings: &EvolveSettings,
    comm: &C,
) -> CrmResult<EvolveReport> {
    check_shapes(matrices, densities.nrows(), densities.ncols())?;
    if !settings.delta_t.is_finite() || settings.delta_t <= 0.0 {
        return Err(CrmError::ConfigError(format!(
            "time step must be finite and > 0, got {}",
            settings.delta_t
        )));
    }

    let mut operators: Vec<S> = matrices
        .iter()
        .map(|m| {
            let mut op = m.system.identity_minus_scaled(settings.delta_t);
            op.set_tolerance(settings.tolerance);
            op
        })
        .collect();
    let mut current: Vec<Vec<f64>> = densities.axis_iter(Axis(0)).map(|r| r.to_vec()).collect();

    let mut history = Vec::with_capacity(settings.max_steps.min(4096));
    let mut residual = f64::INFINITY;
    let mut steps = 0usize;
    let mut stop = StopReason::MaxSteps;

    for step in 0..settings.max_steps {
        let outcome: Vec<Result<(Vec<f64>, f64), String>> = operators
            .par_iter_mut()
            .zip(current.par_iter())
            .map(|(op, n_old)| step_cell(op, n_old, settings.delta_t))
            .collect();

        let local_failure = outcome.iter().enumerate().find_map(|(i, r)| {
            r.as_ref()
                .err()
                .map(|msg| format!("cell {}: {msg}", matrices[i].cell))
        });
        if comm.all_reduce_or(local_failure.is_some()) {
            let message = local_failure.unwrap_or_else(|| REMOTE_FAILURE.into());
            log::warn!("Evolution failed at step {step} on worker {}: {message}", comm.rank());
            return Err(CrmError::SolverFailed { step, message });
        }

        let mut updated = Vec::with_capacity(outcome.len());
        let mut local_residual = 0.0f64;
        for (n_new, r) in outcome.into_iter().flatten() {
            local_residual = local_residual.max(r);
            updated.push(n_new);
        }
        let global = comm.all_reduce_max(local_residual);
        history.push(global);

        let rising = steps > 0 && global > residual;
        if rising && step as f64 / settings.max_steps as f64 > settings.divergence_window {
            if comm.rank() == 0 {
                log::warn!(
                    "Residual rose from {residual:.3e} to {global:.3e} at step {step}; keeping last stable densities"
                );
            }
            stop = StopReason::Diverged;
            break;
        }

        current = updated;
        steps = step + 1;
        residual = global;

        if step % 10 == 0 && comm.rank() == 0 {
            log::debug!("step {step}: residual {global:.3e}");
        }
        if global < settings.dndt_thresh {
            stop = StopReason::Converged;
            break;
        }
    }

    for (mut row, n) in densities.axis_iter_mut(Axis(0)).zip(&current) {
        row.assign(&ndarray::ArrayView1::from(&n[..]));
    }
    if comm.rank() == 0 {
        match stop {
            StopReason::Converged => log::info!("Converged after {steps} steps, residual {residual:.3e}"),
            StopReason::MaxSteps => log::warn!("Reached max_steps = {steps} with residual {residual:.3e}"),
            StopReason::Diverged => {}
        }
    }
    Ok(EvolveReport {
        steps,
        residual,
        residual_history: history,
        stop,
    })
}

/// Evolve the whole grid with `workers` partitions on scoped threads.
///
/// A failed solve on any worker aborts every worker at the same step and
/// leaves `densities` untouched; the returned error names the failing cell.
/// A panicking worker leaves its siblings waiting at the barrier, so worker
/// panics are fatal and are not converted into errors.
pub fn evolve_distributed<S: LinearSystem>(
    matrices: &[RateMatrix<S>],
    densities: &mut Array2<f64>,
    settings: &EvolveSettings,
    workers: usize,
) -> CrmResult<EvolveReport> {
    let num_x = densities.nrows();
    check_shapes(matrices, num_x, densities.ncols())?;
    let workers = workers.clamp(1, num_x.max(1));
    if workers == 1 {
        return evolve(matrices, densities.view_mut(), settings, &SerialCommunicator);
    }

    let partitions = decompose(num_x, workers)?;
    log::info!("Evolving {num_x} cells on {workers} workers");

    let mut views = Vec::with_capacity(workers);
    let mut rest = densities.view_mut();
    for p in &partitions {
        let (head, tail) = rest.split_at(Axis(0), p.len());
        views.push(head);
        rest = tail;
    }

    let group = ThreadGroup::new(workers);
    let comms = group.communicators();
    let reports: Vec<CrmResult<EvolveReport>> = std::thread::scope(|s| {
        let handles: Vec<_> = partitions
            .iter()
            .zip(views)
            .zip(comms.iter())
            .map(|((p, view), comm)| {
                let local = &matrices[p.min_x..p.max_x];
                s.spawn(move || evolve(local, view, settings, comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });

    // Every worker fails together; report the one that saw the failing cell
    let mut completed = Vec::with_capacity(reports.len());
    let mut remote = None;
    for report in reports {
        match report {
            Ok(r) => completed.push(r),
            Err(e) if is_remote_failure(&e) => {
                remote.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = remote {
        return Err(e);
    }
    let mut iter = completed.into_iter();
    let first = iter.next().ok_or_else(|| CrmError::ConfigError("no workers ran".into()))?;
    for other in iter {
        if other.steps != first.steps || other.stop != first.stop || other.residual_history != first.residual_history {
            return Err(CrmError::SolverFailed {
                step: other.steps,
                message: "workers disagree on the reduced residual".into(),
            });
        }
    }
    Ok(first)
}

fn is_remote_failure(err: &CrmError) -> bool {
    matches!(err, CrmError::SolverFailed { message, .. } if message == REMOTE_FAILURE)
}
