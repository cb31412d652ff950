// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Impurity Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One impurity species on a 1D plasma background.
//!
//! [`ImpurityModel::new`] assembles normalisation, grids, the state table
//! and the transition set, and seeds the density fields.
//! [`ImpurityModel::run`] builds per-cell rate matrices for every enabled
//! electron representation and then solves or evolves the densities.
//! Diagnostics are computed on demand from the current fields.

use crm_math::linalg::{DenseSystem, LinearSystem};
use crm_math::sparse::SparseSystem;
use crm_types::config::{Backend, RunConfig};
use crm_types::error::{CrmError, CrmResult};
use crm_types::state::{Normalization, SpatialGrid};
use ndarray::{Array1, Array2, ArrayView2};

use crate::atomic::{StateRecord, StateTable};
use crate::diagnostics;
use crate::electrons::{ElectronBackground, NormalisedElectrons};
use crate::rate_matrix::{RateMatrix, RateMatrixBuilder};
use crate::saha;
use crate::solver::{evolve_distributed, solve_direct, EvolveReport, EvolveSettings};
use crate::transitions::{SpontaneousEmissionRecord, TransitionKind, TransitionRecord, TransitionSet};

/// Which density field a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Driven by the supplied electron distribution.
    Kinetic,
    /// Driven by Maxwellians with the same density and temperature.
    Maxwellian,
    /// Saha-Boltzmann reference; never evolved.
    Saha,
}

/// Rate matrices of one representation, in the configured backend.
#[derive(Debug, Clone)]
pub enum RateMatrices {
    Dense(Vec<RateMatrix<DenseSystem>>),
    Sparse(Vec<RateMatrix<SparseSystem>>),
}

impl RateMatrices {
    pub fn len(&self) -> usize {
        match self {
            RateMatrices::Dense(m) => m.len(),
            RateMatrices::Sparse(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense copy of the matrix of `cell`.
    pub fn dense(&self, cell: usize) -> Option<Array2<f64>> {
        match self {
            RateMatrices::Dense(m) => m.get(cell).map(|m| m.system.to_dense()),
            RateMatrices::Sparse(m) => m.get(cell).map(|m| m.system.to_dense()),
        }
    }

    pub fn column_sums(&self, cell: usize) -> Option<Vec<f64>> {
        match self {
            RateMatrices::Dense(m) => m.get(cell).map(RateMatrix::column_sums),
            RateMatrices::Sparse(m) => m.get(cell).map(RateMatrix::column_sums),
        }
    }
}

/// Outcome of solving one representation.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub representation: Representation,
    /// `None` for a direct solve.
    pub report: Option<EvolveReport>,
}

#[derive(Debug, Clone)]
pub struct ImpurityModel {
    name: String,
    config: RunConfig,
    norm: Normalization,
    background: ElectronBackground,
    electrons: NormalisedElectrons,
    spatial: SpatialGrid,
    states: StateTable,
    transitions: TransitionSet,
    dens_kinetic: Option<Array2<f64>>,
    dens_maxwellian: Option<Array2<f64>>,
    dens_saha: Array2<f64>,
    matrices_kinetic: Option<RateMatrices>,
    matrices_maxwellian: Option<RateMatrices>,
    summaries: Vec<RunSummary>,
}

impl ImpurityModel {
    pub fn new(
        name: &str,
        state_records: &[StateRecord],
        transition_records: &[TransitionRecord],
        spontem_records: &[SpontaneousEmissionRecord],
        background: ElectronBackground,
        config: RunConfig,
    ) -> CrmResult<Self> {
        config.validate()?;
        if config.kinetic_electrons && background.distribution.is_none() {
            return Err(CrmError::ConfigError(
                "kinetic_electrons requires an electron distribution".into(),
            ));
        }
        let num_x = background.num_x();
        if num_x == 0 {
            return Err(CrmError::ConfigError("electron background has no cells".into()));
        }

        let norm = Normalization::from_profiles(
            &background.temperature.to_vec(),
            &background.density.to_vec(),
            config.frac_imp_dens,
        )?;
        let electrons = NormalisedElectrons::new(&background, &norm)?;
        let spatial = SpatialGrid::new(background.x.clone());
        let states = StateTable::load(state_records, None)?;
        let transitions = TransitionSet::build(
            &states,
            transition_records,
            spontem_records,
            &config.processes,
            &electrons.grid,
            &norm,
        )?;

        let totals = if config.init.fixed_fraction_init {
            electrons.density.mapv(|ne| config.frac_imp_dens * ne)
        } else {
            let mean = electrons.density.mean().unwrap_or(0.0);
            Array1::from_elem(num_x, config.frac_imp_dens * mean)
        };
        let dens_saha = saha::saha_boltzmann(&states, &electrons.density, &electrons.temperature, &totals, &norm)?;
        let initial = if config.init.saha_boltzmann_init {
            dens_saha.clone()
        } else {
            let lowest = states.stages().first().copied().unwrap_or(0);
            let ground = states.ground_state(lowest)?.location_index;
            let mut init = Array2::zeros((num_x, states.len()));
            init.column_mut(ground).assign(&totals);
            init
        };

        log::info!(
            "Impurity {name}: {} states, {} transitions, {num_x} cells, T_norm = {:.3} eV, n_norm = {:.3e} m^-3",
            states.len(),
            transitions.len(),
            norm.temperature,
            norm.density
        );

        Ok(ImpurityModel {
            name: name.to_string(),
            dens_kinetic: config.kinetic_electrons.then(|| initial.clone()),
            dens_maxwellian: config.maxwellian_electrons.then_some(initial),
            config,
            norm,
            background,
            electrons,
            spatial,
            states,
            transitions,
            dens_saha,
            matrices_kinetic: None,
            matrices_maxwellian: None,
            summaries: Vec::new(),
        })
    }

    /// Build rate matrices and solve or evolve every enabled representation.
    pub fn run(&mut self) -> CrmResult<&[RunSummary]> {
        self.summaries.clear();
        for rep in [Representation::Kinetic, Representation::Maxwellian] {
            let Some(mut dens) = self.field(rep).cloned() else {
                continue;
            };
            log::info!("{}: solving {rep:?} densities", self.name);
            let (matrices, report) = match self.config.solver.backend {
                Backend::Dense => {
                    let (m, r) = self.solve_with::<DenseSystem>(rep, &mut dens)?;
                    (RateMatrices::Dense(m), r)
                }
                Backend::Sparse => {
                    let (m, r) = self.solve_with::<SparseSystem>(rep, &mut dens)?;
                    (RateMatrices::Sparse(m), r)
                }
            };
            match rep {
                Representation::Kinetic => {
                    self.dens_kinetic = Some(dens);
                    self.matrices_kinetic = Some(matrices);
                }
                _ => {
                    self.dens_maxwellian = Some(dens);
                    self.matrices_maxwellian = Some(matrices);
                }
            }
            self.summaries.push(RunSummary {
                representation: rep,
                report,
            });
        }
        Ok(&self.summaries)
    }

    fn solve_with<S: LinearSystem>(
        &self,
        rep: Representation,
        densities: &mut Array2<f64>,
    ) -> CrmResult<(Vec<RateMatrix<S>>, Option<EvolveReport>)> {
        let matrices = self.build_matrices::<S>(rep)?;
        if self.config.evolve {
            let settings = EvolveSettings::from_config(&self.config, &self.norm);
            let report = evolve_distributed(&matrices, densities, &settings, self.config.solver.num_workers)?;
            Ok((matrices, Some(report)))
        } else {
            solve_direct(&matrices, densities, self.config.solver.ksp_tol)?;
            Ok((matrices, None))
        }
    }

    fn distribution(&self, rep: Representation) -> CrmResult<ArrayView2<'_, f64>> {
        match rep {
            Representation::Kinetic => self
                .electrons
                .kinetic
                .as_ref()
                .map(|f| f.view())
                .ok_or_else(|| CrmError::ConfigError("no kinetic electron distribution".into())),
            Representation::Maxwellian | Representation::Saha => Ok(self.electrons.maxwellian.view()),
        }
    }

    /// Fresh rate matrices for the electrons behind `rep`.
    pub fn build_matrices<S: LinearSystem>(&self, rep: Representation) -> CrmResult<Vec<RateMatrix<S>>> {
        let builder = RateMatrixBuilder::new(&self.transitions, &self.electrons.grid, &self.norm);
        builder.build_all::<S>(&self.electrons.density, &self.electrons.temperature, self.distribution(rep)?)
    }

    fn field(&self, rep: Representation) -> Option<&Array2<f64>> {
        match rep {
            Representation::Kinetic => self.dens_kinetic.as_ref(),
            Representation::Maxwellian => self.dens_maxwellian.as_ref(),
            Representation::Saha => Some(&self.dens_saha),
        }
    }

    /// Normalised densities `[num_x, num_states]`.
    pub fn densities(&self, rep: Representation) -> CrmResult<&Array2<f64>> {
        self.field(rep)
            .ok_or_else(|| CrmError::ConfigError(format!("{rep:?} electrons are disabled")))
    }

    pub fn rate_matrices(&self, rep: Representation) -> Option<&RateMatrices> {
        match rep {
            Representation::Kinetic => self.matrices_kinetic.as_ref(),
            _ => self.matrices_maxwellian.as_ref(),
        }
    }

    pub fn summaries(&self) -> &[RunSummary] {
        &self.summaries
    }

    pub fn report(&self, rep: Representation) -> Option<&EvolveReport> {
        self.summaries
            .iter()
            .find(|s| s.representation == rep)
            .and_then(|s| s.report.as_ref())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn normalization(&self) -> &Normalization {
        &self.norm
    }

    pub fn background(&self) -> &ElectronBackground {
        &self.background
    }

    pub fn electrons(&self) -> &NormalisedElectrons {
        &self.electrons
    }

    pub fn spatial_grid(&self) -> &SpatialGrid {
        &self.spatial
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    pub fn transitions(&self) -> &TransitionSet {
        &self.transitions
    }

    pub fn num_x(&self) -> usize {
        self.spatial.len()
    }

    pub fn z_eff(&self, rep: Representation) -> CrmResult<Array1<f64>> {
        diagnostics::z_eff(&self.states, self.densities(rep)?, &self.electrons.density)
    }

    pub fn z_avg(&self, rep: Representation) -> CrmResult<Array1<f64>> {
        Ok(diagnostics::z_avg(&self.states, self.densities(rep)?))
    }

    /// Normalised densities per stage, `[num_x, num_stages]`.
    pub fn stage_densities(&self, rep: Representation) -> CrmResult<Array2<f64>> {
        Ok(diagnostics::stage_densities(&self.states, self.densities(rep)?))
    }

    /// Boltzmann populations of `stage` in `cell`, holding the stage's
    /// current density, as `(location_index, density)`.
    pub fn boltzmann_reference(&self, rep: Representation, stage: usize, cell: usize) -> CrmResult<Vec<(usize, f64)>> {
        let dens = self.densities(rep)?;
        if cell >= dens.nrows() {
            return Err(CrmError::GridMismatch {
                expected: dens.nrows(),
                got: cell,
            });
        }
        let te_ev = self.background.temperature[cell];
        let fractions = saha::boltzmann_fractions(&self.states, stage, te_ev)?;
        let stage_total: f64 = fractions.iter().map(|(loc, _)| dens[[cell, *loc]]).sum();
        Ok(fractions.into_iter().map(|(loc, f)| (loc, stage_total * f)).collect())
    }

    /// Radiated power density [W m⁻³] of one mechanism.
    pub fn radiated_power(&self, rep: Representation, kind: TransitionKind) -> CrmResult<Array1<f64>> {
        let dens = self.densities(rep)?;
        match self.rate_matrices(rep) {
            Some(RateMatrices::Dense(m)) => diagnostics::radiated_power(kind, &self.transitions, m, dens, &self.norm),
            Some(RateMatrices::Sparse(m)) => diagnostics::radiated_power(kind, &self.transitions, m, dens, &self.norm),
            None => {
                let m = self.build_matrices::<DenseSystem>(rep)?;
                diagnostics::radiated_power(kind, &self.transitions, &m, dens, &self.norm)
            }
        }
    }

    /// Radiated power integrated along the grid [W m⁻²].
    pub fn line_integrated_power(&self, rep: Representation, kind: TransitionKind) -> CrmResult<f64> {
        diagnostics::line_integrated_power(&self.radiated_power(rep, kind)?, &self.spatial)
    }

    /// Effective rate matrices onto `p_states`; stage ground states by default.
    pub fn effective_rate_matrices(
        &self,
        rep: Representation,
        p_states: Option<&[usize]>,
    ) -> CrmResult<Vec<Array2<f64>>> {
        let defaults: Vec<usize>;
        let p_states = match p_states {
            Some(p) => p,
            None => {
                defaults = self
                    .states
                    .stages()
                    .iter()
                    .map(|&z| self.states.ground_state(z).map(|s| s.location_index))
                    .collect::<CrmResult<_>>()?;
                &defaults
            }
        };
        let dense: Vec<Array2<f64>> = match self.rate_matrices(rep) {
            Some(stored) => (0..stored.len()).filter_map(|c| stored.dense(c)).collect(),
            None => self
                .build_matrices::<DenseSystem>(rep)?
                .iter()
                .map(|m| m.system.to_dense())
                .collect(),
        };
        dense
            .iter()
            .map(|m| diagnostics::effective_rate_matrix(m, p_states))
            .collect()
    }
}
