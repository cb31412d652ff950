// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{CrmError, CrmResult};

/// Top-level run configuration for an impurity model.
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Time step [s] used when `evolve` is true.
    #[serde(default = "default_delta_t")]
    pub delta_t: f64,
    /// Evolve in time (backward Euler). When false, solve the rate equations directly.
    #[serde(default = "default_true")]
    pub evolve: bool,
    /// Solve with the supplied (kinetic) electron distribution.
    #[serde(default)]
    pub kinetic_electrons: bool,
    /// Solve with Maxwellian electrons at the same density and temperature.
    #[serde(default = "default_true")]
    pub maxwellian_electrons: bool,
    /// Convergence threshold on max|dn/dt| in normalised units.
    #[serde(default = "default_dndt_thresh")]
    pub dndt_thresh: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Impurity density as a fraction of the electron density at initialisation.
    #[serde(default = "default_frac_imp_dens")]
    pub frac_imp_dens: f64,
    #[serde(default)]
    pub processes: ProcessToggles,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Independently switchable atomic processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessToggles {
    /// Collisional ionization and three-body recombination.
    #[serde(default = "default_true")]
    pub ionization: bool,
    #[serde(default = "default_true")]
    pub radiative_recombination: bool,
    /// Collisional excitation and de-excitation.
    #[serde(default = "default_true")]
    pub excitation: bool,
    /// Spontaneous emission.
    #[serde(default = "default_true")]
    pub emission: bool,
    #[serde(default = "default_true")]
    pub autoionization: bool,
}

impl Default for ProcessToggles {
    fn default() -> Self {
        ProcessToggles {
            ionization: true,
            radiative_recombination: true,
            excitation: true,
            emission: true,
            autoionization: true,
        }
    }
}

impl ProcessToggles {
    /// All processes switched off.
    pub fn none() -> Self {
        ProcessToggles {
            ionization: false,
            radiative_recombination: false,
            excitation: false,
            emission: false,
            autoionization: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Impurity density is `frac_imp_dens * n_e` per cell. When false the
    /// profile is flat at `frac_imp_dens * mean(n_e)`.
    #[serde(default = "default_true")]
    pub fixed_fraction_init: bool,
    /// Distribute the initial density over states by Saha-Boltzmann
    /// equilibrium instead of placing it in the neutral ground state.
    #[serde(default)]
    pub saha_boltzmann_init: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        InitConfig {
            fixed_fraction_init: true,
            saha_boltzmann_init: false,
        }
    }
}

/// Linear-system backend used for per-cell rate matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Dense,
    Sparse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Number of spatial partitions evolved concurrently.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Fraction of `max_steps` after which a rising residual stops the run.
    #[serde(default = "default_divergence_window")]
    pub divergence_window: f64,
    /// Relative tolerance of the iterative (sparse) backend.
    #[serde(default = "default_ksp_tol")]
    pub ksp_tol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            backend: default_backend(),
            num_workers: default_num_workers(),
            divergence_window: default_divergence_window(),
            ksp_tol: default_ksp_tol(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_delta_t() -> f64 {
    1.0e-3
}
fn default_dndt_thresh() -> f64 {
    1.0e-5
}
fn default_max_steps() -> usize {
    1000
}
fn default_frac_imp_dens() -> f64 {
    0.05
}
fn default_backend() -> Backend {
    Backend::Dense
}
fn default_num_workers() -> usize {
    1
}
fn default_divergence_window() -> f64 {
    0.1
}
fn default_ksp_tol() -> f64 {
    1.0e-12
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            delta_t: default_delta_t(),
            evolve: true,
            kinetic_electrons: false,
            maxwellian_electrons: true,
            dndt_thresh: default_dndt_thresh(),
            max_steps: default_max_steps(),
            frac_imp_dens: default_frac_imp_dens(),
            processes: ProcessToggles::default(),
            init: InitConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> CrmResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> CrmResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CrmResult<()> {
        if !self.delta_t.is_finite() || self.delta_t <= 0.0 {
            return Err(CrmError::ConfigError(format!(
                "delta_t must be finite and > 0, got {}",
                self.delta_t
            )));
        }
        if self.max_steps == 0 {
            return Err(CrmError::ConfigError("max_steps must be >= 1".into()));
        }
        if !self.dndt_thresh.is_finite() || self.dndt_thresh < 0.0 {
            return Err(CrmError::ConfigError(format!(
                "dndt_thresh must be finite and >= 0, got {}",
                self.dndt_thresh
            )));
        }
        if !self.frac_imp_dens.is_finite() || self.frac_imp_dens <= 0.0 {
            return Err(CrmError::ConfigError(format!(
                "frac_imp_dens must be finite and > 0, got {}",
                self.frac_imp_dens
            )));
        }
        if !self.kinetic_electrons && !self.maxwellian_electrons {
            return Err(CrmError::ConfigError(
                "at least one of kinetic_electrons / maxwellian_electrons must be enabled".into(),
            ));
        }
        if self.solver.num_workers == 0 {
            return Err(CrmError::ConfigError("num_workers must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.solver.divergence_window) {
            return Err(CrmError::ConfigError(format!(
                "divergence_window must lie in [0, 1], got {}",
                self.solver.divergence_window
            )));
        }
        if !self.solver.ksp_tol.is_finite() || self.solver.ksp_tol <= 0.0 {
            return Err(CrmError::ConfigError(format!(
                "ksp_tol must be finite and > 0, got {}",
                self.solver.ksp_tol
            )));
        }
        Ok(())
    }
}
