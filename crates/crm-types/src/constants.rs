// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Elementary charge (C)
pub const EL_CHARGE: f64 = 1.602176634e-19;

/// Electron mass (kg)
pub const EL_MASS: f64 = 9.1093837015e-31;

/// Vacuum permittivity (F/m)
pub const EPSILON_0: f64 = 8.8541878128e-12;

/// Planck constant (J s)
pub const PLANCK_H: f64 = 6.62607015e-34;

/// Cross-section normalisation σ₀ = π a₀² (m²).
pub const SIGMA_0: f64 = 8.797355066696007e-21;
