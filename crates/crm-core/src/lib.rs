// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Collisional-radiative impurity model.
//!
//! Layer 1: atomic states, transitions, electron background
//! Layer 2: rate integrals and per-cell rate matrices
//! Layer 3: equilibrium solve / evolution, partitioning, diagnostics

pub mod atomic;
pub mod diagnostics;
pub mod electrons;
pub mod model;
pub mod partition;
pub mod rate_matrix;
pub mod rates;
pub mod saha;
pub mod solver;
pub mod transitions;

pub use model::{ImpurityModel, Representation};
