// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Numerical primitives for the collisional-radiative model.

pub mod error;
pub mod gmres;
pub mod interp;
pub mod linalg;
pub mod sparse;

pub use linalg::{DenseSystem, LinearSystem};
pub use sparse::SparseSystem;
