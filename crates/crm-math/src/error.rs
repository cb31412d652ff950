// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Math Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crm_types::error::CrmError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Singular matrix: zero pivot in column {column}")]
    Singular { column: usize },

    #[error("Iterative solve did not converge after {iterations} iterations (residual {residual:.3e})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Invalid interpolation table: {0}")]
    InvalidTable(String),
}

pub type MathResult<T> = Result<T, MathError>;

impl From<MathError> for CrmError {
    fn from(err: MathError) -> Self {
        CrmError::LinAlg(err.to_string())
    }
}
