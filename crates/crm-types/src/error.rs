// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — CRM Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Atomic data error: {0}")]
    DataError(String),

    #[error("Singular rate matrix in cell {cell}: {message}")]
    SingularMatrix { cell: usize, message: String },

    #[error("Solver failed at step {step}: {message}")]
    SolverFailed { step: usize, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Grid size mismatch: expected {expected}, got {got}")]
    GridMismatch { expected: usize, got: usize },

    #[error("Physics constraint violated: {0}")]
    PhysicsViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),
}

pub type CrmResult<T> = Result<T, CrmError>;
