//! Error types for the assessment engine
//!
//! Missing upstream signals and unestablished baselines are not errors: the
//! former degrade per the dissonance/risk rules and the latter surface as the
//! `BaselineState::Insufficient` sentinel. Errors here are reserved for
//! inputs the engine refuses to score.

use thiserror::Error;

/// Errors that can occur during assessment
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse snapshot: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
