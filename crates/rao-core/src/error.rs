//! Unified error type for the optimiser workspace.
//!
//! Crate-specific errors (oracle failures, parameter loading) convert into
//! [`RaoError`] at API boundaries.
//!
//! ```ignore
//! use rao_core::{RaoError, RaoResult};
//!
//! fn run(network: &Network) -> RaoResult<()> {
//!     let crac = builder.build(network)?;
//!     optimiser.run(network, &crac)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaoError {
    /// I/O errors (parameter files, output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed security model: dangling references, invalid ranges
    #[error("Validation error: {0}")]
    Validation(String),

    /// The flow solver did not converge for a network state
    #[error("Numerical divergence: {0}")]
    NumericalDivergence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

pub type RaoResult<T> = Result<T, RaoError>;

impl RaoError {
    /// Collapse a list of validation problems into one error.
    pub fn validation(problems: &[String]) -> Self {
        RaoError::Validation(problems.join("; "))
    }
}

impl From<anyhow::Error> for RaoError {
    fn from(err: anyhow::Error) -> Self {
        RaoError::Other(err.to_string())
    }
}

impl From<String> for RaoError {
    fn from(s: String) -> Self {
        RaoError::Other(s)
    }
}

impl From<&str> for RaoError {
    fn from(s: &str) -> Self {
        RaoError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RaoError::NumericalDivergence("singular B' matrix".into());
        assert!(err.to_string().contains("Numerical divergence"));
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn test_validation_joins_problems() {
        let err = RaoError::validation(&[
            "pst 'p1': min tap 3 > max tap 1".to_string(),
            "cnec 'c1': unknown instant 'later'".to_string(),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("Validation error"));
        assert!(text.contains("min tap 3 > max tap 1; cnec"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "params.toml");
        let err: RaoError = io_err.into();
        assert!(matches!(err, RaoError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> RaoResult<()> {
            Err(RaoError::Validation("test".into()))
        }

        fn outer() -> RaoResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(RaoError::Validation(_))));
    }
}
