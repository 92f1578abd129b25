use thiserror::Error;

use crate::collector::SubmitError;
use crate::config::ConfigError;
use crate::pool::ExecuteError;

/// Crate-level error for callers that handle both components through one type.
#[derive(Debug, Error)]
pub enum WindrowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Execute error: {0}")]
    Execute(#[from] ExecuteError),
}
