use crate::llm::error::{LlmDiagnosticsError, LlmError};

/// Failure kinds of one analysis run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("User is not authenticated.")]
    AuthenticationRequired,

    #[error("Target entity '{0}' not found in database.")]
    EntityNotFound(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(LlmDiagnosticsError),

    #[error("{0:#}")]
    Transport(anyhow::Error),

    #[error("Analysis failed and could not save a failure record.")]
    PersistenceFailure(#[source] anyhow::Error),
}

impl From<LlmError> for AnalysisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Transport(e) => Self::Transport(e),
            LlmError::InvalidResponse(diag) => Self::InvalidResponse(diag),
        }
    }
}
