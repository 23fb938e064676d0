//! Pipeline-specific error types.

use crate::pipeline::source::SourceAddress;
use thiserror::Error;

/// Errors that can occur within the dispatch core.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source port '{0}' not found")]
    SourceNotFound(String),

    #[error("No frame interface on {0}")]
    NoFrameInterface(SourceAddress),

    #[error("Registration failed on {address}: {message}")]
    Registration {
        address: SourceAddress,
        message: String,
    },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid queue capacity {0} (must be at least 1)")]
    InvalidQueueCapacity(usize),

    #[error("Failed to spawn consumer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error means the stage could not be bound to its source.
    pub fn is_binding_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceNotFound(_)
                | PipelineError::NoFrameInterface(_)
                | PipelineError::Registration { .. }
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
