//! Error handling for the frame stage
//!
//! This module defines the crate-level error type and a Result alias for use
//! throughout the library. Pipeline-specific failures (binding, registration,
//! queue) live in [`crate::pipeline::PipelineError`] and convert into
//! [`StageError`] with `?`.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for frame stage operations
#[derive(Error, Debug)]
pub enum StageError {
    /// Errors raised by the dispatch core (binding, registration, queue)
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reduction could not be carried out on a frame
    #[error("Reduction error: {0}")]
    Reduction(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StageError>,
    },
}

impl StageError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StageError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a binding failure
    pub fn is_binding_failure(&self) -> bool {
        match self {
            StageError::Pipeline(e) => e.is_binding_failure(),
            StageError::WithContext { source, .. } => source.is_binding_failure(),
            _ => false,
        }
    }
}

/// Result type alias for frame stage operations
pub type Result<T> = std::result::Result<T, StageError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| StageError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| StageError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StageError::Config("queue capacity must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: queue capacity must be at least 1"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = StageError::Reduction("empty frame".to_string());
        let with_ctx = err.with_context("Failed to reduce frame 7");
        assert!(with_ctx.to_string().contains("Failed to reduce frame 7"));
        assert!(with_ctx.to_string().contains("empty frame"));
    }

    #[test]
    fn test_binding_failure_survives_context() {
        let err: Result<()> = Err(PipelineError::SourceNotFound("SIM1".to_string()))
            .context("Rebinding stage STATS1");
        let err = err.unwrap_err();
        assert!(err.is_binding_failure());
        assert!(err.to_string().contains("SIM1"));
    }
}
