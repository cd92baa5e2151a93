//! Error types for picsync
//!
//! Specific error enums per collaborator (session layer, datastore, entity
//! processing, correlation registry) and the `PicsyncError` type returned
//! while wiring the runtime.

use crate::types::{EntityRef, JobId};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the session layer when issuing outbound calls
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is not connected")]
    NotConnected,
    #[error("Request rejected by session layer: {reason}")]
    RequestRejected { reason: String },
    #[error("Session event stream closed")]
    EventStreamClosed,
}

/// Errors raised by the datastore command executor
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("Statement failed: {reason}")]
    Statement { reason: String },
    #[error("Datastore unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Unexpected value in column {column}: {reason}")]
    Decode { column: String, reason: String },
}

/// Errors raised by a per-entity processor
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Processing {entity} failed: {reason}")]
    Failed { entity: EntityRef, reason: String },
    #[error("Malformed payload for {entity}: {reason}")]
    MalformedPayload { entity: EntityRef, reason: String },
    #[error("Datastore error while processing: {0}")]
    Datastore(#[from] DatastoreError),
}

/// Errors raised by the job correlation registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Job {job} is already registered")]
    DuplicateJob { job: JobId },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for picsync
#[derive(Debug, thiserror::Error)]
pub enum PicsyncError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Channel communication error between tasks
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl PicsyncError {
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        PicsyncError::Channel {
            message: message.into(),
        }
    }

    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        PicsyncError::Configuration {
            reason: reason.into(),
        }
    }
}

impl DatastoreError {
    pub fn statement<T: ToString>(reason: T) -> Self {
        DatastoreError::Statement {
            reason: reason.to_string(),
        }
    }
}

/// Result alias used across the workspace
pub type PicsyncResult<T> = core::result::Result<T, PicsyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppId;

    #[test]
    fn test_error_conversion_preserves_message() {
        let err: PicsyncError = SessionError::NotConnected.into();
        assert_eq!(err.to_string(), "Session error: Session is not connected");

        let err = ProcessingError::from(DatastoreError::statement("disk full"));
        assert_eq!(
            err.to_string(),
            "Datastore error while processing: Statement failed: disk full"
        );
    }

    #[test]
    fn test_processing_error_names_entity() {
        let err = ProcessingError::Failed {
            entity: EntityRef::App(AppId(10)),
            reason: "bad depot".to_string(),
        };
        assert_eq!(err.to_string(), "Processing app 10 failed: bad depot");
    }
}
