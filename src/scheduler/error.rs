//! Error types for the queue scheduler's control surface.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::DownloadStatus;

/// Errors surfaced synchronously at submission; no record is created.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A required submission field is empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The destination directory could not be created.
    #[error("failed to create destination directory {path}: {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from pause/resume/cancel operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No record with this id exists in the active set or pending queue.
    #[error("download {id} not found")]
    NotFound {
        /// The requested record id.
        id: u64,
    },

    /// The record exists but its state does not permit the operation.
    #[error("download {id} is {status}; operation requires {required}")]
    InvalidState {
        /// The requested record id.
        id: u64,
        /// The record's current status.
        status: DownloadStatus,
        /// The state(s) the operation is valid from.
        required: &'static str,
    },
}
