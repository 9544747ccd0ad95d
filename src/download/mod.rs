//! Transfer engine and destination path planning.
//!
//! This module owns the byte-moving half of the queue: computing sanitized
//! destination paths from templates ([`dest`]) and streaming media URLs into
//! those paths with resume, progress, and cancellation support ([`engine`]).

pub mod constants;
pub mod dest;
mod engine;
mod error;

pub use engine::{TransferEngine, TransferOutcome, TransferProgress, TransferRequest};
pub use error::TransferError;
