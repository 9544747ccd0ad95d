//! Anime Download Engine
//!
//! This library provides the core functionality for the animedl tool: an
//! in-memory background download queue that resolves opaque video-host page
//! URLs into direct media URLs and streams them to disk with byte-range
//! resume, live progress, and a pause/resume/cancel control surface.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Settings file, live-updatable handle, templates and proxy pool
//! - [`record`] - Download records and their status lifecycle
//! - [`proxy`] - Proxy endpoint parsing and random route selection
//! - [`resolver`] - Source-page-to-media-URL resolution pipeline
//! - [`download`] - Streaming transfer engine and destination planning
//! - [`scheduler`] - Queue admission, pipelines, and the control surface

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod proxy;
pub mod record;
pub mod resolver;
pub mod scheduler;

// Re-export commonly used types
pub use config::{
    DEFAULT_FILENAME_TEMPLATE, DEFAULT_FOLDER_TEMPLATE, DEFAULT_SIMULTANEOUS_DOWNLOADS, Settings,
    SettingsError, SettingsHandle,
};
pub use download::{TransferEngine, TransferError, TransferOutcome, TransferProgress};
pub use proxy::{ProxyError, ProxyRoute, select_route};
pub use record::{DownloadRecord, DownloadStatus};
pub use resolver::{
    ResolveError, ResolvedMedia, Resolver, ResolverRegistry, build_default_registry,
};
pub use scheduler::{ControlError, Scheduler, SchedulerOptions, SubmitError, SubmitRequest};
