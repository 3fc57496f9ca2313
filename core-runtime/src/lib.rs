//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the offline cache core:
//! - Logging and tracing infrastructure
//! - Configuration management (injected host bridges)
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the cache and download
//! components depend on. It establishes the logging conventions, the
//! fail-fast wiring of host bridges and the event broadcasting used to
//! observe evictions and reconciliation runs.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
