//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-offline`, `core-runtime`). Host applications can
//! depend on `pincache-workspace` and enable the `offline` feature instead of
//! wiring each crate individually.

#[cfg(feature = "offline")]
pub use core_offline as offline;

#[cfg(feature = "offline")]
pub use core_runtime as runtime;
