//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-sync`). Host applications can depend
//! on `strm-workspace` and pick either the full task sequencer or the bare
//! scan engine without wiring each crate individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "engine-only")]
pub use core_sync as engine;
