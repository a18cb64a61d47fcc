//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate in the workspace leans on this one for its logging
//! conventions, its settings structs, and the broadcast channel that carries
//! scan and task progress to front ends.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
