//! # csi-core
//!
//! Core types and utilities for cluster site-init.
//!
//! This crate provides the error taxonomy, the immutable run configuration,
//! shared domain enums and the xname parser used by the IPAM and topology
//! crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and their input/capacity/semantic/consistency kinds
//! - [`config`] - Run configuration and per-network overrides
//! - [`types`] - Cabinet, hardware, switch and node enums; network names
//! - [`xname`] - Strongly-typed hierarchical hardware addresses

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;
pub mod xname;

// Re-export commonly used types
pub use config::{NetworkOverride, RunConfig, MAX_VLAN};
pub use error::{Error, ErrorKind, Result};
pub use xname::{Xname, XnameError};
