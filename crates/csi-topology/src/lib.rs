//! # csi-topology
//!
//! Compiles a cluster's hardware inventory into an address plan and a
//! hardware topology.
//!
//! ## Modules
//!
//! - [`inputs`] - Structured site inputs: cabinets, switches, nodes, cabling
//! - [`cabinets`] - Cabinet resolution and chassis layouts
//! - [`catalog`] - Switch brand/model lookup
//! - [`switches`] - Management switch classification and hardware typing
//! - [`ncn`] - Management node validation
//! - [`networks`] - Network templates, overrides and subnet population
//! - [`assembler`] - Hardware records, cross-checks and hostname back-fill
//! - [`state`] - The topology state document
//! - [`pipeline`] - Stage ordering from inputs to state
//!
//! ## Example
//!
//! ```
//! use csi_core::RunConfig;
//! use csi_topology::inputs::{CabinetInputs, SiteInputs};
//! use csi_topology::{compile, StaticSwitchCatalog};
//! use csi_core::types::CabinetKind;
//!
//! let config = RunConfig::new("sandbox").unwrap();
//! let inputs = SiteInputs {
//!     cabinets: CabinetInputs::default().with_rule(CabinetKind::Mountain, 2, 1000),
//!     ..SiteInputs::default()
//! };
//!
//! let state = compile(&config, &inputs, &StaticSwitchCatalog::new()).unwrap();
//! assert!(state.hardware.contains_key("x1001c7b0"));
//! assert!(state.networks["HMN_MTN"].subnet("cabinet_1000").is_some());
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembler;
pub mod cabinets;
pub mod catalog;
pub mod inputs;
pub mod ncn;
pub mod networks;
pub mod pipeline;
pub mod state;
pub mod switches;

pub use catalog::{StaticSwitchCatalog, SwitchCatalog, SwitchModel};
pub use inputs::SiteInputs;
pub use pipeline::compile;
pub use state::{HardwareItem, TopologyState};
