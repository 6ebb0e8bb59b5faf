//! # csi-ipam
//!
//! IPv4 address management for cluster site-init.
//!
//! ## Modules
//!
//! - [`cidr`] - Block splitting and address arithmetic
//! - [`models`] - Network, subnet and reservation records
//! - [`allocator`] - First-fit subnet placement, DHCP ranges and supernet mode
//! - [`reservations`] - Named address reservations, pins and hostname back-fill
//!
//! ## Example
//!
//! ```
//! use csi_ipam::{Network, NetworkType};
//!
//! let mut nmn = Network::new(
//!     "NMN",
//!     "Node Management Network",
//!     "10.252.0.0/17".parse().unwrap(),
//!     (2, 2),
//!     9000,
//!     NetworkType::Ethernet,
//! )
//! .unwrap();
//!
//! let subnet = nmn.add_subnet(24, "bootstrap_dhcp", 2).unwrap();
//! subnet.add_reservation("x3000c0s1b0n0", "x3000c0s1b0n0").unwrap();
//! nmn.update_dhcp_range("bootstrap_dhcp", true, 10).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod cidr;
pub mod models;
pub mod reservations;

pub use models::{IpReservation, Network, NetworkType, Subnet};
