//! IPv4 block arithmetic.

use csi_core::{Error, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Addresses that are never handed out: network, gateway and broadcast.
pub const OVERHEAD_ADDRESSES: u32 = 3;

/// Splits `parent` into equal blocks of `prefix` length, in address order.
///
/// Returns `2^(prefix - parent.prefix_len())` pairwise-disjoint blocks whose
/// union is exactly `parent`.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] when `prefix` is shorter than the
/// parent's prefix or longer than 32.
pub fn split(parent: Ipv4Net, prefix: u8) -> Result<Vec<Ipv4Net>> {
    if prefix < parent.prefix_len() {
        return Err(Error::InvalidAddress(format!(
            "cannot split {parent} into /{prefix} blocks: prefix is shorter than the parent"
        )));
    }
    let blocks = parent.trunc().subnets(prefix)?;
    Ok(blocks.collect())
}

/// Ensures a CIDR has no host bits set.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for e.g. `10.252.1.5/17`.
pub fn require_network_address(cidr: Ipv4Net) -> Result<Ipv4Net> {
    if cidr != cidr.trunc() {
        return Err(Error::InvalidAddress(format!(
            "{cidr} has host bits set; did you mean {}?",
            cidr.trunc()
        )));
    }
    Ok(cidr)
}

/// Number of addresses in a block of the given prefix length.
#[must_use]
pub fn block_size(prefix: u8) -> u64 {
    1u64 << (32 - u32::from(prefix.min(32)))
}

/// Smallest prefix whose blocks fit `hosts` usable addresses.
///
/// # Errors
///
/// Returns [`Error::Capacity`] if no IPv4 block is large enough.
pub fn prefix_for_hosts(hosts: u32) -> Result<u8> {
    let needed = u64::from(hosts) + u64::from(OVERHEAD_ADDRESSES);
    (0..=30u8)
        .rev()
        .find(|prefix| block_size(*prefix) >= needed)
        .ok_or_else(|| Error::Capacity(format!("no IPv4 block holds {hosts} hosts")))
}

/// Address `offset` positions after the network address, if inside `net`.
#[must_use]
pub fn nth_address(net: Ipv4Net, offset: u32) -> Option<Ipv4Addr> {
    let base = u32::from(net.network());
    let addr = base.checked_add(offset)?;
    let addr = Ipv4Addr::from(addr);
    net.contains(&addr).then_some(addr)
}

/// Conventional gateway of a block: the first host address.
#[must_use]
pub fn gateway(net: Ipv4Net) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(net.network()).saturating_add(1))
}

/// True if the two blocks share any address.
#[must_use]
pub fn overlaps(a: Ipv4Net, b: Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
