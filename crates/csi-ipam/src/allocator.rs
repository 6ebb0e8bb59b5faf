//! Subnet allocation inside a network.
//!
//! Subnets are placed first-fit in address order, so identical inputs always
//! produce identical layouts.

use crate::cidr;
use crate::models::{Network, NetworkType, Subnet};
use csi_core::{Error, Result, MAX_VLAN};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::debug;

impl Network {
    /// Create an empty network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `cidr` has host bits set and
    /// [`Error::InvalidInput`] for an inverted VLAN range or one that ends
    /// above [`MAX_VLAN`].
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        cidr: Ipv4Net,
        vlan_range: (u16, u16),
        mtu: u32,
        network_type: NetworkType,
    ) -> Result<Self> {
        let name = name.into();
        let cidr = cidr::require_network_address(cidr)?;
        if vlan_range.0 > vlan_range.1 {
            return Err(Error::InvalidInput(format!(
                "network {name}: VLAN range {}-{} is inverted",
                vlan_range.0, vlan_range.1
            )));
        }
        if vlan_range.1 > MAX_VLAN {
            return Err(Error::InvalidInput(format!(
                "network {name}: VLAN range {}-{} ends above {MAX_VLAN}",
                vlan_range.0, vlan_range.1
            )));
        }

        Ok(Self {
            name,
            full_name: full_name.into(),
            cidr,
            vlan_range,
            mtu,
            network_type,
            subnets: Vec::new(),
        })
    }

    /// Gateway of the whole network block.
    #[must_use]
    pub fn gateway(&self) -> Ipv4Addr {
        cidr::gateway(self.cidr)
    }

    /// Subnet by name.
    #[must_use]
    pub fn subnet(&self, name: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.name == name)
    }

    /// Mutable subnet by name.
    #[must_use]
    pub fn subnet_mut(&mut self, name: &str) -> Option<&mut Subnet> {
        self.subnets.iter_mut().find(|s| s.name == name)
    }

    /// Subnet by name, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`].
    pub fn lookup_subnet(&self, name: &str) -> Result<&Subnet> {
        self.subnet(name)
            .ok_or_else(|| Error::NotFound(format!("subnet {name} in network {}", self.name)))
    }

    /// Blocks of the given prefix that do not overlap any existing subnet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `prefix` is shorter than the
    /// network's prefix.
    pub fn free_blocks(&self, prefix: u8) -> Result<Vec<Ipv4Net>> {
        Ok(cidr::split(self.cidr, prefix)?
            .into_iter()
            .filter(|block| !self.subnets.iter().any(|s| cidr::overlaps(s.cidr, *block)))
            .collect())
    }

    /// Allocates the next free block of `prefix` length and registers it as
    /// subnet `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationConflict`] if the name is taken and
    /// [`Error::Capacity`] if no block is free.
    pub fn add_subnet(
        &mut self,
        prefix: u8,
        name: impl Into<String>,
        vlan_id: u16,
    ) -> Result<&mut Subnet> {
        let name = name.into();
        self.ensure_unique(&name)?;

        let block = self.free_blocks(prefix)?.into_iter().next().ok_or_else(|| {
            Error::Capacity(format!(
                "network {} ({}) has no free /{prefix} block for subnet {name}",
                self.name, self.cidr
            ))
        })?;

        debug!(network = %self.name, subnet = %name, cidr = %block, vlan_id, "allocated subnet");
        Ok(self.push_subnet(Subnet::new(name, block, vlan_id)))
    }

    /// Registers subnet `name` at a fixed block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the block is outside the network,
    /// [`Error::ReservationConflict`] if it overlaps another subnet or the
    /// name is taken.
    pub fn add_subnet_with_cidr(
        &mut self,
        block: Ipv4Net,
        name: impl Into<String>,
        vlan_id: u16,
    ) -> Result<&mut Subnet> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let block = cidr::require_network_address(block)?;

        if !self.cidr.contains(&block) {
            return Err(Error::InvalidAddress(format!(
                "subnet {name} ({block}) is outside network {} ({})",
                self.name, self.cidr
            )));
        }
        if let Some(other) = self.subnets.iter().find(|s| cidr::overlaps(s.cidr, block)) {
            return Err(Error::ReservationConflict(format!(
                "subnet {name} ({block}) overlaps {} ({}) in network {}",
                other.name, other.cidr, self.name
            )));
        }

        debug!(network = %self.name, subnet = %name, cidr = %block, vlan_id, "placed subnet");
        Ok(self.push_subnet(Subnet::new(name, block, vlan_id)))
    }

    /// Computes the DHCP range of subnet `name`.
    ///
    /// When `use_supernet_gateway` is set the subnet takes this network's
    /// gateway and mask (supernet compatibility mode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown subnet, otherwise see
    /// [`Subnet::update_dhcp_range`].
    pub fn update_dhcp_range(
        &mut self,
        name: &str,
        use_supernet_gateway: bool,
        base_offset: u32,
    ) -> Result<()> {
        let supernet = use_supernet_gateway.then_some(self.cidr);
        let network = self.name.clone();
        let subnet = self
            .subnet_mut(name)
            .ok_or_else(|| Error::NotFound(format!("subnet {name} in network {network}")))?;
        subnet.update_dhcp_range(supernet, base_offset)
    }

    /// Applies supernet compatibility mode to subnet `name` without touching
    /// its DHCP range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown subnet.
    pub fn apply_supernet(&mut self, name: &str) -> Result<()> {
        let supernet = self.cidr;
        let network = self.name.clone();
        let subnet = self
            .subnet_mut(name)
            .ok_or_else(|| Error::NotFound(format!("subnet {name} in network {network}")))?;
        subnet.apply_supernet(supernet)
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.subnet(name).is_some() {
            return Err(Error::ReservationConflict(format!(
                "subnet {name} already exists in network {}",
                self.name
            )));
        }
        Ok(())
    }

    fn push_subnet(&mut self, subnet: Subnet) -> &mut Subnet {
        self.subnets.push(subnet);
        let last = self.subnets.len() - 1;
        &mut self.subnets[last]
    }
}

impl Subnet {
    /// Create a subnet with the conventional gateway and no reservations.
    #[must_use]
    pub fn new(name: impl Into<String>, block: Ipv4Net, vlan_id: u16) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            cidr: block,
            vlan_id,
            gateway: cidr::gateway(block),
            mask_prefix: block.prefix_len(),
            supernet: false,
            dhcp_start: None,
            dhcp_end: None,
            reservations: Vec::new(),
        }
    }

    /// Set the descriptive name.
    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    /// The gateway this subnet's own block would use.
    #[must_use]
    pub fn own_gateway(&self) -> Ipv4Addr {
        cidr::gateway(self.cidr)
    }

    /// Replaces the effective gateway and mask with the parent network's.
    ///
    /// The resulting broadcast domain overlaps sibling subnets; this is the
    /// addressing that legacy switch configurations expect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationConflict`] if the supernet gateway is
    /// already reserved in this subnet.
    pub fn apply_supernet(&mut self, supernet: Ipv4Net) -> Result<()> {
        let gateway = cidr::gateway(supernet);
        if let Some(taken) = self.reservations.iter().find(|r| r.address == gateway) {
            return Err(Error::ReservationConflict(format!(
                "supernet gateway {gateway} is reserved by {} in subnet {}",
                taken.name, self.name
            )));
        }
        self.gateway = gateway;
        self.mask_prefix = supernet.prefix_len();
        self.supernet = true;
        debug!(subnet = %self.name, %gateway, mask = self.mask_prefix, "applied supernet gateway");
        Ok(())
    }

    /// Computes `[dhcp_start, dhcp_end]`.
    ///
    /// The range starts at `base + base_offset` or just after the highest
    /// reservation, whichever is later, skips the gateway, and ends at the
    /// address before the broadcast. Subnets never overlap, so the range
    /// cannot reach into a neighbouring pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] if the range would be empty.
    pub fn update_dhcp_range(
        &mut self,
        supernet: Option<Ipv4Net>,
        base_offset: u32,
    ) -> Result<()> {
        if let Some(supernet) = supernet {
            self.apply_supernet(supernet)?;
        }

        let base = u32::from(self.cidr.network());
        let broadcast = u32::from(self.cidr.broadcast());
        let gateways = [u32::from(self.own_gateway()), u32::from(self.gateway)];

        let mut start = base.saturating_add(base_offset);
        if let Some(highest) = self.reservations.iter().map(|r| u32::from(r.address)).max() {
            start = start.max(highest.saturating_add(1));
        }
        while gateways.contains(&start) {
            start = start.saturating_add(1);
        }

        let end = broadcast.saturating_sub(1);

        if start > end || start >= broadcast {
            return Err(Error::Capacity(format!(
                "subnet {} ({}) has no room for a DHCP range after {} reservations",
                self.name,
                self.cidr,
                self.reservations.len()
            )));
        }

        self.dhcp_start = Some(Ipv4Addr::from(start));
        self.dhcp_end = Some(Ipv4Addr::from(end));
        debug!(
            subnet = %self.name,
            start = %Ipv4Addr::from(start),
            end = %Ipv4Addr::from(end),
            "updated DHCP range"
        );
        Ok(())
    }
}
