//! Named address bookkeeping inside a subnet.

use crate::cidr;
use crate::models::{IpReservation, Subnet};
use csi_core::{Error, Result};
use std::net::Ipv4Addr;
use tracing::debug;

impl Subnet {
    /// Reservation by name.
    #[must_use]
    pub fn reservation(&self, name: &str) -> Option<&IpReservation> {
        self.reservations.iter().find(|r| r.name == name)
    }

    /// Reservation by name, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`].
    pub fn lookup_reservation(&self, name: &str) -> Result<&IpReservation> {
        self.reservation(name)
            .ok_or_else(|| Error::NotFound(format!("reservation {name} in subnet {}", self.name)))
    }

    /// First reservation whose owner comment equals `owner`.
    #[must_use]
    pub fn reservation_by_comment(&self, owner: &str) -> Option<&IpReservation> {
        self.reservations
            .iter()
            .find(|r| r.comment.as_deref() == Some(owner))
    }

    /// True if `address` is held by a reservation.
    #[must_use]
    pub fn is_reserved(&self, address: Ipv4Addr) -> bool {
        self.reservations.iter().any(|r| r.address == address)
    }

    /// Reserves the lowest free host address under `name`.
    ///
    /// The network address, both gateways, the broadcast address, existing
    /// reservations and any computed DHCP range are skipped. An empty
    /// `comment` stores no owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationConflict`] for a duplicate name and
    /// [`Error::Capacity`] when no address is left.
    pub fn add_reservation(
        &mut self,
        name: impl Into<String>,
        comment: &str,
    ) -> Result<&IpReservation> {
        let name = name.into();
        self.ensure_unreserved_name(&name)?;

        let base = u32::from(self.cidr.network());
        let broadcast = u32::from(self.cidr.broadcast());
        let address = (base.saturating_add(1)..broadcast)
            .map(Ipv4Addr::from)
            .find(|addr| self.is_free(*addr))
            .ok_or_else(|| {
                Error::Capacity(format!(
                    "subnet {} ({}) has no free address for {name}",
                    self.name, self.cidr
                ))
            })?;

        debug!(subnet = %self.name, reservation = %name, %address, owner = comment, "reserved address");
        self.reservations.push(IpReservation {
            name,
            address,
            comment: (!comment.is_empty()).then(|| comment.to_string()),
            aliases: Vec::new(),
        });
        Ok(&self.reservations[self.reservations.len() - 1])
    }

    /// Reserves the address `offset` positions after the subnet base.
    ///
    /// `aliases_csv` is a comma separated alias list; blank entries are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] when the offset is outside the host
    /// range or lands on a gateway, and [`Error::ReservationConflict`] when
    /// the address or name is already taken.
    pub fn add_reservation_with_pin(
        &mut self,
        name: impl Into<String>,
        aliases_csv: &str,
        offset: u32,
    ) -> Result<&IpReservation> {
        let name = name.into();
        self.ensure_unreserved_name(&name)?;

        let address = cidr::nth_address(self.cidr, offset)
            .filter(|addr| *addr != self.cidr.network() && *addr != self.cidr.broadcast())
            .ok_or_else(|| {
                Error::InvalidAddress(format!(
                    "offset {offset} for {name} is outside the host range of {} ({})",
                    self.name, self.cidr
                ))
            })?;

        if address == self.gateway || address == self.own_gateway() {
            return Err(Error::InvalidAddress(format!(
                "offset {offset} for {name} is the gateway of subnet {}",
                self.name
            )));
        }
        if let Some(holder) = self.reservations.iter().find(|r| r.address == address) {
            return Err(Error::ReservationConflict(format!(
                "{address} in subnet {} is already reserved by {}",
                self.name, holder.name
            )));
        }

        let aliases = aliases_csv
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(ToString::to_string)
            .collect();

        debug!(subnet = %self.name, reservation = %name, %address, offset, "pinned address");
        self.reservations.push(IpReservation {
            name,
            address,
            comment: None,
            aliases,
        });
        Ok(&self.reservations[self.reservations.len() - 1])
    }

    /// Renames the reservation owned by `owner` to `hostname` and appends
    /// `aliases`, keeping its address.
    ///
    /// Returns `false` if no reservation in this subnet is owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationConflict`] if another reservation is
    /// already named `hostname`.
    pub fn rename_by_comment(
        &mut self,
        owner: &str,
        hostname: &str,
        aliases: &[String],
    ) -> Result<bool> {
        let Some(index) = self
            .reservations
            .iter()
            .position(|r| r.comment.as_deref() == Some(owner))
        else {
            return Ok(false);
        };

        if let Some(other) = self
            .reservations
            .iter()
            .enumerate()
            .find(|(i, r)| *i != index && r.name == hostname)
        {
            return Err(Error::ReservationConflict(format!(
                "cannot rename {} to {hostname} in subnet {}: name held by {}",
                self.reservations[index].name, self.name, other.1.address
            )));
        }

        let reservation = &mut self.reservations[index];
        debug!(subnet = %self.name, from = %reservation.name, to = hostname, "renamed reservation");
        reservation.name = hostname.to_string();
        for alias in aliases {
            if !reservation.aliases.contains(alias) {
                reservation.aliases.push(alias.clone());
            }
        }
        Ok(true)
    }

    fn ensure_unreserved_name(&self, name: &str) -> Result<()> {
        if self.reservation(name).is_some() {
            return Err(Error::ReservationConflict(format!(
                "reservation {name} already exists in subnet {}",
                self.name
            )));
        }
        Ok(())
    }

    fn is_free(&self, address: Ipv4Addr) -> bool {
        if address == self.gateway || address == self.own_gateway() || self.is_reserved(address) {
            return false;
        }
        match (self.dhcp_start, self.dhcp_end) {
            (Some(start), Some(end)) => address < start || address > end,
            _ => true,
        }
    }
}
