//! Network, subnet and reservation records.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Link-layer family of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Ethernet management or user network.
    Ethernet,
    /// Slingshot high-speed fabric.
    Slingshot10,
}

/// Logical network with its ordered subnets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    /// Short network name, e.g. `NMN`.
    pub name: String,
    /// Descriptive name.
    pub full_name: String,
    /// Address block covering every subnet.
    pub cidr: Ipv4Net,
    /// Inclusive VLAN range available to subnets.
    pub vlan_range: (u16, u16),
    /// MTU value.
    pub mtu: u32,
    /// Link-layer family.
    pub network_type: NetworkType,
    /// Subnets in allocation order.
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

/// Subnet inside a [`Network`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet {
    /// Name, unique within the network.
    pub name: String,
    /// Descriptive name.
    pub full_name: String,
    /// Own address block.
    pub cidr: Ipv4Net,
    /// VLAN identifier.
    pub vlan_id: u16,
    /// Effective gateway.
    pub gateway: Ipv4Addr,
    /// Effective mask length; the parent network's in supernet mode.
    pub mask_prefix: u8,
    /// Gateway and mask were taken from the parent network.
    #[serde(default, skip_serializing_if = "is_false")]
    pub supernet: bool,
    /// First dynamic address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_start: Option<Ipv4Addr>,
    /// Last dynamic address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_end: Option<Ipv4Addr>,
    /// Named addresses in allocation order.
    #[serde(default)]
    pub reservations: Vec<IpReservation>,
}

/// Named address inside a [`Subnet`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpReservation {
    /// Name, unique within the subnet.
    pub name: String,
    /// Reserved address.
    pub address: Ipv4Addr,
    /// Owning identifier, usually an xname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Additional DNS names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_serialization_skips_unset_fields() {
        let subnet = Subnet {
            name: "network_hardware".into(),
            full_name: "NMN Management Network Infrastructure".into(),
            cidr: "10.252.0.0/26".parse().unwrap(),
            vlan_id: 2,
            gateway: Ipv4Addr::new(10, 252, 0, 1),
            mask_prefix: 26,
            supernet: false,
            dhcp_start: None,
            dhcp_end: None,
            reservations: vec![IpReservation {
                name: "sw-spine-001".into(),
                address: Ipv4Addr::new(10, 252, 0, 2),
                comment: Some("x3000c0h33s1".into()),
                aliases: Vec::new(),
            }],
        };

        let json = serde_json::to_value(&subnet).unwrap();
        assert!(json.get("supernet").is_none());
        assert!(json.get("dhcp_start").is_none());
        assert_eq!(json["cidr"], "10.252.0.0/26");
        assert_eq!(json["reservations"][0]["comment"], "x3000c0h33s1");
        assert!(json["reservations"][0].get("aliases").is_none());
    }

    #[test]
    fn network_vlan_range_serializes_as_pair() {
        let network = Network {
            name: "HSN".into(),
            full_name: "High Speed Network".into(),
            cidr: "10.253.0.0/16".parse().unwrap(),
            vlan_range: (613, 617),
            mtu: 9000,
            network_type: NetworkType::Slingshot10,
            subnets: Vec::new(),
        };

        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["vlan_range"], serde_json::json!([613, 617]));
        assert_eq!(json["network_type"], "slingshot10");
    }
}
