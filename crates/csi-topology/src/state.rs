//! The topology state document.

use csi_core::types::{CabinetClass, HardwareType, NodeRole, NodeSubRole};
use csi_core::{Error, Result, Xname};
use csi_ipam::Network;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Hardware and networks of one cluster.
///
/// Both maps are ordered so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyState {
    /// Networks by name
    pub networks: BTreeMap<String, Network>,
    /// Hardware by xname
    pub hardware: BTreeMap<String, HardwareItem>,
}

impl TopologyState {
    /// Pretty JSON rendering of the whole state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of hardware items of a type and class.
    #[must_use]
    pub fn count(&self, hardware_type: HardwareType, class: CabinetClass) -> usize {
        self.hardware
            .values()
            .filter(|h| h.hardware_type == hardware_type && h.class == class)
            .count()
    }
}

/// One hardware component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareItem {
    /// Component xname
    pub xname: Xname,
    /// Parent xname, `s0` for top-level components
    pub parent: String,
    /// Component type
    #[serde(rename = "type")]
    pub hardware_type: HardwareType,
    /// Human-facing type string
    pub type_string: String,
    /// Class of the cabinet the component lives in
    pub class: CabinetClass,
    /// Type-specific properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_properties: Option<ExtraProperties>,
}

impl HardwareItem {
    /// Build an item whose type comes from its xname.
    #[must_use]
    pub fn new(xname: Xname, class: CabinetClass) -> Self {
        let hardware_type = xname.hardware_type();
        Self::with_type(xname, hardware_type, class)
    }

    /// Build an item with an explicit type.
    ///
    /// Used where the recorded type differs from the xname layout, such as a
    /// chassis-mounted CDU switch recorded as a high-level switch.
    #[must_use]
    pub fn with_type(xname: Xname, hardware_type: HardwareType, class: CabinetClass) -> Self {
        Self {
            parent: xname.parent_string(),
            xname,
            hardware_type,
            type_string: hardware_type.type_string().to_string(),
            class,
            extra_properties: None,
        }
    }

    /// Attach type-specific properties.
    #[must_use]
    pub fn with_properties(mut self, properties: ExtraProperties) -> Self {
        self.extra_properties = Some(properties);
        self
    }

    /// Node properties, if this is a node.
    #[must_use]
    pub fn node(&self) -> Option<&NodeProperties> {
        match &self.extra_properties {
            Some(ExtraProperties::Node(node)) => Some(node),
            _ => None,
        }
    }
}

/// Type-specific hardware properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraProperties {
    /// Cabinet networks and model
    Cabinet(CabinetProperties),
    /// Switch address and vendor
    Switch(SwitchProperties),
    /// Node identity
    Node(NodeProperties),
    /// Switch port peer
    Connector(ConnectorProperties),
}

/// Per-cabinet network attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CabinetProperties {
    /// Cabinet model, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Networks by purpose (`cn`), then by base network name
    pub networks: BTreeMap<String, BTreeMap<String, CabinetNetwork>>,
}

/// One cabinet subnet as seen from the cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinetNetwork {
    /// Subnet CIDR
    pub cidr: Ipv4Net,
    /// Subnet gateway
    pub gateway: Ipv4Addr,
    /// Subnet VLAN
    pub vlan: u16,
}

/// Switch properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchProperties {
    /// Hardware-management address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip4addr: Option<Ipv4Addr>,
    /// Vendor
    pub brand: String,
    /// Vendor model
    pub model: String,
    /// Hostnames
    pub aliases: Vec<String>,
}

/// Node properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProperties {
    /// Role
    pub role: NodeRole,
    /// Sub-role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<NodeSubRole>,
    /// Node ID, compute nodes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<u32>,
    /// Hostnames
    pub aliases: Vec<String>,
}

/// Management switch port properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorProperties {
    /// Port name as the switch vendor spells it
    pub vendor_name: String,
    /// Devices plugged into the port
    pub node_nics: Vec<String>,
}

/// Inserts an item, rejecting a second item at the same xname.
///
/// # Errors
///
/// Returns [`Error::Consistency`] on a duplicate xname.
pub fn insert_unique(
    hardware: &mut BTreeMap<String, HardwareItem>,
    item: HardwareItem,
) -> Result<()> {
    let key = item.xname.to_string();
    if let Some(existing) = hardware.get(&key) {
        return Err(Error::Consistency(format!(
            "hardware {key} is defined twice ({} and {})",
            existing.hardware_type, item.hardware_type
        )));
    }
    hardware.insert(key, item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_item_serialization() {
        let item = HardwareItem::new(Xname::parse("x3000c0s1b0n0").unwrap(), CabinetClass::River)
            .with_properties(ExtraProperties::Node(NodeProperties {
                role: NodeRole::Management,
                sub_role: Some(NodeSubRole::Master),
                nid: None,
                aliases: vec!["ncn-m001".into()],
            }));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["xname"], "x3000c0s1b0n0");
        assert_eq!(json["parent"], "x3000c0s1b0");
        assert_eq!(json["type"], "comptype_node");
        assert_eq!(json["type_string"], "Node");
        assert_eq!(json["class"], "River");
        assert_eq!(json["extra_properties"]["sub_role"], "Master");
        assert!(json["extra_properties"].get("nid").is_none());
        assert_eq!(item.node().unwrap().aliases[0], "ncn-m001");
    }

    #[test]
    fn insert_unique_rejects_duplicates() {
        let mut hardware = BTreeMap::new();
        let cabinet = HardwareItem::new(Xname::cabinet(3000).unwrap(), CabinetClass::River);
        insert_unique(&mut hardware, cabinet.clone()).unwrap();
        assert!(matches!(
            insert_unique(&mut hardware, cabinet),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn count_by_type_and_class() {
        let mut state = TopologyState::default();
        for id in [1000, 1001] {
            let item = HardwareItem::new(Xname::cabinet(id).unwrap(), CabinetClass::Mountain);
            insert_unique(&mut state.hardware, item).unwrap();
        }
        assert_eq!(state.count(HardwareType::Cabinet, CabinetClass::Mountain), 2);
        assert_eq!(state.count(HardwareType::Cabinet, CabinetClass::River), 0);
    }
}
