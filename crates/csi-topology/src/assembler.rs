//! Topology assembly.
//!
//! Turns resolved cabinets, compiled networks, classified switches and the
//! cabling map into hardware records, then cross-checks the result: every
//! cabling destination, management node and reservation owner has to land on
//! a hardware item, and per-class cabinet counts have to survive assembly.
//!
//! Assembly also yields each node's hostname. [`backfill_reservations`] uses
//! those to rename the xname-owned reservations made during allocation.

use crate::cabinets::{CabinetDetail, ResolvedCabinets};
use crate::inputs::CablingRow;
use crate::ncn::LogicalNcn;
use crate::networks::cabinet_subnet_name;
use crate::state::{
    insert_unique, CabinetNetwork, CabinetProperties, ConnectorProperties, ExtraProperties,
    HardwareItem, NodeProperties, SwitchProperties,
};
use crate::switches::{hardware_type_for, ManagementSwitch};
use csi_core::types::{network_names, CabinetClass, HardwareType, NodeRole, NodeSubRole};
use csi_core::{Error, Result, Xname};
use csi_ipam::Network;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Key of the compute-network map in cabinet properties.
const CABINET_NETWORKS_KEY: &str = "cn";

/// Networks whose node-owned reservations are renamed to the node hostname.
const NODE_NETWORKS: &[&str] = &[
    network_names::NMN,
    network_names::CMN,
    network_names::CAN,
    network_names::CHN,
    network_names::MTL,
];

/// Assembled hardware plus the hostnames handed out to nodes.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Hardware by xname
    pub hardware: BTreeMap<String, HardwareItem>,
    /// Node hostname by node xname
    pub hostnames: BTreeMap<Xname, String>,
}

/// Builds and cross-checks the hardware inventory.
///
/// # Errors
///
/// Returns [`Error::InvalidXname`] or [`Error::InvalidInput`] for a malformed
/// cabling row, [`Error::InvalidSwitch`] for a misplaced CDU switch, and
/// [`Error::Consistency`] when a cross-check fails.
pub fn assemble(
    cabinets: &ResolvedCabinets,
    networks: &BTreeMap<String, Network>,
    switches: &[ManagementSwitch],
    ncns: &[LogicalNcn],
    cabling: &[CablingRow],
) -> Result<Assembly> {
    let mut assembly = Assembly::default();

    for cabinet in cabinets.all() {
        add_cabinet(&mut assembly.hardware, cabinet, networks)?;
    }
    for switch in switches {
        add_switch(&mut assembly.hardware, switch, cabinets)?;
    }
    for row in cabling {
        add_cabling_row(&mut assembly, row, cabinets)?;
    }

    check_ncns(&assembly, ncns)?;
    check_reservation_owners(&assembly.hardware, networks)?;
    check_cabinet_counts(&assembly.hardware, cabinets)?;

    info!(
        hardware = assembly.hardware.len(),
        nodes = assembly.hostnames.len(),
        "assembled topology"
    );
    Ok(assembly)
}

fn add_cabinet(
    hardware: &mut BTreeMap<String, HardwareItem>,
    cabinet: &CabinetDetail,
    networks: &BTreeMap<String, Network>,
) -> Result<()> {
    let subnet_name = cabinet_subnet_name(cabinet.id);
    let mut attached = BTreeMap::new();
    for (name, network) in networks {
        if let Some(subnet) = network.subnet(&subnet_name) {
            attached.insert(
                network_names::base_name(name).to_string(),
                CabinetNetwork {
                    cidr: subnet.cidr,
                    gateway: subnet.gateway,
                    vlan: subnet.vlan_id,
                },
            );
        }
    }

    let properties = CabinetProperties {
        model: cabinet.model.clone(),
        networks: BTreeMap::from([(CABINET_NETWORKS_KEY.to_string(), attached)]),
    };
    insert_unique(
        hardware,
        HardwareItem::new(cabinet.xname.clone(), cabinet.class)
            .with_properties(ExtraProperties::Cabinet(properties)),
    )?;

    for number in cabinet.layout.all() {
        let chassis = cabinet.xname.child('c', number)?;
        if cabinet.layout.is_liquid_cooled(number) {
            let bmc = chassis.child('b', 0)?;
            insert_unique(hardware, HardwareItem::new(bmc, cabinet.class))?;
        }
        insert_unique(hardware, HardwareItem::new(chassis, cabinet.class))?;
    }
    debug!(cabinet = cabinet.id, chassis = cabinet.layout.all().len(), "added cabinet");
    Ok(())
}

fn add_switch(
    hardware: &mut BTreeMap<String, HardwareItem>,
    switch: &ManagementSwitch,
    cabinets: &ResolvedCabinets,
) -> Result<()> {
    let hardware_type = hardware_type_for(switch, cabinets)?;
    let class = class_of(&switch.xname, cabinets)?;
    let properties = SwitchProperties {
        ip4addr: switch.management_address,
        brand: switch.brand.clone(),
        model: switch.model.clone(),
        aliases: vec![switch.name.clone()],
    };
    insert_unique(
        hardware,
        HardwareItem::with_type(switch.xname.clone(), hardware_type, class)
            .with_properties(ExtraProperties::Switch(properties)),
    )
}

/// Device named in the source column of a cabling row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceDevice {
    Node {
        role: NodeRole,
        sub_role: Option<NodeSubRole>,
        number: u32,
    },
    Pdu(u32),
}

impl SourceDevice {
    fn parse(source: &str) -> Option<Self> {
        let source = source.trim().to_ascii_lowercase();
        let split = source.find(|c: char| c.is_ascii_digit())?;
        let (prefix, digits) = source.split_at(split);
        let number: u32 = digits.parse().ok()?;

        let node = |role, sub_role| Self::Node {
            role,
            sub_role,
            number,
        };
        Some(match prefix {
            "mn" => node(NodeRole::Management, Some(NodeSubRole::Master)),
            "wn" => node(NodeRole::Management, Some(NodeSubRole::Worker)),
            "sn" => node(NodeRole::Management, Some(NodeSubRole::Storage)),
            "cn" | "nid" => node(NodeRole::Compute, None),
            "uan" => node(NodeRole::Application, Some(NodeSubRole::Uan)),
            "pdu" => Self::Pdu(number),
            _ => return None,
        })
    }

    fn hostname(self) -> Option<String> {
        match self {
            Self::Node {
                role: NodeRole::Compute,
                number,
                ..
            } => Some(format!("nid{number:06}")),
            Self::Node {
                sub_role: Some(NodeSubRole::Uan),
                number,
                ..
            } => Some(format!("uan{number:02}")),
            Self::Node {
                sub_role: Some(sub_role),
                number,
                ..
            } => sub_role
                .hostname_letter()
                .map(|letter| format!("ncn-{letter}{number:03}")),
            Self::Node { .. } | Self::Pdu(_) => None,
        }
    }
}

fn add_cabling_row(
    assembly: &mut Assembly,
    row: &CablingRow,
    cabinets: &ResolvedCabinets,
) -> Result<()> {
    let Some(device) = SourceDevice::parse(&row.source) else {
        warn!(source = %row.source, rack = %row.source_rack, "unknown cabling source; skipping");
        return Ok(());
    };

    let rack = Xname::parse_as(row.source_rack.trim(), HardwareType::Cabinet)?;
    let class = class_of(&rack, cabinets)?;

    let peer = match device {
        SourceDevice::Pdu(number) => {
            let pdu = rack.child('m', number)?;
            insert_unique(&mut assembly.hardware, HardwareItem::new(pdu.clone(), class))?;
            pdu
        }
        SourceDevice::Node {
            role,
            sub_role,
            number,
        } => {
            let slot = rack_unit(&row.source, &row.source_location)?;
            let node_number = sub_location_node(row)?;
            let node = Xname::parse_as(
                format!("{rack}c0s{slot}b0n{node_number}"),
                HardwareType::Node,
            )?;
            let hostname = device.hostname().ok_or_else(|| {
                Error::InvalidInput(format!("cabling source {} has no hostname", row.source))
            })?;
            if let Some((other, _)) = assembly.hostnames.iter().find(|(_, h)| **h == hostname) {
                return Err(Error::Consistency(format!(
                    "hostname {hostname} is claimed by both {other} and {node}"
                )));
            }

            let properties = NodeProperties {
                role,
                sub_role,
                nid: (role == NodeRole::Compute).then_some(number),
                aliases: vec![hostname.clone()],
            };
            insert_unique(
                &mut assembly.hardware,
                HardwareItem::new(node.clone(), class)
                    .with_properties(ExtraProperties::Node(properties)),
            )?;
            assembly.hostnames.insert(node.clone(), hostname);

            node.parent()
                .ok_or_else(|| Error::InvalidXname(format!("node {node} has no BMC parent")))?
        }
    };

    add_connector(assembly, row, &peer)
}

fn add_connector(assembly: &mut Assembly, row: &CablingRow, peer: &Xname) -> Result<()> {
    let destination = Xname::parse_as(row.destination_rack.trim(), HardwareType::Cabinet)?;
    let unit = rack_unit(&row.source, &row.destination_location)?;
    let switch = destination.child('c', 0)?.child('w', unit)?;

    let (brand, class) = match assembly.hardware.get(switch.as_str()) {
        Some(HardwareItem {
            extra_properties: Some(ExtraProperties::Switch(properties)),
            hardware_type: HardwareType::MgmtSwitch,
            class,
            ..
        }) => (properties.brand.clone(), *class),
        _ => {
            return Err(Error::Consistency(format!(
                "cabling row {} lands on {switch}, which is not a known leaf-BMC switch",
                row.source
            )))
        }
    };

    let port = parse_number(&row.source, "destination port", &row.destination_port, 'j')?;
    let connector = switch.child('j', port)?;
    let properties = ConnectorProperties {
        vendor_name: vendor_port_name(&brand, port),
        node_nics: vec![peer.to_string()],
    };
    insert_unique(
        &mut assembly.hardware,
        HardwareItem::new(connector, class).with_properties(ExtraProperties::Connector(properties)),
    )
}

/// Switch port name as the vendor's CLI spells it.
fn vendor_port_name(brand: &str, port: u32) -> String {
    if brand.eq_ignore_ascii_case("aruba") {
        format!("1/1/{port}")
    } else if brand.eq_ignore_ascii_case("dell") {
        format!("ethernet1/1/{port}")
    } else {
        port.to_string()
    }
}

fn rack_unit(source: &str, location: &str) -> Result<u32> {
    parse_number(source, "location", location, 'u')
}

/// `L` and `R` are the left and right nodes of a dual-node chassis.
fn sub_location_node(row: &CablingRow) -> Result<u32> {
    match row.source_sub_location.as_deref().map(str::trim) {
        None | Some("") => Ok(0),
        Some(l) if l.eq_ignore_ascii_case("l") => Ok(1),
        Some(r) if r.eq_ignore_ascii_case("r") => Ok(2),
        Some(other) => parse_number(&row.source, "sub-location", other, 'n'),
    }
}

fn parse_number(source: &str, field: &str, raw: &str, prefix: char) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix(prefix)
        .or_else(|| trimmed.strip_prefix(prefix.to_ascii_uppercase()))
        .unwrap_or(trimmed);
    digits.parse().map_err(|_| {
        Error::InvalidInput(format!("cabling row {source}: {field} `{raw}` is not a number"))
    })
}

/// Class of the cabinet holding `xname`. Components outside any cabinet
/// (CDU switches) are Mountain hardware.
fn class_of(xname: &Xname, cabinets: &ResolvedCabinets) -> Result<CabinetClass> {
    let Some(id) = xname.cabinet_id() else {
        return Ok(CabinetClass::Mountain);
    };
    cabinets.find(id).map(|c| c.class).ok_or_else(|| {
        Error::Consistency(format!("{xname} is in cabinet x{id}, which is not defined"))
    })
}

fn check_ncns(assembly: &Assembly, ncns: &[LogicalNcn]) -> Result<()> {
    for ncn in ncns {
        let node = assembly
            .hardware
            .get(ncn.xname.as_str())
            .and_then(HardwareItem::node)
            .ok_or_else(|| {
                Error::Consistency(format!(
                    "management node {} is not in the cabling map",
                    ncn.xname
                ))
            })?;
        if node.sub_role != Some(ncn.sub_role) {
            return Err(Error::Consistency(format!(
                "management node {} is a {} in the node metadata but cabled as {}",
                ncn.xname,
                ncn.sub_role,
                node.sub_role
                    .map_or_else(|| "compute node".to_string(), |s| s.to_string())
            )));
        }
    }
    Ok(())
}

fn check_reservation_owners(
    hardware: &BTreeMap<String, HardwareItem>,
    networks: &BTreeMap<String, Network>,
) -> Result<()> {
    // Only a node's BMC may own a reservation without being an item itself.
    let bmcs: BTreeSet<&str> = hardware
        .values()
        .filter(|h| h.hardware_type == HardwareType::Node)
        .map(|h| h.parent.as_str())
        .collect();
    for network in networks.values() {
        for subnet in &network.subnets {
            for reservation in &subnet.reservations {
                let Some(owner) = reservation.comment.as_deref() else {
                    continue;
                };
                if !hardware.contains_key(owner) && !bmcs.contains(owner) {
                    return Err(Error::Consistency(format!(
                        "reservation {} in {}/{} is owned by {owner}, which is not in the topology",
                        reservation.name, network.name, subnet.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn check_cabinet_counts(
    hardware: &BTreeMap<String, HardwareItem>,
    cabinets: &ResolvedCabinets,
) -> Result<()> {
    for class in CabinetClass::all() {
        let assembled = hardware
            .values()
            .filter(|h| h.hardware_type == HardwareType::Cabinet && h.class == *class)
            .count();
        let resolved = cabinets.count_by_class(*class);
        if assembled != resolved {
            return Err(Error::Consistency(format!(
                "{class} cabinets: resolved {resolved} but assembled {assembled}"
            )));
        }
    }
    Ok(())
}

/// Renames reservations owned by management nodes to their hostnames.
///
/// Node-owned reservations on NMN, CMN, CAN, CHN and MTL become `ncn-xNNN`;
/// BMC-owned reservations on HMN become `ncn-xNNN-mgmt`. Addresses stay put
/// and every renamed reservation gains a `<host>.<network>` alias. Returns the
/// number of reservations renamed.
///
/// # Errors
///
/// Returns [`Error::Consistency`] for a node without a hostname and
/// [`Error::ReservationConflict`] when the new name is already taken.
pub fn backfill_reservations(
    networks: &mut BTreeMap<String, Network>,
    ncns: &[LogicalNcn],
    hostnames: &BTreeMap<Xname, String>,
) -> Result<usize> {
    let mut renamed = 0;
    for ncn in ncns {
        let host = hostnames.get(&ncn.xname).ok_or_else(|| {
            Error::Consistency(format!("management node {} has no hostname", ncn.xname))
        })?;

        for name in NODE_NETWORKS {
            if let Some(network) = networks.get_mut(*name) {
                let alias = format!("{host}.{}", name.to_lowercase());
                renamed += rename_in(network, ncn.xname.as_str(), host, alias)?;
            }
        }
        if let Some(hmn) = networks.get_mut(network_names::HMN) {
            let mgmt = format!("{host}-mgmt");
            let alias = format!("{mgmt}.hmn");
            renamed += rename_in(hmn, ncn.bmc_xname.as_str(), &mgmt, alias)?;
        }
    }
    info!(renamed, "back-filled reservation hostnames");
    Ok(renamed)
}

fn rename_in(network: &mut Network, owner: &str, hostname: &str, alias: String) -> Result<usize> {
    let aliases = [alias];
    let mut renamed = 0;
    for subnet in &mut network.subnets {
        if subnet.rename_by_comment(owner, hostname, &aliases)? {
            renamed += 1;
        }
    }
    Ok(renamed)
}
