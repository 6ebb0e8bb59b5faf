//! Management switch classification.
//!
//! Switches are named `sw-<type>-NNN` in xname order per type. The
//! hardware-management network later reserves one address per switch under
//! that name, and [`switches_from_reservations`] reads the population back
//! from those reservations together with their addresses.

use crate::cabinets::ResolvedCabinets;
use crate::catalog::SwitchCatalog;
use crate::inputs::SwitchRecord;
use csi_core::types::{CabinetClass, HardwareType, SwitchType};
use csi_core::{Error, Result, Xname};
use csi_ipam::Subnet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// A classified management switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagementSwitch {
    /// Switch xname
    pub xname: Xname,
    /// Hostname, e.g. `sw-leaf-bmc-001`
    pub name: String,
    /// Switch role
    pub switch_type: SwitchType,
    /// Vendor
    pub brand: String,
    /// Vendor model
    pub model: String,
    /// Hardware-management address, once reserved
    pub management_address: Option<Ipv4Addr>,
}

impl ManagementSwitch {
    /// True for spine and leaf switches, the ones that route customer
    /// management traffic.
    #[must_use]
    pub const fn is_spine_or_leaf(&self) -> bool {
        matches!(self.switch_type, SwitchType::Spine | SwitchType::Leaf)
    }
}

/// Classifies switch metadata rows.
///
/// Output is ordered by switch type and then by xname; names are numbered
/// from 001 within each type.
///
/// # Errors
///
/// Returns [`Error::InvalidSwitch`] for an unknown type, a duplicate xname or
/// a switch the catalog cannot resolve, and [`Error::InvalidXname`] for an
/// xname that does not fit the switch type.
pub fn classify_switches(
    records: &[SwitchRecord],
    catalog: &dyn SwitchCatalog,
) -> Result<Vec<ManagementSwitch>> {
    let mut parsed = Vec::with_capacity(records.len());
    let mut seen = BTreeSet::new();

    for record in records {
        let switch_type: SwitchType = record.switch_type.parse().map_err(|_| {
            Error::InvalidSwitch(format!(
                "switch {}: unknown type {}",
                record.xname, record.switch_type
            ))
        })?;
        let xname = parse_switch_xname(&record.xname, switch_type)?;
        if !seen.insert(xname.clone()) {
            return Err(Error::InvalidSwitch(format!("switch {xname} is listed twice")));
        }
        parsed.push((switch_type, xname));
    }
    parsed.sort();

    let mut switches = Vec::with_capacity(parsed.len());
    let mut current: Option<SwitchType> = None;
    let mut index = 0;
    for (switch_type, xname) in parsed {
        if current != Some(switch_type) {
            current = Some(switch_type);
            index = 0;
        }
        index += 1;

        let found = catalog.lookup(xname.as_str()).ok_or_else(|| {
            Error::InvalidSwitch(format!(
                "switch {xname} ({switch_type}) has no brand/model in the switch metadata"
            ))
        })?;
        let name = format!("{}-{index:03}", switch_type.name_prefix());
        debug!(%xname, %name, brand = %found.brand, model = %found.model, "classified switch");

        switches.push(ManagementSwitch {
            xname,
            name,
            switch_type,
            brand: found.brand,
            model: found.model,
            management_address: None,
        });
    }

    info!(count = switches.len(), "classified management switches");
    Ok(switches)
}

/// Rebuilds the switch population from a hardware-management subnet.
///
/// Every reservation named with a switch prefix yields one switch; its owner
/// comment is the xname and its address the management address. Other
/// reservations are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidSwitch`] for a switch reservation without an owner
/// or without a catalog entry, and [`Error::InvalidXname`] for an owner that
/// is not a valid xname for the switch type.
pub fn switches_from_reservations(
    subnet: &Subnet,
    catalog: &dyn SwitchCatalog,
) -> Result<Vec<ManagementSwitch>> {
    let mut switches = Vec::new();

    for reservation in &subnet.reservations {
        let Some(switch_type) = switch_type_for_name(&reservation.name) else {
            continue;
        };
        let owner = reservation.comment.as_deref().ok_or_else(|| {
            Error::InvalidSwitch(format!(
                "switch reservation {} in {} has no owning xname",
                reservation.name, subnet.name
            ))
        })?;
        let xname = parse_switch_xname(owner, switch_type)?;
        let found = catalog.lookup(xname.as_str()).ok_or_else(|| {
            Error::InvalidSwitch(format!(
                "switch {xname} ({}) has no brand/model in the switch metadata",
                reservation.name
            ))
        })?;

        switches.push(ManagementSwitch {
            xname,
            name: reservation.name.clone(),
            switch_type,
            brand: found.brand,
            model: found.model,
            management_address: Some(reservation.address),
        });
    }

    Ok(switches)
}

/// Switch type named by a hostname prefix, longest prefix first.
#[must_use]
pub fn switch_type_for_name(name: &str) -> Option<SwitchType> {
    SwitchType::all().iter().copied().find(|t| {
        name.strip_prefix(t.name_prefix())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|number| !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Hardware type recorded for a switch.
///
/// A CDU switch mounted in a chassis slot (`xXcChHsS`) is only valid inside a
/// Hill cabinet, where it is recorded as a high-level switch.
///
/// # Errors
///
/// Returns [`Error::InvalidSwitch`] for a chassis-mounted CDU switch outside
/// a Hill cabinet.
pub fn hardware_type_for(
    switch: &ManagementSwitch,
    cabinets: &ResolvedCabinets,
) -> Result<HardwareType> {
    match switch.switch_type {
        SwitchType::Spine | SwitchType::Leaf | SwitchType::Aggregation => {
            Ok(HardwareType::MgmtHlSwitch)
        }
        SwitchType::LeafBmc => Ok(HardwareType::MgmtSwitch),
        SwitchType::Cdu if switch.xname.hardware_type() == HardwareType::CduMgmtSwitch => {
            Ok(HardwareType::CduMgmtSwitch)
        }
        SwitchType::Cdu => {
            let in_hill = switch
                .xname
                .cabinet_id()
                .and_then(|id| cabinets.find(id))
                .is_some_and(|c| c.class == CabinetClass::Hill);
            if in_hill {
                Ok(HardwareType::MgmtHlSwitch)
            } else {
                Err(Error::InvalidSwitch(format!(
                    "CDU switch {} ({}) is chassis mounted but not in a Hill cabinet",
                    switch.xname, switch.name
                )))
            }
        }
    }
}

fn parse_switch_xname(raw: &str, switch_type: SwitchType) -> Result<Xname> {
    let expected: &[HardwareType] = match switch_type {
        SwitchType::Spine | SwitchType::Leaf | SwitchType::Aggregation => {
            &[HardwareType::MgmtHlSwitch]
        }
        SwitchType::LeafBmc => &[HardwareType::MgmtSwitch],
        SwitchType::Cdu => &[HardwareType::CduMgmtSwitch, HardwareType::MgmtHlSwitch],
    };

    let xname = Xname::parse(raw)?;
    if !expected.contains(&xname.hardware_type()) {
        return Err(Error::InvalidXname(format!(
            "{switch_type} switch {xname} is a {}, expected {}",
            xname.hardware_type(),
            expected
                .iter()
                .map(HardwareType::name)
                .collect::<Vec<_>>()
                .join(" or ")
        )));
    }
    Ok(xname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockSwitchCatalog, StaticSwitchCatalog, SwitchModel};
    use crate::inputs::{CabinetInputs, CabinetRecord};
    use crate::cabinets::resolve_cabinets;
    use csi_core::types::CabinetKind;

    fn records() -> Vec<SwitchRecord> {
        vec![
            SwitchRecord::new("x3000c0h34s1", "Spine", "Aruba", "8325"),
            SwitchRecord::new("x3000c0h33s1", "Spine", "Aruba", "8325"),
            SwitchRecord::new("x3000c0w22", "LeafBMC", "Aruba", "6300M"),
            SwitchRecord::new("x3000c0w9", "Leaf-BMC", "Aruba", "6300M"),
            SwitchRecord::new("d0w1", "CDU", "Aruba", "8360"),
        ]
    }

    #[test]
    fn classify_names_in_xname_order() {
        let records = records();
        let catalog = StaticSwitchCatalog::from_records(&records);
        let switches = classify_switches(&records, &catalog).unwrap();

        let names: Vec<(&str, &str)> = switches
            .iter()
            .map(|s| (s.name.as_str(), s.xname.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("sw-spine-001", "x3000c0h33s1"),
                ("sw-spine-002", "x3000c0h34s1"),
                ("sw-leaf-bmc-001", "x3000c0w9"),
                ("sw-leaf-bmc-002", "x3000c0w22"),
                ("sw-cdu-001", "d0w1"),
            ]
        );
        assert!(switches.iter().all(|s| s.management_address.is_none()));
    }

    #[test]
    fn classify_rejects_wrong_layout() {
        let records = vec![SwitchRecord::new("x3000c0w22", "Spine", "Aruba", "8325")];
        let catalog = StaticSwitchCatalog::from_records(&records);
        assert!(matches!(
            classify_switches(&records, &catalog),
            Err(Error::InvalidXname(_))
        ));
    }

    #[test]
    fn classify_rejects_unknown_type() {
        let records = vec![SwitchRecord::new("x3000c0w22", "Edge", "Aruba", "8325")];
        let catalog = StaticSwitchCatalog::from_records(&records);
        assert!(matches!(
            classify_switches(&records, &catalog),
            Err(Error::InvalidSwitch(_))
        ));
    }

    #[test]
    fn classify_requires_brand_and_model() {
        let records = vec![SwitchRecord::new("x3000c0h33s1", "Spine", "", "")];
        let mut catalog = MockSwitchCatalog::new();
        catalog
            .expect_lookup()
            .with(mockall::predicate::eq("x3000c0h33s1"))
            .times(1)
            .returning(|_| None);

        assert!(matches!(
            classify_switches(&records, &catalog),
            Err(Error::InvalidSwitch(_))
        ));
    }

    #[test]
    fn classify_rejects_duplicates() {
        let records = vec![
            SwitchRecord::new("x3000c0h33s1", "Spine", "Aruba", "8325"),
            SwitchRecord::new("X3000C0H33S1", "Spine", "Aruba", "8325"),
        ];
        let catalog = StaticSwitchCatalog::from_records(&records);
        assert!(classify_switches(&records, &catalog).is_err());
    }

    #[test]
    fn prefix_scan_longest_first() {
        assert_eq!(switch_type_for_name("sw-leaf-bmc-001"), Some(SwitchType::LeafBmc));
        assert_eq!(switch_type_for_name("sw-leaf-001"), Some(SwitchType::Leaf));
        assert_eq!(switch_type_for_name("sw-spine-002"), Some(SwitchType::Spine));
        assert_eq!(switch_type_for_name("sw-agg-001"), Some(SwitchType::Aggregation));
        assert_eq!(switch_type_for_name("sw-cdu-001"), Some(SwitchType::Cdu));
        assert_eq!(switch_type_for_name("ncn-m001"), None);
        assert_eq!(switch_type_for_name("sw-leaf-bmc"), None);
    }

    #[test]
    fn from_reservations_carries_addresses() {
        let mut subnet = Subnet::new("network_hardware", "10.254.0.0/24".parse().unwrap(), 4);
        subnet.add_reservation("sw-spine-001", "x3000c0h33s1").unwrap();
        subnet.add_reservation("sw-leaf-bmc-001", "x3000c0w22").unwrap();
        subnet.add_reservation("kubeapi-vip", "").unwrap();

        let catalog = StaticSwitchCatalog::new()
            .with_model("x3000c0h33s1", SwitchModel::new("Aruba", "8325"))
            .with_model("x3000c0w22", SwitchModel::new("Aruba", "6300M"));
        let switches = switches_from_reservations(&subnet, &catalog).unwrap();

        assert_eq!(switches.len(), 2);
        assert_eq!(switches[0].switch_type, SwitchType::Spine);
        assert_eq!(
            switches[0].management_address,
            Some("10.254.0.2".parse().unwrap())
        );
        assert_eq!(switches[1].switch_type, SwitchType::LeafBmc);
        assert_eq!(switches[1].xname.as_str(), "x3000c0w22");
    }

    #[test]
    fn from_reservations_requires_owner() {
        let mut subnet = Subnet::new("network_hardware", "10.254.0.0/24".parse().unwrap(), 4);
        subnet.add_reservation("sw-spine-001", "").unwrap();
        let catalog = StaticSwitchCatalog::new();
        assert!(matches!(
            switches_from_reservations(&subnet, &catalog),
            Err(Error::InvalidSwitch(_))
        ));
    }

    #[test]
    fn cdu_hardware_types() {
        let cabinets = resolve_cabinets(
            &CabinetInputs::default()
                .with_cabinet(CabinetKind::Hill, CabinetRecord::new(9000))
                .with_cabinet(CabinetKind::Mountain, CabinetRecord::new(1000)),
        )
        .unwrap();
        let switch = |xname: &str| ManagementSwitch {
            xname: Xname::parse(xname).unwrap(),
            name: "sw-cdu-001".into(),
            switch_type: SwitchType::Cdu,
            brand: "Dell".into(),
            model: "S4048T-ON".into(),
            management_address: None,
        };

        assert_eq!(
            hardware_type_for(&switch("d0w1"), &cabinets).unwrap(),
            HardwareType::CduMgmtSwitch
        );
        assert_eq!(
            hardware_type_for(&switch("x9000c3h1s1"), &cabinets).unwrap(),
            HardwareType::MgmtHlSwitch
        );
        assert!(matches!(
            hardware_type_for(&switch("x1000c3h1s1"), &cabinets),
            Err(Error::InvalidSwitch(_))
        ));
    }
}
