//! Management node normalization.

use crate::inputs::NodeMetadataRecord;
use csi_core::types::{HardwareType, NodeRole, NodeSubRole};
use csi_core::{Error, Result, Xname};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// A validated management node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicalNcn {
    /// Node xname
    pub xname: Xname,
    /// BMC xname, the node's parent
    pub bmc_xname: Xname,
    /// Always [`NodeRole::Management`]
    pub role: NodeRole,
    /// Master, Worker or Storage
    pub sub_role: NodeSubRole,
    /// BMC MAC address, lowercase colon separated
    pub bmc_mac: String,
    /// PXE boot interface MAC address
    pub bootstrap_mac: String,
    /// First bond member MAC address
    pub bond0_mac0: String,
    /// Second bond member MAC address
    pub bond0_mac1: String,
}

/// Validates node metadata rows and returns the nodes in xname order.
///
/// # Errors
///
/// Returns [`Error::InvalidXname`] when an xname is not a node,
/// [`Error::InvalidInput`] for a role other than Management, a sub-role
/// other than Master/Worker/Storage, a malformed MAC address, a duplicate
/// node, or two nodes behind the same BMC.
pub fn normalize_ncns(records: &[NodeMetadataRecord]) -> Result<Vec<LogicalNcn>> {
    let mut seen = BTreeSet::new();
    let mut bmcs = BTreeMap::new();
    let mut ncns = Vec::with_capacity(records.len());

    for record in records {
        let xname = Xname::parse_as(&record.xname, HardwareType::Node)?;
        let bmc_xname = xname.parent().ok_or_else(|| {
            Error::InvalidXname(format!("node {xname} has no BMC parent"))
        })?;

        let role: NodeRole = record.role.parse()?;
        if role != NodeRole::Management {
            return Err(Error::InvalidInput(format!(
                "node {xname}: role {} is not Management",
                record.role
            )));
        }
        let sub_role: NodeSubRole = record.subrole.parse()?;
        if sub_role.hostname_letter().is_none() {
            return Err(Error::InvalidInput(format!(
                "node {xname}: sub-role {sub_role} is not Master, Worker or Storage"
            )));
        }

        if !seen.insert(xname.clone()) {
            return Err(Error::InvalidInput(format!(
                "node {xname} appears twice in the node metadata"
            )));
        }

        // The HMN bootstrap reservation is keyed by BMC.
        if let Some(other) = bmcs.insert(bmc_xname.clone(), xname.clone()) {
            return Err(Error::InvalidInput(format!(
                "management nodes {other} and {xname} share BMC {bmc_xname}"
            )));
        }

        ncns.push(LogicalNcn {
            bmc_mac: normalize_mac(&xname, "bmc_mac", &record.bmc_mac)?,
            bootstrap_mac: normalize_mac(&xname, "bootstrap_mac", &record.bootstrap_mac)?,
            bond0_mac0: normalize_mac(&xname, "bond0_mac0", &record.bond0_mac0)?,
            bond0_mac1: normalize_mac(&xname, "bond0_mac1", &record.bond0_mac1)?,
            xname,
            bmc_xname,
            role,
            sub_role,
        });
    }

    ncns.sort_by(|a, b| a.xname.cmp(&b.xname));
    info!(count = ncns.len(), "normalized management nodes");
    Ok(ncns)
}

/// Normalizes a MAC address to lowercase, colon separated octets.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless the value is six two-digit hex
/// octets separated by `:` or `-`.
pub fn normalize_mac(xname: &Xname, field: &str, raw: &str) -> Result<String> {
    let octets: Vec<&str> = raw.trim().split([':', '-']).collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.bytes().all(|b| b.is_ascii_hexdigit()));
    if !valid {
        return Err(Error::InvalidInput(format!(
            "node {xname}: {field} `{raw}` is not a MAC address"
        )));
    }
    Ok(octets.join(":").to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(xname: &str, subrole: &str) -> NodeMetadataRecord {
        NodeMetadataRecord {
            xname: xname.to_string(),
            role: "Management".to_string(),
            subrole: subrole.to_string(),
            bmc_mac: "B4:2E:99:DF:EB:BF".to_string(),
            bootstrap_mac: "14:02:ec:d9:79:cc".to_string(),
            bond0_mac0: "14-02-ec-d9-79-cc".to_string(),
            bond0_mac1: "94:40:c9:5f:b6:92".to_string(),
        }
    }

    #[test]
    fn normalizes_and_sorts() {
        let ncns = normalize_ncns(&[
            record("x3000c0s9b0n0", "Worker"),
            record("x3000c0s1b0n0", "master"),
        ])
        .unwrap();

        assert_eq!(ncns[0].xname.as_str(), "x3000c0s1b0n0");
        assert_eq!(ncns[0].sub_role, NodeSubRole::Master);
        assert_eq!(ncns[0].bmc_xname.as_str(), "x3000c0s1b0");
        assert_eq!(ncns[0].bmc_mac, "b4:2e:99:df:eb:bf");
        assert_eq!(ncns[0].bond0_mac0, "14:02:ec:d9:79:cc");
        assert_eq!(ncns[1].sub_role, NodeSubRole::Worker);
    }

    #[test]
    fn rejects_non_node_xname() {
        assert!(matches!(
            normalize_ncns(&[record("x3000c0s1b0", "Master")]),
            Err(Error::InvalidXname(_))
        ));
    }

    #[test]
    fn rejects_bad_roles() {
        let mut compute = record("x3000c0s1b0n0", "Worker");
        compute.role = "Compute".to_string();
        assert!(normalize_ncns(&[compute]).is_err());
        assert!(normalize_ncns(&[record("x3000c0s1b0n0", "UAN")]).is_err());
        assert!(normalize_ncns(&[record("x3000c0s1b0n0", "Gateway")]).is_err());
    }

    #[test]
    fn rejects_bad_mac() {
        let mut bad = record("x3000c0s1b0n0", "Storage");
        bad.bootstrap_mac = "14:02:ec:d9:79".to_string();
        assert!(matches!(
            normalize_ncns(&[bad]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_shared_bmc() {
        let err = normalize_ncns(&[
            record("x3000c0s5b0n1", "Worker"),
            record("x3000c0s5b0n2", "Worker"),
        ])
        .unwrap_err();
        assert!(matches!(&err, Error::InvalidInput(msg) if msg.contains("x3000c0s5b0")));
    }

    #[test]
    fn rejects_duplicates() {
        assert!(normalize_ncns(&[
            record("x3000c0s1b0n0", "Master"),
            record("x3000c0s01b0n0", "Master"),
        ])
        .is_err());
    }
}
