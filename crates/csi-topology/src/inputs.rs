//! Already-parsed input records.
//!
//! These are the data contracts of the collaborators that read operator files.
//! Every record deserializes from JSON with serde; optional fields default.

use csi_core::types::CabinetKind;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a compilation run consumes besides the run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteInputs {
    /// Cabinet population
    #[serde(default)]
    pub cabinets: CabinetInputs,

    /// Management switch metadata rows
    #[serde(default)]
    pub switches: Vec<SwitchRecord>,

    /// Management node metadata rows
    #[serde(default)]
    pub node_metadata: Vec<NodeMetadataRecord>,

    /// Hardware cabling map rows, in file order
    #[serde(default)]
    pub cabling: Vec<CablingRow>,
}

/// Cabinet population, per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CabinetInputs {
    /// Explicit cabinets; a kind listed here ignores its rule
    #[serde(default)]
    pub explicit: BTreeMap<CabinetKind, Vec<CabinetRecord>>,

    /// Generation rules for kinds without an explicit list
    #[serde(default)]
    pub rules: BTreeMap<CabinetKind, CabinetRule>,
}

impl CabinetInputs {
    /// Add an explicit cabinet.
    #[must_use]
    pub fn with_cabinet(mut self, kind: CabinetKind, record: CabinetRecord) -> Self {
        self.explicit.entry(kind).or_default().push(record);
        self
    }

    /// Set the generation rule for a kind.
    #[must_use]
    pub fn with_rule(mut self, kind: CabinetKind, count: u32, starting_id: u32) -> Self {
        self.rules.insert(kind, CabinetRule { count, starting_id });
        self
    }
}

/// `{count, starting_id}` generation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinetRule {
    /// Number of cabinets to generate
    pub count: u32,
    /// First cabinet ID
    pub starting_id: u32,
}

/// One explicitly listed cabinet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinetRecord {
    /// Cabinet ID
    pub id: u32,

    /// Model override, e.g. `EX2500`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Chassis population override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_count: Option<ChassisCount>,

    /// Fixed hardware-management subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmn_subnet: Option<Ipv4Net>,

    /// Fixed hardware-management VLAN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmn_vlan: Option<u16>,

    /// Fixed node-management subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nmn_subnet: Option<Ipv4Net>,

    /// Fixed node-management VLAN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nmn_vlan: Option<u16>,
}

impl CabinetRecord {
    /// Cabinet with no overrides.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the chassis population.
    #[must_use]
    pub const fn with_chassis_count(mut self, air_cooled: u32, liquid_cooled: u32) -> Self {
        self.chassis_count = Some(ChassisCount {
            air_cooled,
            liquid_cooled,
        });
        self
    }

    /// Pin the hardware-management subnet and VLAN.
    #[must_use]
    pub const fn with_hmn(mut self, subnet: Ipv4Net, vlan: u16) -> Self {
        self.hmn_subnet = Some(subnet);
        self.hmn_vlan = Some(vlan);
        self
    }

    /// Pin the node-management subnet and VLAN.
    #[must_use]
    pub const fn with_nmn(mut self, subnet: Ipv4Net, vlan: u16) -> Self {
        self.nmn_subnet = Some(subnet);
        self.nmn_vlan = Some(vlan);
        self
    }
}

/// Chassis population override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisCount {
    /// Air-cooled chassis
    #[serde(alias = "air")]
    pub air_cooled: u32,
    /// Liquid-cooled chassis
    #[serde(alias = "liquid")]
    pub liquid_cooled: u32,
}

/// Switch metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    /// Switch xname
    pub xname: String,
    /// Switch type, e.g. `Spine` or `LeafBMC`
    #[serde(rename = "type")]
    pub switch_type: String,
    /// Vendor
    #[serde(default)]
    pub brand: String,
    /// Vendor model
    #[serde(default)]
    pub model: String,
}

impl SwitchRecord {
    /// Build a record.
    #[must_use]
    pub fn new(
        xname: impl Into<String>,
        switch_type: impl Into<String>,
        brand: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            xname: xname.into(),
            switch_type: switch_type.into(),
            brand: brand.into(),
            model: model.into(),
        }
    }
}

/// Node metadata row for a management node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadataRecord {
    /// Node xname
    pub xname: String,
    /// Role, normally `Management`
    pub role: String,
    /// Sub-role: `Master`, `Worker` or `Storage`
    pub subrole: String,
    /// BMC MAC address
    pub bmc_mac: String,
    /// PXE boot interface MAC address
    pub bootstrap_mac: String,
    /// First bond member MAC address
    pub bond0_mac0: String,
    /// Second bond member MAC address
    pub bond0_mac1: String,
}

/// One port-to-port connection from the hardware cabling map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CablingRow {
    /// Source device label, e.g. `mn01`, `cn0004`, `pdu0`
    pub source: String,
    /// Source rack xname, e.g. `x3000`
    pub source_rack: String,
    /// Source elevation, e.g. `u12`
    pub source_location: String,
    /// Position inside a multi-node enclosure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sub_location: Option<String>,
    /// Destination rack xname
    pub destination_rack: String,
    /// Destination switch elevation
    pub destination_location: String,
    /// Destination switch port, e.g. `j37`
    pub destination_port: String,
}
