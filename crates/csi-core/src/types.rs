//! Core site-init domain types.
//!
//! Cabinet classes and kinds, hardware component types, management switch
//! types and node roles shared by every stage of the compiler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Model string of the cabinet that takes a chassis-count override.
pub const EX2500_MODEL: &str = "EX2500";

/// Physical cabinet class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CabinetClass {
    /// Air-cooled standard rack
    River,
    /// Liquid-cooled short cabinet
    Hill,
    /// Liquid-cooled full cabinet
    Mountain,
}

impl CabinetClass {
    /// Returns the class name as used in topology records.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::River => "River",
            Self::Hill => "Hill",
            Self::Mountain => "Mountain",
        }
    }

    /// Returns all cabinet classes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::River, Self::Hill, Self::Mountain]
    }

    /// True for classes whose chassis are liquid cooled.
    #[must_use]
    pub const fn is_liquid_cooled(&self) -> bool {
        matches!(self, Self::Hill | Self::Mountain)
    }
}

impl fmt::Display for CabinetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cabinet kind as declared by the operator.
///
/// Kinds are finer grained than [`CabinetClass`]: the `EX` model kinds each
/// belong to one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CabinetKind {
    /// Generic river cabinet
    #[serde(rename = "river")]
    River,
    /// Generic hill cabinet
    #[serde(rename = "hill")]
    Hill,
    /// Generic mountain cabinet
    #[serde(rename = "mountain")]
    Mountain,
    /// EX2000 hill cabinet
    #[serde(rename = "EX2000")]
    Ex2000,
    /// EX2500 hill cabinet with configurable chassis population
    #[serde(rename = "EX2500")]
    Ex2500,
    /// EX3000 mountain cabinet
    #[serde(rename = "EX3000")]
    Ex3000,
    /// EX4000 mountain cabinet
    #[serde(rename = "EX4000")]
    Ex4000,
}

impl CabinetKind {
    /// Returns the kind label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::River => "river",
            Self::Hill => "hill",
            Self::Mountain => "mountain",
            Self::Ex2000 => "EX2000",
            Self::Ex2500 => EX2500_MODEL,
            Self::Ex3000 => "EX3000",
            Self::Ex4000 => "EX4000",
        }
    }

    /// Returns all cabinet kinds in resolution order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::River,
            Self::Hill,
            Self::Mountain,
            Self::Ex2000,
            Self::Ex2500,
            Self::Ex3000,
            Self::Ex4000,
        ]
    }

    /// Returns the class this kind belongs to.
    #[must_use]
    pub const fn class(&self) -> CabinetClass {
        match self {
            Self::River => CabinetClass::River,
            Self::Hill | Self::Ex2000 | Self::Ex2500 => CabinetClass::Hill,
            Self::Mountain | Self::Ex3000 | Self::Ex4000 => CabinetClass::Mountain,
        }
    }

    /// Model string recorded on cabinets of this kind, if the kind names one.
    #[must_use]
    pub const fn model(&self) -> Option<&'static str> {
        match self {
            Self::River | Self::Hill | Self::Mountain => None,
            _ => Some(self.name()),
        }
    }
}

impl FromStr for CabinetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "river" => Ok(Self::River),
            "hill" => Ok(Self::Hill),
            "mountain" => Ok(Self::Mountain),
            "ex2000" => Ok(Self::Ex2000),
            "ex2500" => Ok(Self::Ex2500),
            "ex3000" => Ok(Self::Ex3000),
            "ex4000" => Ok(Self::Ex4000),
            _ => Err(Error::InvalidInput(format!("Unknown cabinet kind: {s}"))),
        }
    }
}

impl fmt::Display for CabinetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hardware component types understood by the topology state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HardwareType {
    /// Cabinet (`xX`)
    #[serde(rename = "comptype_cabinet")]
    Cabinet,
    /// Cabinet PDU controller (`xXmM`)
    #[serde(rename = "comptype_cab_pdu_controller")]
    CabinetPduController,
    /// Cabinet PDU (`xXmMpP`)
    #[serde(rename = "comptype_cab_pdu")]
    CabinetPdu,
    /// Coolant distribution unit (`dD`)
    #[serde(rename = "comptype_cdu")]
    Cdu,
    /// CDU management switch (`dDwW`)
    #[serde(rename = "comptype_cdu_mgmt_switch")]
    CduMgmtSwitch,
    /// Chassis (`xXcC`)
    #[serde(rename = "comptype_chassis")]
    Chassis,
    /// Chassis BMC (`xXcCbB`)
    #[serde(rename = "comptype_chassis_bmc")]
    ChassisBmc,
    /// Compute blade slot (`xXcCsS`)
    #[serde(rename = "comptype_compmod")]
    ComputeModule,
    /// Node BMC (`xXcCsSbB`)
    #[serde(rename = "comptype_ncard")]
    NodeBmc,
    /// Node (`xXcCsSbBnN`)
    #[serde(rename = "comptype_node")]
    Node,
    /// Management (leaf-BMC) switch (`xXcCwW`)
    #[serde(rename = "comptype_mgmt_switch")]
    MgmtSwitch,
    /// Management switch port (`xXcCwWjJ`)
    #[serde(rename = "comptype_mgmt_switch_connector")]
    MgmtSwitchConnector,
    /// High-level switch enclosure (`xXcChH`)
    #[serde(rename = "comptype_hl_switch_enclosure")]
    MgmtHlSwitchEnclosure,
    /// High-level management switch (`xXcChHsS`)
    #[serde(rename = "comptype_hl_switch")]
    MgmtHlSwitch,
}

impl HardwareType {
    /// Returns the component type name as used in topology records.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cabinet => "comptype_cabinet",
            Self::CabinetPduController => "comptype_cab_pdu_controller",
            Self::CabinetPdu => "comptype_cab_pdu",
            Self::Cdu => "comptype_cdu",
            Self::CduMgmtSwitch => "comptype_cdu_mgmt_switch",
            Self::Chassis => "comptype_chassis",
            Self::ChassisBmc => "comptype_chassis_bmc",
            Self::ComputeModule => "comptype_compmod",
            Self::NodeBmc => "comptype_ncard",
            Self::Node => "comptype_node",
            Self::MgmtSwitch => "comptype_mgmt_switch",
            Self::MgmtSwitchConnector => "comptype_mgmt_switch_connector",
            Self::MgmtHlSwitchEnclosure => "comptype_hl_switch_enclosure",
            Self::MgmtHlSwitch => "comptype_hl_switch",
        }
    }

    /// Returns the human-facing type string.
    #[must_use]
    pub const fn type_string(&self) -> &'static str {
        match self {
            Self::Cabinet => "Cabinet",
            Self::CabinetPduController => "CabinetPDUController",
            Self::CabinetPdu => "CabinetPDU",
            Self::Cdu => "CDU",
            Self::CduMgmtSwitch => "CDUMgmtSwitch",
            Self::Chassis => "Chassis",
            Self::ChassisBmc => "ChassisBMC",
            Self::ComputeModule => "ComputeModule",
            Self::NodeBmc => "NodeBMC",
            Self::Node => "Node",
            Self::MgmtSwitch => "MgmtSwitch",
            Self::MgmtSwitchConnector => "MgmtSwitchConnector",
            Self::MgmtHlSwitchEnclosure => "MgmtHLSwitchEnclosure",
            Self::MgmtHlSwitch => "MgmtHLSwitch",
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Management switch role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SwitchType {
    /// Spine switch
    Spine,
    /// Leaf switch
    Leaf,
    /// Leaf switch serving BMC ports
    LeafBmc,
    /// Aggregation switch
    Aggregation,
    /// Switch serving a coolant distribution unit
    Cdu,
}

impl SwitchType {
    /// Returns the hostname prefix used for switches of this type.
    #[must_use]
    pub const fn name_prefix(&self) -> &'static str {
        match self {
            Self::Spine => "sw-spine",
            Self::Leaf => "sw-leaf",
            Self::LeafBmc => "sw-leaf-bmc",
            Self::Aggregation => "sw-agg",
            Self::Cdu => "sw-cdu",
        }
    }

    /// Returns all switch types, longest name prefix first.
    ///
    /// Prefix scans must use this order so that `sw-leaf-bmc-001` is not read
    /// as a leaf switch.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LeafBmc,
            Self::Spine,
            Self::Leaf,
            Self::Aggregation,
            Self::Cdu,
        ]
    }
}

impl FromStr for SwitchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "spine" => Ok(Self::Spine),
            "leaf" => Ok(Self::Leaf),
            "leafbmc" => Ok(Self::LeafBmc),
            "aggregation" | "agg" => Ok(Self::Aggregation),
            "cdu" => Ok(Self::Cdu),
            _ => Err(Error::InvalidSwitch(format!("Unknown switch type: {s}"))),
        }
    }
}

impl fmt::Display for SwitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spine => "Spine",
            Self::Leaf => "Leaf",
            Self::LeafBmc => "LeafBMC",
            Self::Aggregation => "Aggregation",
            Self::Cdu => "CDU",
        };
        f.write_str(name)
    }
}

/// Node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Management (NCN) node
    Management,
    /// Compute node
    Compute,
    /// User-facing application node
    Application,
}

impl FromStr for NodeRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "management" => Ok(Self::Management),
            "compute" => Ok(Self::Compute),
            "application" => Ok(Self::Application),
            _ => Err(Error::InvalidInput(format!("Unknown node role: {s}"))),
        }
    }
}

/// Node sub-role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeSubRole {
    /// Kubernetes control plane
    Master,
    /// Kubernetes worker
    Worker,
    /// Storage node
    Storage,
    /// User access node
    #[serde(rename = "UAN")]
    Uan,
}

impl NodeSubRole {
    /// Single-letter code used in management node hostnames.
    #[must_use]
    pub const fn hostname_letter(&self) -> Option<char> {
        match self {
            Self::Master => Some('m'),
            Self::Worker => Some('w'),
            Self::Storage => Some('s'),
            Self::Uan => None,
        }
    }
}

impl FromStr for NodeSubRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "worker" => Ok(Self::Worker),
            "storage" => Ok(Self::Storage),
            "uan" => Ok(Self::Uan),
            _ => Err(Error::InvalidInput(format!("Unknown node sub-role: {s}"))),
        }
    }
}

impl fmt::Display for NodeSubRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Master => "Master",
            Self::Worker => "Worker",
            Self::Storage => "Storage",
            Self::Uan => "UAN",
        };
        f.write_str(name)
    }
}

/// Logical network names.
pub mod network_names {
    /// Hardware management network
    pub const HMN: &str = "HMN";
    /// Node management network
    pub const NMN: &str = "NMN";
    /// Customer management network
    pub const CMN: &str = "CMN";
    /// Customer access network
    pub const CAN: &str = "CAN";
    /// Customer high-speed network
    pub const CHN: &str = "CHN";
    /// Provisioning (metal) network
    pub const MTL: &str = "MTL";
    /// High-speed network
    pub const HSN: &str = "HSN";
    /// Node management load-balancer network
    pub const NMNLB: &str = "NMNLB";
    /// Hardware management load-balancer network
    pub const HMNLB: &str = "HMNLB";
    /// River cabinet hardware management network
    pub const HMN_RVR: &str = "HMN_RVR";
    /// River cabinet node management network
    pub const NMN_RVR: &str = "NMN_RVR";
    /// Mountain/Hill cabinet hardware management network
    pub const HMN_MTN: &str = "HMN_MTN";
    /// Mountain/Hill cabinet node management network
    pub const NMN_MTN: &str = "NMN_MTN";

    /// Every network name the compiler knows, in compilation order.
    pub const ALL: &[&str] = &[
        HMN, NMN, CMN, CAN, CHN, MTL, HSN, NMNLB, HMNLB, HMN_RVR, NMN_RVR, HMN_MTN, NMN_MTN,
    ];

    /// Strips a cabinet-class suffix, e.g. `HMN_MTN` becomes `HMN`.
    #[must_use]
    pub fn base_name(name: &str) -> &str {
        name.strip_suffix("_MTN")
            .or_else(|| name.strip_suffix("_RVR"))
            .unwrap_or(name)
    }
}

/// User-facing network that accompanies CMN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserNetwork {
    /// Customer access over the management fabric
    #[default]
    #[serde(rename = "CAN")]
    Can,
    /// Customer access over the high-speed fabric
    #[serde(rename = "CHN")]
    Chn,
}

impl UserNetwork {
    /// Name of the network this selection compiles.
    #[must_use]
    pub const fn network_name(&self) -> &'static str {
        match self {
            Self::Can => network_names::CAN,
            Self::Chn => network_names::CHN,
        }
    }
}
