//! Network templates and compilation.
//!
//! Each logical network starts from a built-in template, takes the operator's
//! overrides from [`RunConfig`], and is then populated with its subnets:
//! load-balancer pools, a network-hardware subnet sized to the switch
//! population, a bootstrap subnet sized to the management nodes, the UAI
//! subnet, pinned service addresses, or one subnet per cabinet.

use crate::cabinets::{CabinetDetail, ResolvedCabinets};
use crate::ncn::LogicalNcn;
use crate::switches::ManagementSwitch;
use csi_core::config::NetworkOverride;
use csi_core::types::{network_names, CabinetClass};
use csi_core::{Error, Result, RunConfig, MAX_VLAN};
use csi_ipam::{cidr, Network, NetworkType, Subnet};
use ipnet::Ipv4Net;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

/// Subnet holding switch management addresses.
pub const NETWORK_HARDWARE: &str = "network_hardware";
/// Subnet holding management node addresses and the DHCP pool.
pub const BOOTSTRAP_DHCP: &str = "bootstrap_dhcp";
/// Fixed-size subnet for user access instances.
pub const UAI_MACVLAN: &str = "uai_macvlan";
/// Single subnet of the high-speed network.
pub const HSN_BASE_SUBNET: &str = "hsn_base_subnet";

/// Prefix length of the UAI subnet.
const UAI_PREFIX: u8 = 23;

/// Default MTU of every network.
const DEFAULT_MTU: u32 = 9000;

/// Fixed reservations of the UAI subnet.
const UAI_RESERVATIONS: &[&str] = &[
    "uai_macvlan_bridge",
    "slurmctld_service",
    "slurmdbd_service",
    "pbs_service",
    "pbs_comm_service",
];

/// Load-balancer services pinned at a fixed offset, with their aliases.
type ServicePin = (&'static str, &'static str, u32);

const NMNLB_PINS: &[ServicePin] = &[
    ("cray-tftp", "tftp-service-nmn.local", 60),
    (
        "istio-ingressgateway",
        "api-gw-service,api-gw-service-nmn.local,packages,registry,spire.local",
        71,
    ),
    ("rsyslog-aggregator", "rsyslog-agg-service-nmn.local", 72),
    ("docker-registry", "docker_registry_service", 73),
    ("unbound", "unbound", 225),
];

const HMNLB_PINS: &[ServicePin] = &[
    ("cray-tftp", "tftp-service-hmn.local", 60),
    ("istio-ingressgateway", "api-gw-service-hmn.local", 71),
    ("rsyslog-aggregator", "rsyslog-agg-service-hmn.local", 72),
    ("hms-collector", "hms-collector-hmn.local", 74),
    ("unbound", "unbound-hmn", 225),
];

/// Which switches get an address on a network-hardware subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchScope {
    /// Every management switch
    All,
    /// Spine and leaf switches only
    SpineLeaf,
}

/// Which identifier owns a management node's bootstrap reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOwner {
    /// The node's BMC
    Bmc,
    /// The node itself
    Node,
}

/// Which per-cabinet fields a cabinet network honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CabinetNetworkKind {
    /// `hmn_subnet` / `hmn_vlan`
    Hmn,
    /// `nmn_subnet` / `nmn_vlan`
    Nmn,
}

impl CabinetNetworkKind {
    fn fixed(self, cabinet: &CabinetDetail) -> (Option<Ipv4Net>, Option<u16>) {
        match self {
            Self::Hmn => (cabinet.hmn_subnet, cabinet.hmn_vlan),
            Self::Nmn => (cabinet.nmn_subnet, cabinet.nmn_vlan),
        }
    }
}

/// Subnet composition of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Infrastructure network with optional pools, hardware and bootstrap
    /// subnets
    Infrastructure {
        /// Switches on the network-hardware subnet, if there is one
        switches: Option<SwitchScope>,
        /// Owner of bootstrap reservations, if there is a bootstrap subnet
        bootstrap: Option<BootstrapOwner>,
        /// Virtual service names reserved first in the bootstrap subnet
        services: &'static [&'static str],
        /// Add the UAI subnet
        uai: bool,
        /// Eligible for supernet compatibility mode
        supernet: bool,
    },
    /// One subnet spanning the network
    HighSpeed,
    /// One pool spanning the network with pinned service addresses
    LoadBalancer {
        /// Services pinned inside the pool
        pins: &'static [ServicePin],
    },
    /// One subnet per cabinet of the given classes
    PerCabinet {
        /// Cabinet classes served
        classes: &'static [CabinetClass],
        /// Per-cabinet fields honoured
        kind: CabinetNetworkKind,
    },
}

/// Built-in defaults of one network.
#[derive(Debug, Clone, Copy)]
struct Defaults {
    name: &'static str,
    full_name: &'static str,
    cidr: ([u8; 4], u8),
    vlan_range: (u16, u16),
    network_type: NetworkType,
    static_pool: Option<([u8; 4], u8)>,
    dynamic_pool: Option<([u8; 4], u8)>,
    layout: Layout,
}

const fn infrastructure(
    switches: Option<SwitchScope>,
    bootstrap: Option<BootstrapOwner>,
    services: &'static [&'static str],
    supernet: bool,
) -> Layout {
    Layout::Infrastructure {
        switches,
        bootstrap,
        services,
        uai: false,
        supernet,
    }
}

const CATALOGUE: &[Defaults] = &[
    Defaults {
        name: network_names::HMN,
        full_name: "Hardware Management Network",
        cidr: ([10, 254, 0, 0], 17),
        vlan_range: (4, 4),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: infrastructure(Some(SwitchScope::All), Some(BootstrapOwner::Bmc), &[], true),
    },
    Defaults {
        name: network_names::NMN,
        full_name: "Node Management Network",
        cidr: ([10, 252, 0, 0], 17),
        vlan_range: (2, 2),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::Infrastructure {
            switches: Some(SwitchScope::All),
            bootstrap: Some(BootstrapOwner::Node),
            services: &["kubeapi-vip", "rgw-vip"],
            uai: true,
            supernet: true,
        },
    },
    Defaults {
        name: network_names::CMN,
        full_name: "Customer Management Network",
        cidr: ([10, 103, 6, 0], 24),
        vlan_range: (7, 7),
        network_type: NetworkType::Ethernet,
        static_pool: Some(([10, 103, 6, 112], 28)),
        dynamic_pool: Some(([10, 103, 6, 128], 25)),
        layout: infrastructure(
            Some(SwitchScope::SpineLeaf),
            Some(BootstrapOwner::Node),
            &["kubeapi-vip"],
            true,
        ),
    },
    Defaults {
        name: network_names::CAN,
        full_name: "Customer Access Network",
        cidr: ([10, 102, 11, 0], 24),
        vlan_range: (6, 6),
        network_type: NetworkType::Ethernet,
        static_pool: Some(([10, 102, 11, 112], 28)),
        dynamic_pool: Some(([10, 102, 11, 128], 25)),
        layout: infrastructure(None, Some(BootstrapOwner::Node), &[], true),
    },
    Defaults {
        name: network_names::CHN,
        full_name: "Customer High-Speed Network",
        cidr: ([10, 103, 9, 0], 24),
        vlan_range: (5, 5),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: Some(([10, 103, 9, 128], 25)),
        layout: infrastructure(None, Some(BootstrapOwner::Node), &[], false),
    },
    Defaults {
        name: network_names::MTL,
        full_name: "Provisioning Network (untagged)",
        cidr: ([10, 1, 0, 0], 16),
        vlan_range: (0, 0),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: infrastructure(Some(SwitchScope::All), Some(BootstrapOwner::Node), &[], true),
    },
    Defaults {
        name: network_names::HSN,
        full_name: "High Speed Network",
        cidr: ([10, 253, 0, 0], 16),
        vlan_range: (613, 617),
        network_type: NetworkType::Slingshot10,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::HighSpeed,
    },
    Defaults {
        name: network_names::NMNLB,
        full_name: "Node Management Network LoadBalancers",
        cidr: ([10, 92, 100, 0], 24),
        vlan_range: (2, 2),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::LoadBalancer { pins: NMNLB_PINS },
    },
    Defaults {
        name: network_names::HMNLB,
        full_name: "Hardware Management Network LoadBalancers",
        cidr: ([10, 94, 100, 0], 24),
        vlan_range: (4, 4),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::LoadBalancer { pins: HMNLB_PINS },
    },
    Defaults {
        name: network_names::HMN_RVR,
        full_name: "River Compute Hardware Management Network",
        cidr: ([10, 107, 0, 0], 17),
        vlan_range: (1513, 1769),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::PerCabinet {
            classes: &[CabinetClass::River],
            kind: CabinetNetworkKind::Hmn,
        },
    },
    Defaults {
        name: network_names::NMN_RVR,
        full_name: "River Compute Node Management Network",
        cidr: ([10, 106, 0, 0], 17),
        vlan_range: (1770, 1999),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::PerCabinet {
            classes: &[CabinetClass::River],
            kind: CabinetNetworkKind::Nmn,
        },
    },
    Defaults {
        name: network_names::HMN_MTN,
        full_name: "Mountain Compute Hardware Management Network",
        cidr: ([10, 104, 0, 0], 17),
        vlan_range: (3000, 3999),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::PerCabinet {
            classes: &[CabinetClass::Hill, CabinetClass::Mountain],
            kind: CabinetNetworkKind::Hmn,
        },
    },
    Defaults {
        name: network_names::NMN_MTN,
        full_name: "Mountain Compute Node Management Network",
        cidr: ([10, 100, 0, 0], 17),
        vlan_range: (2000, 2999),
        network_type: NetworkType::Ethernet,
        static_pool: None,
        dynamic_pool: None,
        layout: Layout::PerCabinet {
            classes: &[CabinetClass::Hill, CabinetClass::Mountain],
            kind: CabinetNetworkKind::Nmn,
        },
    },
];

/// A network's template with overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTemplate {
    /// Network name
    pub name: &'static str,
    /// Descriptive name
    pub full_name: &'static str,
    /// Network CIDR
    pub cidr: Ipv4Net,
    /// VLAN range; infrastructure subnets use the low end
    pub vlan_range: (u16, u16),
    /// MTU
    pub mtu: u32,
    /// Link-layer family
    pub network_type: NetworkType,
    /// Load-balancer static pool
    pub static_pool: Option<Ipv4Net>,
    /// Load-balancer dynamic pool
    pub dynamic_pool: Option<Ipv4Net>,
    /// Headroom override for sized subnets
    pub headroom: Option<u32>,
    /// Subnet composition
    pub layout: Layout,
}

impl NetworkTemplate {
    /// Template for `name` with the configured overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown network,
    /// [`Error::InvalidAddress`] for an override CIDR with host bits set and
    /// [`Error::InvalidInput`] when a VLAN override pushes the range past
    /// [`MAX_VLAN`].
    pub fn for_network(name: &str, config: &RunConfig) -> Result<Self> {
        let defaults = CATALOGUE
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(format!("network template {name}")))?;
        let overrides = config.network_override(name).cloned().unwrap_or_default();
        Self::from_defaults(defaults, &overrides)
    }

    fn from_defaults(defaults: &Defaults, overrides: &NetworkOverride) -> Result<Self> {
        let cidr = match overrides.cidr {
            Some(cidr) => cidr::require_network_address(cidr)?,
            None => block(defaults.cidr)?,
        };

        let vlan_range = match (overrides.vlan_range, overrides.vlan) {
            (Some(range), _) => range,
            (None, Some(vlan)) => {
                let width = defaults.vlan_range.1 - defaults.vlan_range.0;
                (vlan, vlan.saturating_add(width))
            }
            (None, None) => defaults.vlan_range,
        };
        if vlan_range.1 > MAX_VLAN {
            return Err(Error::InvalidInput(format!(
                "network {}: VLAN range {}-{} ends above {MAX_VLAN}",
                defaults.name, vlan_range.0, vlan_range.1
            )));
        }

        let (static_pool, dynamic_pool) = match defaults.layout {
            // A CIDR override drops the default pools.
            Layout::Infrastructure { .. } if overrides.cidr.is_some() => {
                (overrides.static_pool, overrides.dynamic_pool)
            }
            _ => (
                overrides.static_pool.or(defaults.static_pool.map(block).transpose()?),
                overrides.dynamic_pool.or(defaults.dynamic_pool.map(block).transpose()?),
            ),
        };

        Ok(Self {
            name: defaults.name,
            full_name: defaults.full_name,
            cidr,
            vlan_range,
            mtu: overrides.mtu.unwrap_or(DEFAULT_MTU),
            network_type: defaults.network_type,
            static_pool,
            dynamic_pool,
            headroom: overrides.headroom,
            layout: defaults.layout,
        })
    }

    /// VLAN of infrastructure subnets.
    #[must_use]
    pub const fn vlan(&self) -> u16 {
        self.vlan_range.0
    }
}

/// Everything network compilation needs besides the configuration.
#[derive(Debug, Clone, Copy)]
pub struct NetworkInputs<'a> {
    /// Resolved cabinets
    pub cabinets: &'a ResolvedCabinets,
    /// Classified switches
    pub switches: &'a [ManagementSwitch],
    /// Management nodes
    pub ncns: &'a [LogicalNcn],
}

/// Names of the networks to compile, in compilation order.
#[must_use]
pub fn network_order(config: &RunConfig, cabinets: &ResolvedCabinets) -> Vec<&'static str> {
    let mut order = vec![
        network_names::HMN,
        network_names::NMN,
        network_names::CMN,
        config.user_network.network_name(),
        network_names::MTL,
        network_names::HSN,
        network_names::NMNLB,
        network_names::HMNLB,
    ];

    if cabinets.count_by_class(CabinetClass::River) > 0 {
        order.extend([network_names::HMN_RVR, network_names::NMN_RVR]);
    }
    if cabinets.count_by_class(CabinetClass::Mountain) + cabinets.count_by_class(CabinetClass::Hill)
        > 0
    {
        order.extend([network_names::HMN_MTN, network_names::NMN_MTN]);
    }

    order.retain(|name| {
        let subdivide = config
            .network_override(name)
            .and_then(|o| o.subdivide_by_cabinet);
        if subdivide == Some(false) && is_cabinet_network(name) {
            info!(network = name, "per-cabinet subdivision disabled; skipping network");
            return false;
        }
        true
    });
    order
}

/// Compiles every network.
///
/// # Errors
///
/// Returns [`Error::Capacity`] when a network runs out of blocks, VLANs or
/// addresses, [`Error::ReservationConflict`] for colliding pools, subnets or
/// network CIDRs, and [`Error::InvalidCabinet`] for a cabinet VLAN outside
/// its network's range.
pub fn compile_networks(
    config: &RunConfig,
    inputs: &NetworkInputs<'_>,
) -> Result<BTreeMap<String, Network>> {
    let order = network_order(config, inputs.cabinets);
    for (name, overrides) in &config.networks {
        if !order.contains(&name.as_str()) {
            debug!(network = %name, ?overrides, "override for a network that is not compiled");
        }
        if overrides.subdivide_by_cabinet.is_some() && !is_cabinet_network(name) {
            warn!(network = %name, "subdivide_by_cabinet only applies to cabinet networks");
        }
    }

    let mut networks = BTreeMap::new();
    for name in order {
        let template = NetworkTemplate::for_network(name, config)?;
        let network = compile_network(&template, config, inputs)?;
        info!(
            network = name,
            cidr = %network.cidr,
            subnets = network.subnets.len(),
            "compiled network"
        );
        networks.insert(name.to_string(), network);
    }

    check_disjoint(&networks)?;
    Ok(networks)
}

/// Compiles one network from its template.
///
/// # Errors
///
/// See [`compile_networks`].
pub fn compile_network(
    template: &NetworkTemplate,
    config: &RunConfig,
    inputs: &NetworkInputs<'_>,
) -> Result<Network> {
    let mut network = Network::new(
        template.name,
        template.full_name,
        template.cidr,
        template.vlan_range,
        template.mtu,
        template.network_type,
    )?;

    match template.layout {
        Layout::Infrastructure {
            switches,
            bootstrap,
            services,
            uai,
            supernet,
        } => {
            let supernet = supernet && config.supernet_hack;
            place_pools(&mut network, template)?;
            if let Some(scope) = switches {
                add_network_hardware(&mut network, template, config, inputs.switches, scope, supernet)?;
            }
            if let Some(owner) = bootstrap {
                add_bootstrap(&mut network, template, config, inputs.ncns, owner, services, supernet)?;
            }
            if uai {
                add_uai(&mut network, template, config)?;
            }
        }
        Layout::HighSpeed => {
            let prefix = network.cidr.prefix_len();
            network
                .add_subnet(prefix, HSN_BASE_SUBNET, template.vlan())?
                .full_name = format!("{} Base Subnet", template.name);
        }
        Layout::LoadBalancer { pins } => {
            let prefix = network.cidr.prefix_len();
            let pool = format!("{}_metallb_address_pool", template.name.to_lowercase());
            let subnet = network.add_subnet(prefix, pool, template.vlan())?;
            subnet.full_name = format!("{} MetalLB", template.name);
            for (service, aliases, offset) in pins {
                subnet.add_reservation_with_pin(*service, aliases, *offset)?;
            }
        }
        Layout::PerCabinet { classes, kind } => {
            let cabinets = inputs.cabinets.of_classes(classes);
            add_cabinet_subnets(&mut network, config, &cabinets, kind)?;
        }
    }

    Ok(network)
}

fn place_pools(network: &mut Network, template: &NetworkTemplate) -> Result<()> {
    let lower = template.name.to_lowercase();
    let mut pools: Vec<(Ipv4Net, String, &str)> = Vec::new();
    if let Some(pool) = template.static_pool {
        pools.push((pool, format!("{lower}_metallb_static_pool"), "Static Pool MetalLB"));
    }
    if let Some(pool) = template.dynamic_pool {
        pools.push((pool, format!("{lower}_metallb_address_pool"), "Dynamic MetalLB"));
    }
    pools.sort_by_key(|(pool, _, _)| *pool);

    if let [(earlier, earlier_name, _), (later, later_name, _)] = pools.as_slice() {
        if earlier.broadcast() >= later.network() {
            return Err(Error::ReservationConflict(format!(
                "network {}: {earlier_name} ({earlier}) overlaps {later_name} ({later})",
                template.name
            )));
        }
    }

    for (pool, name, label) in pools {
        network
            .add_subnet_with_cidr(pool, name, template.vlan())?
            .full_name = format!("{} {label}", template.name);
    }
    Ok(())
}

fn add_network_hardware(
    network: &mut Network,
    template: &NetworkTemplate,
    config: &RunConfig,
    switches: &[ManagementSwitch],
    scope: SwitchScope,
    supernet: bool,
) -> Result<()> {
    let members: Vec<&ManagementSwitch> = switches
        .iter()
        .filter(|s| scope == SwitchScope::All || s.is_spine_or_leaf())
        .collect();
    let headroom = template.headroom.unwrap_or(config.switch_headroom);
    let members_len = u32::try_from(members.len()).unwrap_or(u32::MAX);
    let hosts = members_len.saturating_add(headroom);

    let subnet = add_sized_subnet(network, NETWORK_HARDWARE, template.vlan(), hosts, members_len)?;
    subnet.full_name = format!("{} Management Network Infrastructure", template.name);
    if supernet {
        subnet.apply_supernet(template.cidr)?;
    }
    for switch in members {
        subnet.add_reservation(switch.name.clone(), switch.xname.as_str())?;
    }
    Ok(())
}

fn add_bootstrap(
    network: &mut Network,
    template: &NetworkTemplate,
    config: &RunConfig,
    ncns: &[LogicalNcn],
    owner: BootstrapOwner,
    services: &[&str],
    supernet: bool,
) -> Result<()> {
    let lower = template.name.to_lowercase();
    let headroom = template.headroom.unwrap_or(config.ncn_headroom);
    let reserved = u32::try_from(ncns.len() + services.len()).unwrap_or(u32::MAX);
    // The block must reach past the DHCP base offset.
    let hosts = reserved
        .saturating_add(headroom)
        .max(config.dhcp_base_offset);
    let minimum = reserved.max(config.dhcp_base_offset).saturating_add(1);

    let subnet = add_sized_subnet(network, BOOTSTRAP_DHCP, template.vlan(), hosts, minimum)?;
    subnet.full_name = format!("{} Bootstrap DHCP Subnet", template.name);
    for service in services {
        reserve_service(subnet, service, &lower)?;
    }
    for ncn in ncns {
        let xname = match owner {
            BootstrapOwner::Bmc => &ncn.bmc_xname,
            BootstrapOwner::Node => &ncn.xname,
        };
        subnet.add_reservation(xname.to_string(), xname.as_str())?;
    }

    network.update_dhcp_range(BOOTSTRAP_DHCP, supernet, config.dhcp_base_offset)
}

fn add_uai(network: &mut Network, template: &NetworkTemplate, config: &RunConfig) -> Result<()> {
    let subnet = network.add_subnet(UAI_PREFIX, UAI_MACVLAN, template.vlan())?;
    subnet.full_name = format!("{} UAIs", template.name);
    for name in UAI_RESERVATIONS {
        subnet.add_reservation(*name, "")?;
    }
    subnet.update_dhcp_range(None, config.dhcp_base_offset)
}

fn add_cabinet_subnets(
    network: &mut Network,
    config: &RunConfig,
    cabinets: &[&CabinetDetail],
    kind: CabinetNetworkKind,
) -> Result<()> {
    let (low, high) = network.vlan_range;
    let mut used: BTreeSet<u16> = BTreeSet::new();

    for cabinet in cabinets {
        if let (_, Some(vlan)) = kind.fixed(cabinet) {
            if !(low..=high).contains(&vlan) {
                return Err(Error::InvalidCabinet(format!(
                    "cabinet {}: VLAN {vlan} is outside {} range {low}-{high}",
                    cabinet.id, network.name
                )));
            }
            if !used.insert(vlan) {
                return Err(Error::ReservationConflict(format!(
                    "cabinet {}: VLAN {vlan} is already used in {}",
                    cabinet.id, network.name
                )));
            }
        }
    }

    let mut plan = Vec::with_capacity(cabinets.len());
    let mut candidates = low..=high;
    for cabinet in cabinets {
        let (fixed_cidr, fixed_vlan) = kind.fixed(cabinet);
        let vlan = match fixed_vlan {
            Some(vlan) => vlan,
            None => candidates
                .by_ref()
                .find(|v| used.insert(*v))
                .ok_or_else(|| {
                    Error::Capacity(format!(
                        "cabinet {}: no free VLAN left in {} range {low}-{high}",
                        cabinet.id, network.name
                    ))
                })?,
        };
        plan.push((cabinet, fixed_cidr, vlan));
    }

    // Fixed blocks first so generated ones flow around them.
    for (cabinet, fixed_cidr, vlan) in &plan {
        if let Some(block) = fixed_cidr {
            network.add_subnet_with_cidr(*block, cabinet_subnet_name(cabinet.id), *vlan)?;
        }
    }
    let network_name = network.name.clone();
    for (cabinet, fixed_cidr, vlan) in &plan {
        if fixed_cidr.is_some() {
            continue;
        }
        let name = cabinet_subnet_name(cabinet.id);
        if let Err(err) = network.add_subnet(config.cabinet_subnet_prefix, name, *vlan) {
            return Err(match err {
                Error::Capacity(_) => Error::Capacity(format!(
                    "cabinet {}: {network_name} has no free /{} block left for {} cabinets",
                    cabinet.id,
                    config.cabinet_subnet_prefix,
                    plan.len()
                )),
                other => other,
            });
        }
    }

    for subnet in &mut network.subnets {
        let id = subnet.name.trim_start_matches("cabinet_");
        subnet.full_name = format!("{} Cabinet {id}", network.name);
        subnet.update_dhcp_range(None, config.dhcp_base_offset)?;
    }
    network.subnets.sort_by_key(|s| s.cidr);
    debug!(network = %network.name, cabinets = plan.len(), "allocated cabinet subnets");
    Ok(())
}

fn is_cabinet_network(name: &str) -> bool {
    network_names::base_name(name) != name
}

/// Subnet name of a cabinet.
#[must_use]
pub fn cabinet_subnet_name(id: u32) -> String {
    format!("cabinet_{id}")
}

fn reserve_service(subnet: &mut Subnet, service: &str, network: &str) -> Result<()> {
    subnet.add_reservation(service, "")?;
    if let Some(reservation) = subnet.reservations.last_mut() {
        reservation.aliases.push(format!("{service}.{network}"));
    }
    Ok(())
}

/// Allocates a block for `hosts` addresses, giving up headroom down to
/// `minimum` addresses when the network has no block that large left.
fn add_sized_subnet<'n>(
    network: &'n mut Network,
    name: &str,
    vlan: u16,
    hosts: u32,
    minimum: u32,
) -> Result<&'n mut Subnet> {
    let wanted = sized_prefix(network, name, hosts)?;
    let smallest = cidr::prefix_for_hosts(minimum)?.max(wanted);

    let mut chosen = None;
    for prefix in wanted..=smallest {
        if !network.free_blocks(prefix)?.is_empty() {
            chosen = Some(prefix);
            break;
        }
    }
    let prefix = chosen.ok_or_else(|| {
        Error::Capacity(format!(
            "network {} ({}) has no free block for {name} ({minimum} addresses)",
            network.name, network.cidr
        ))
    })?;
    if prefix != wanted {
        warn!(network = %network.name, subnet = name, wanted, prefix, "trimmed headroom to fit");
    }
    network.add_subnet(prefix, name, vlan)
}

fn sized_prefix(network: &Network, subnet: &str, hosts: u32) -> Result<u8> {
    let prefix = cidr::prefix_for_hosts(hosts)?;
    if prefix < network.cidr.prefix_len() {
        return Err(Error::Capacity(format!(
            "{subnet} needs {hosts} addresses but network {} is only a /{}",
            network.name,
            network.cidr.prefix_len()
        )));
    }
    Ok(prefix)
}

fn block((octets, prefix): ([u8; 4], u8)) -> Result<Ipv4Net> {
    Ok(Ipv4Net::new(Ipv4Addr::from(octets), prefix)?)
}

fn check_disjoint(networks: &BTreeMap<String, Network>) -> Result<()> {
    let all: Vec<&Network> = networks.values().collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if cidr::overlaps(a.cidr, b.cidr) {
                return Err(Error::ReservationConflict(format!(
                    "network {} ({}) overlaps network {} ({})",
                    a.name, a.cidr, b.name, b.cidr
                )));
            }
        }
    }
    Ok(())
}
