//! Run configuration for a site-init compilation.
//!
//! A [`RunConfig`] is built and validated once at the start of a run and then
//! passed by reference to every stage. Nothing in the pipeline mutates it.

use crate::types::{network_names, UserNetwork};
use crate::Error;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Highest VLAN ID a network may use (802.1Q reserves 4095).
pub const MAX_VLAN: u16 = 4094;

/// Configuration for one compilation run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunConfig {
    /// Short system name recorded in logs and diagnostics
    #[validate(length(min = 1, max = 64))]
    pub system_name: String,

    /// Reuse the parent network's gateway and mask on bootstrap and
    /// network-hardware subnets
    #[serde(default = "default_supernet_hack")]
    pub supernet_hack: bool,

    /// Prefix length of per-cabinet subnets
    #[validate(range(min = 16, max = 28))]
    #[serde(default = "default_cabinet_subnet_prefix")]
    pub cabinet_subnet_prefix: u8,

    /// Offset of the first dynamic address from the subnet base
    #[validate(range(min = 2, max = 128))]
    #[serde(default = "default_dhcp_base_offset")]
    pub dhcp_base_offset: u32,

    /// Spare addresses added to every network-hardware subnet
    #[validate(range(min = 1, max = 4096))]
    #[serde(default = "default_switch_headroom")]
    pub switch_headroom: u32,

    /// Spare addresses added to every bootstrap subnet
    #[validate(range(min = 1, max = 4096))]
    #[serde(default = "default_ncn_headroom")]
    pub ncn_headroom: u32,

    /// Which user network accompanies CMN
    #[serde(default)]
    pub user_network: UserNetwork,

    /// Per-network overrides keyed by network name
    #[validate(custom(function = "validate_network_overrides"))]
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkOverride>,
}

const fn default_supernet_hack() -> bool {
    true
}

const fn default_cabinet_subnet_prefix() -> u8 {
    22
}

const fn default_dhcp_base_offset() -> u32 {
    10
}

const fn default_switch_headroom() -> u32 {
    10
}

const fn default_ncn_headroom() -> u32 {
    20
}

impl RunConfig {
    /// Create a new run configuration with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(system_name: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            system_name: system_name.into(),
            supernet_hack: default_supernet_hack(),
            cabinet_subnet_prefix: default_cabinet_subnet_prefix(),
            dhcp_base_offset: default_dhcp_base_offset(),
            switch_headroom: default_switch_headroom(),
            ncn_headroom: default_ncn_headroom(),
            user_network: UserNetwork::default(),
            networks: BTreeMap::new(),
        };

        config.check()?;
        Ok(config)
    }

    /// Validate the configuration, mapping failures to [`Error::ConfigError`].
    ///
    /// # Errors
    ///
    /// Returns an error naming every invalid field.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Set whether supernet compatibility mode is applied.
    #[must_use]
    pub const fn with_supernet_hack(mut self, enabled: bool) -> Self {
        self.supernet_hack = enabled;
        self
    }

    /// Set the per-cabinet subnet prefix length.
    #[must_use]
    pub const fn with_cabinet_subnet_prefix(mut self, prefix: u8) -> Self {
        self.cabinet_subnet_prefix = prefix;
        self
    }

    /// Set the DHCP base offset.
    #[must_use]
    pub const fn with_dhcp_base_offset(mut self, offset: u32) -> Self {
        self.dhcp_base_offset = offset;
        self
    }

    /// Set the network-hardware headroom.
    #[must_use]
    pub const fn with_switch_headroom(mut self, headroom: u32) -> Self {
        self.switch_headroom = headroom;
        self
    }

    /// Set the bootstrap headroom.
    #[must_use]
    pub const fn with_ncn_headroom(mut self, headroom: u32) -> Self {
        self.ncn_headroom = headroom;
        self
    }

    /// Select the user network.
    #[must_use]
    pub const fn with_user_network(mut self, network: UserNetwork) -> Self {
        self.user_network = network;
        self
    }

    /// Add or replace the override for one network.
    #[must_use]
    pub fn with_network_override(
        mut self,
        name: impl Into<String>,
        overrides: NetworkOverride,
    ) -> Self {
        self.networks.insert(name.into(), overrides);
        self
    }

    /// Override for a network, if one was configured.
    #[must_use]
    pub fn network_override(&self, name: &str) -> Option<&NetworkOverride> {
        self.networks.get(name)
    }
}

/// Operator overrides for a single logical network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_vlan_range"))]
pub struct NetworkOverride {
    /// Network CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<Ipv4Net>,

    /// Base VLAN
    #[validate(range(max = 4094))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,

    /// VLAN range for per-cabinet subnets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_range: Option<(u16, u16)>,

    /// Load-balancer static pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_pool: Option<Ipv4Net>,

    /// Load-balancer dynamic pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_pool: Option<Ipv4Net>,

    /// Additional spare addresses
    #[validate(range(min = 1, max = 4096))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headroom: Option<u32>,

    /// Subdivide the network into one subnet per cabinet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivide_by_cabinet: Option<bool>,

    /// MTU
    #[validate(range(min = 1280, max = 9216))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

impl NetworkOverride {
    /// Create an empty override.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the CIDR.
    #[must_use]
    pub const fn with_cidr(mut self, cidr: Ipv4Net) -> Self {
        self.cidr = Some(cidr);
        self
    }

    /// Override the base VLAN.
    #[must_use]
    pub const fn with_vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    /// Override the per-cabinet VLAN range.
    #[must_use]
    pub const fn with_vlan_range(mut self, low: u16, high: u16) -> Self {
        self.vlan_range = Some((low, high));
        self
    }

    /// Override the load-balancer static pool.
    #[must_use]
    pub const fn with_static_pool(mut self, pool: Ipv4Net) -> Self {
        self.static_pool = Some(pool);
        self
    }

    /// Override the load-balancer dynamic pool.
    #[must_use]
    pub const fn with_dynamic_pool(mut self, pool: Ipv4Net) -> Self {
        self.dynamic_pool = Some(pool);
        self
    }

    /// Override the headroom.
    #[must_use]
    pub const fn with_headroom(mut self, headroom: u32) -> Self {
        self.headroom = Some(headroom);
        self
    }

    /// Toggle per-cabinet subdivision.
    #[must_use]
    pub const fn with_subdivide_by_cabinet(mut self, subdivide: bool) -> Self {
        self.subdivide_by_cabinet = Some(subdivide);
        self
    }
}

fn validate_vlan_range(overrides: &NetworkOverride) -> Result<(), ValidationError> {
    match overrides.vlan_range {
        Some((low, high)) if low > high || high > MAX_VLAN => {
            Err(ValidationError::new("vlan_range"))
        }
        _ => Ok(()),
    }
}

fn validate_network_overrides(
    networks: &BTreeMap<String, NetworkOverride>,
) -> Result<(), ValidationError> {
    for (name, overrides) in networks {
        if !network_names::ALL.contains(&name.as_str()) {
            let mut err = ValidationError::new("unknown_network");
            err.message = Some(format!("unknown network {name}").into());
            return Err(err);
        }
        if overrides.validate().is_err() {
            let mut err = ValidationError::new("network_override");
            err.message = Some(format!("invalid override for {name}").into());
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_new() {
        let config = RunConfig::new("sandbox").unwrap();
        assert_eq!(config.system_name, "sandbox");
        assert!(config.supernet_hack);
        assert_eq!(config.cabinet_subnet_prefix, 22);
        assert_eq!(config.dhcp_base_offset, 10);
        assert_eq!(config.user_network, UserNetwork::Can);
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_run_config_empty_name() {
        assert!(matches!(RunConfig::new(""), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("sandbox")
            .unwrap()
            .with_supernet_hack(false)
            .with_cabinet_subnet_prefix(23)
            .with_switch_headroom(4)
            .with_user_network(UserNetwork::Chn);

        assert!(!config.supernet_hack);
        assert_eq!(config.cabinet_subnet_prefix, 23);
        assert_eq!(config.switch_headroom, 4);
        assert_eq!(config.user_network, UserNetwork::Chn);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_run_config_prefix_range() {
        let mut config = RunConfig::new("sandbox").unwrap();
        config.cabinet_subnet_prefix = 30;
        assert!(config.check().is_err());

        config.cabinet_subnet_prefix = 22;
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_unknown_network_override() {
        let config = RunConfig::new("sandbox")
            .unwrap()
            .with_network_override("BOGUS", NetworkOverride::new());
        assert!(config.check().is_err());
    }

    #[test]
    fn test_network_override_vlan_range() {
        let overrides = NetworkOverride::new().with_vlan_range(3000, 2000);
        assert!(overrides.validate().is_err());

        let config = RunConfig::new("sandbox")
            .unwrap()
            .with_network_override("HMN_MTN", overrides);
        assert!(config.check().is_err());

        let overrides = NetworkOverride::new().with_vlan_range(2000, 2999);
        assert!(overrides.validate().is_ok());
    }

    #[test]
    fn test_network_override_lookup() {
        let cidr: Ipv4Net = "10.252.0.0/16".parse().unwrap();
        let config = RunConfig::new("sandbox")
            .unwrap()
            .with_network_override("NMN", NetworkOverride::new().with_cidr(cidr).with_vlan(3));

        let nmn = config.network_override("NMN").unwrap();
        assert_eq!(nmn.cidr, Some(cidr));
        assert_eq!(nmn.vlan, Some(3));
        assert!(config.network_override("HMN").is_none());
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let json = r#"{"system_name": "sandbox", "networks": {"CAN": {"cidr": "10.102.12.0/24"}}}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert!(config.supernet_hack);
        assert_eq!(config.ncn_headroom, 20);
        assert_eq!(
            config.network_override("CAN").unwrap().cidr,
            Some("10.102.12.0/24".parse().unwrap())
        );
        assert!(config.check().is_ok());
    }
}
