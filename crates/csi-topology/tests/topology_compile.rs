//! Integration tests compiling a sandbox site end to end.
//!
//! The fixtures describe one river cabinet holding the management plane, one
//! hill cabinet and twenty generated mountain cabinets.

use csi_core::types::{CabinetClass, CabinetKind, HardwareType, NodeSubRole};
use csi_core::{Error, NetworkOverride, RunConfig};
use csi_ipam::cidr;
use csi_topology::inputs::{CabinetInputs, CabinetRecord, SiteInputs};
use csi_topology::state::ExtraProperties;
use csi_topology::{compile, StaticSwitchCatalog, TopologyState};
use pretty_assertions::assert_eq;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

fn load_config() -> RunConfig {
    let json_data = load_fixture("system_config.json");
    serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize run config: {}\nJSON: {}", e, json_data))
}

fn load_inputs() -> SiteInputs {
    let json_data = load_fixture("site_inputs.json");
    serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize site inputs: {}\nJSON: {}", e, json_data))
}

fn compile_site(config: &RunConfig, inputs: &SiteInputs) -> csi_core::Result<TopologyState> {
    let catalog = StaticSwitchCatalog::from_records(&inputs.switches);
    compile(config, inputs, &catalog)
}

fn compile_fixtures() -> TopologyState {
    compile_site(&load_config(), &load_inputs())
        .unwrap_or_else(|e| panic!("Failed to compile sandbox site: {e}"))
}

#[test]
fn test_fixture_inputs_deserialize() {
    let inputs = load_inputs();
    assert_eq!(inputs.switches.len(), 6);
    assert_eq!(inputs.node_metadata.len(), 9);
    assert_eq!(inputs.cabling.len(), 14);
    assert_eq!(inputs.cabinets.explicit[&CabinetKind::River][0].id, 3000);

    let config = load_config();
    assert_eq!(config.network_override("CAN").unwrap().mtu, Some(1500));
    assert!(config.check().is_ok());
}

#[test]
fn test_cabinet_override_precedence() {
    let state = compile_fixtures();

    assert_eq!(state.count(HardwareType::Cabinet, CabinetClass::River), 1);
    assert_eq!(state.count(HardwareType::Cabinet, CabinetClass::Hill), 1);
    assert_eq!(state.count(HardwareType::Cabinet, CabinetClass::Mountain), 20);
    assert!(state.hardware.contains_key("x3000"));
    assert!(!state.hardware.contains_key("x3001"));
    assert!(state.hardware.contains_key("x9000"));
    assert!(!state.hardware.contains_key("x9100"));
    assert!(state.hardware.contains_key("x1019"));
    assert!(!state.hardware.contains_key("x1020"));
}

#[test]
fn test_chassis_population() {
    let state = compile_fixtures();

    assert_eq!(state.count(HardwareType::Chassis, CabinetClass::River), 1);
    assert_eq!(state.count(HardwareType::Chassis, CabinetClass::Hill), 2);
    assert_eq!(state.count(HardwareType::Chassis, CabinetClass::Mountain), 160);
    assert_eq!(state.count(HardwareType::ChassisBmc, CabinetClass::River), 0);
    assert_eq!(state.count(HardwareType::ChassisBmc, CabinetClass::Hill), 2);
    assert!(state.hardware.contains_key("x9000c3b0"));
}

#[test]
fn test_cabinet_networks() {
    let state = compile_fixtures();

    let Some(ExtraProperties::Cabinet(mountain)) = &state.hardware["x1000"].extra_properties
    else {
        panic!("x1000 has no cabinet properties");
    };
    let hmn = &mountain.networks["cn"]["HMN"];
    assert_eq!(hmn.cidr, "10.104.0.0/22".parse::<ipnet::Ipv4Net>().unwrap());
    assert_eq!(hmn.gateway, Ipv4Addr::new(10, 104, 0, 1));
    assert_eq!(hmn.vlan, 3000);
    let nmn = &mountain.networks["cn"]["NMN"];
    assert_eq!(nmn.cidr, "10.100.0.0/22".parse::<ipnet::Ipv4Net>().unwrap());
    assert_eq!(nmn.vlan, 2000);

    let Some(ExtraProperties::Cabinet(hill)) = &state.hardware["x9000"].extra_properties else {
        panic!("x9000 has no cabinet properties");
    };
    assert_eq!(hill.networks["cn"]["HMN"].vlan, 3020);

    let Some(ExtraProperties::Cabinet(river)) = &state.hardware["x3000"].extra_properties else {
        panic!("x3000 has no cabinet properties");
    };
    assert_eq!(river.networks["cn"]["HMN"].vlan, 1513);
    assert_eq!(river.networks["cn"]["NMN"].vlan, 1770);
}

#[test]
fn test_switch_records() {
    let state = compile_fixtures();

    let spine = &state.hardware["x3000c0h33s1"];
    assert_eq!(spine.hardware_type, HardwareType::MgmtHlSwitch);
    assert_eq!(spine.class, CabinetClass::River);

    let cdu = &state.hardware["d0w1"];
    assert_eq!(cdu.hardware_type, HardwareType::CduMgmtSwitch);
    assert_eq!(cdu.class, CabinetClass::Mountain);
    assert_eq!(cdu.parent, "d0");

    let hill_cdu = &state.hardware["x9000c1h1s1"];
    assert_eq!(hill_cdu.hardware_type, HardwareType::MgmtHlSwitch);
    assert_eq!(hill_cdu.class, CabinetClass::Hill);
    let Some(ExtraProperties::Switch(properties)) = &hill_cdu.extra_properties else {
        panic!("x9000c1h1s1 has no switch properties");
    };
    assert_eq!(properties.aliases, vec!["sw-cdu-003".to_string()]);
    assert_eq!(properties.brand, "Dell");

    let hardware_subnet = state.networks["HMN"]
        .lookup_subnet("network_hardware")
        .unwrap();
    let reserved = hardware_subnet.lookup_reservation("sw-cdu-003").unwrap();
    assert_eq!(properties.ip4addr, Some(reserved.address));
    assert_eq!(reserved.comment.as_deref(), Some("x9000c1h1s1"));
}

#[test]
fn test_nodes_and_connectors() {
    let state = compile_fixtures();

    let storage = state.hardware["x3000c0s17b0n0"].node().unwrap();
    assert_eq!(storage.sub_role, Some(NodeSubRole::Storage));
    assert_eq!(storage.aliases, vec!["ncn-s003".to_string()]);

    assert_eq!(state.hardware["x3000c0s21b0n1"].node().unwrap().nid, Some(1));
    assert_eq!(state.hardware["x3000c0s21b0n2"].node().unwrap().nid, Some(2));
    assert_eq!(
        state.count(HardwareType::MgmtSwitchConnector, CabinetClass::River),
        13
    );

    let Some(ExtraProperties::Connector(port)) =
        &state.hardware["x3000c0w14j13"].extra_properties
    else {
        panic!("x3000c0w14j13 has no connector properties");
    };
    assert_eq!(port.vendor_name, "1/1/13");
    assert_eq!(port.node_nics, vec!["x3000m0".to_string()]);
    assert!(!state.hardware.contains_key("x3000c0w14j14"));
}

#[test]
fn test_reservations_backfilled() {
    let state = compile_fixtures();

    let nmn = state.networks["NMN"].lookup_subnet("bootstrap_dhcp").unwrap();
    let master = nmn.reservation_by_comment("x3000c0s1b0n0").unwrap();
    assert_eq!(master.name, "ncn-m001");
    assert_eq!(master.aliases, vec!["ncn-m001.nmn".to_string()]);
    assert!(nmn.reservation("x3000c0s1b0n0").is_none());

    let hmn = state.networks["HMN"].lookup_subnet("bootstrap_dhcp").unwrap();
    let bmc = hmn.reservation_by_comment("x3000c0s7b0").unwrap();
    assert_eq!(bmc.name, "ncn-w001-mgmt");
    assert_eq!(bmc.aliases, vec!["ncn-w001-mgmt.hmn".to_string()]);

    for network in ["CMN", "CAN", "MTL"] {
        let bootstrap = state.networks[network].lookup_subnet("bootstrap_dhcp").unwrap();
        assert!(bootstrap.reservation("ncn-s002").is_some(), "{network}");
    }
    assert!(!state.networks.contains_key("CHN"));
    assert_eq!(state.networks["CAN"].mtu, 1500);
}

#[test]
fn test_address_plan_invariants() {
    let state = compile_fixtures();

    for network in state.networks.values() {
        for (i, subnet) in network.subnets.iter().enumerate() {
            assert!(network.cidr.contains(&subnet.cidr), "{}", subnet.name);
            for other in &network.subnets[i + 1..] {
                assert!(
                    !cidr::overlaps(subnet.cidr, other.cidr),
                    "{}: {} overlaps {}",
                    network.name,
                    subnet.name,
                    other.name
                );
            }

            if subnet.supernet {
                assert!(network.cidr.contains(&subnet.gateway));
                assert_eq!(subnet.mask_prefix, network.cidr.prefix_len());
            } else {
                assert!(subnet.cidr.contains(&subnet.gateway));
            }
            if let (Some(start), Some(end)) = (subnet.dhcp_start, subnet.dhcp_end) {
                assert!(start <= end);
                assert!(subnet.cidr.contains(&start) && subnet.cidr.contains(&end));
            }

            let mut names: Vec<&str> = subnet.reservations.iter().map(|r| r.name.as_str()).collect();
            let mut addresses: Vec<Ipv4Addr> =
                subnet.reservations.iter().map(|r| r.address).collect();
            names.sort_unstable();
            names.dedup();
            addresses.sort_unstable();
            addresses.dedup();
            assert_eq!(names.len(), subnet.reservations.len());
            assert_eq!(addresses.len(), subnet.reservations.len());
            for reservation in &subnet.reservations {
                assert!(subnet.cidr.contains(&reservation.address));
                assert_ne!(reservation.address, subnet.gateway);
            }
        }
    }
}

#[test]
fn test_compile_is_deterministic() {
    let first = compile_fixtures().to_json_pretty().unwrap();
    let second = compile_fixtures().to_json_pretty().unwrap();
    assert_eq!(first, second);

    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(value["hardware"]["x3000"]["type"], "comptype_cabinet");
}

#[test]
fn test_ex2500_chassis_validation() {
    let config = load_config();
    let mut inputs = load_inputs();
    inputs.cabinets = CabinetInputs::default()
        .with_cabinet(CabinetKind::River, CabinetRecord::new(3000))
        .with_cabinet(
            CabinetKind::Ex2500,
            CabinetRecord::new(9000).with_chassis_count(1, 1),
        );
    let state = compile_site(&config, &inputs).unwrap();
    assert!(state.hardware.contains_key("x9000c0b0"));
    assert_eq!(state.hardware["x9000c1"].class, CabinetClass::Hill);
    assert!(!state.hardware.contains_key("x9000c1b0"));

    inputs.cabinets = CabinetInputs::default()
        .with_cabinet(CabinetKind::River, CabinetRecord::new(3000))
        .with_cabinet(
            CabinetKind::Ex2500,
            CabinetRecord::new(9000).with_chassis_count(1, 0),
        );
    assert!(matches!(
        compile_site(&config, &inputs),
        Err(Error::InvalidCabinet(_))
    ));
}

#[test]
fn test_cabinet_capacity_exhausted() {
    let config = load_config().with_network_override(
        "HMN_MTN",
        NetworkOverride::new().with_cidr("10.104.0.0/19".parse().unwrap()),
    );
    let err = compile_site(&config, &load_inputs()).unwrap_err();
    assert!(matches!(err, Error::Capacity(_)), "unexpected error: {err}");
}

#[test]
fn test_vlan_override_past_4094() {
    let config = load_config().with_network_override(
        "HMN_MTN",
        NetworkOverride::new().with_vlan(4090),
    );
    let err = compile_site(&config, &load_inputs()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "unexpected error: {err}");
}

#[test]
fn test_uncabled_management_node() {
    let mut inputs = load_inputs();
    inputs.cabling.retain(|row| row.source != "mn02");
    assert!(matches!(
        compile_site(&load_config(), &inputs),
        Err(Error::Consistency(_))
    ));
}

#[test]
fn test_management_nodes_sharing_bmc() {
    let mut inputs = load_inputs();
    for (node, sub) in [("x3000c0s7b0n0", "n1"), ("x3000c0s9b0n0", "n2")] {
        let record = inputs
            .node_metadata
            .iter_mut()
            .find(|r| r.xname == node)
            .unwrap_or_else(|| panic!("fixture has no node {node}"));
        record.xname = format!("x3000c0s7b0{sub}");
    }
    for (source, sub) in [("wn01", "L"), ("wn02", "R")] {
        let row = inputs
            .cabling
            .iter_mut()
            .find(|r| r.source == source)
            .unwrap_or_else(|| panic!("fixture has no cabling for {source}"));
        row.source_location = "u07".to_string();
        row.source_sub_location = Some(sub.to_string());
    }

    let err = compile_site(&load_config(), &inputs).unwrap_err();
    assert!(
        matches!(&err, Error::InvalidInput(msg) if msg.contains("x3000c0s7b0")),
        "unexpected error: {err}"
    );
}

#[test]
fn test_switch_without_model() {
    let mut inputs = load_inputs();
    inputs.switches[2].brand.clear();
    assert!(matches!(
        compile_site(&load_config(), &inputs),
        Err(Error::InvalidSwitch(_))
    ));
}
