//! End-to-end compilation of site inputs into a topology state.

use crate::assembler::{assemble, backfill_reservations};
use crate::cabinets::resolve_cabinets;
use crate::catalog::SwitchCatalog;
use crate::inputs::SiteInputs;
use crate::ncn::normalize_ncns;
use crate::networks::{compile_networks, NetworkInputs, NETWORK_HARDWARE};
use crate::state::TopologyState;
use crate::switches::{classify_switches, switches_from_reservations};
use csi_core::types::network_names;
use csi_core::{Error, Result, RunConfig};
use tracing::info;

/// Compiles the site inputs.
///
/// Stages run in a fixed order and the first failure aborts the run:
/// cabinet resolution, switch classification, node normalization, network
/// compilation and allocation, topology assembly, and hostname back-fill.
/// The same inputs always produce the same state.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] for an invalid configuration and whatever
/// the failing stage reports otherwise.
pub fn compile(
    config: &RunConfig,
    inputs: &SiteInputs,
    catalog: &dyn SwitchCatalog,
) -> Result<TopologyState> {
    config.check()?;
    info!(system = %config.system_name, "compiling site topology");

    let cabinets = resolve_cabinets(&inputs.cabinets)?;
    let switches = classify_switches(&inputs.switches, catalog)?;
    let ncns = normalize_ncns(&inputs.node_metadata)?;

    let mut networks = compile_networks(
        config,
        &NetworkInputs {
            cabinets: &cabinets,
            switches: &switches,
            ncns: &ncns,
        },
    )?;

    // Switch records carry the addresses the hardware network reserved.
    let hardware_subnet = networks
        .get(network_names::HMN)
        .ok_or_else(|| Error::NotFound(format!("network {}", network_names::HMN)))?
        .lookup_subnet(NETWORK_HARDWARE)?;
    let switches = switches_from_reservations(hardware_subnet, catalog)?;

    let assembly = assemble(&cabinets, &networks, &switches, &ncns, &inputs.cabling)?;
    backfill_reservations(&mut networks, &ncns, &assembly.hostnames)?;

    let state = TopologyState {
        networks,
        hardware: assembly.hardware,
    };
    info!(
        system = %config.system_name,
        networks = state.networks.len(),
        hardware = state.hardware.len(),
        "compiled site topology"
    );
    Ok(state)
}
