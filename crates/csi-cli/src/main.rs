//! `csi` compiles a site's structured inputs into a topology state document.
//!
//! ```text
//! csi --config system_config.json --inputs site_inputs.json --output state.json
//! ```
//!
//! Logging follows `RUST_LOG` and defaults to `info`. Nothing is written
//! unless the whole compilation succeeds.

use anyhow::{Context, Result};
use clap::Parser;
use csi_core::RunConfig;
use csi_topology::{compile, SiteInputs, StaticSwitchCatalog};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "csi", version, about = "Compile a cluster address plan and hardware topology")]
struct Args {
    /// Run configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Site inputs: cabinets, switches, node metadata and cabling (JSON)
    #[arg(short, long)]
    inputs: PathBuf,

    /// Where to write the topology state; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config: RunConfig = read_json(&args.config)?;
    let inputs: SiteInputs = read_json(&args.inputs)?;
    let catalog = StaticSwitchCatalog::from_records(&inputs.switches);

    let state = compile(&config, &inputs, &catalog)
        .with_context(|| format!("compiling system {}", config.system_name))?;
    let rendered = state.to_json_pretty()?;

    match &args.output {
        Some(path) => {
            fs::write(path, rendered + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote topology state");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
