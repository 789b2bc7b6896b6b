//! `isoraster build-egress`: builds a [`SparseEgressTable`] from a street/
//! transit network description and writes it to disk using the binary
//! persistence format (component N).

use anyhow::{Context, Result};
use clap::Parser;
use isoraster_core::MAX_CONNECTOR_LENGTH_METERS;
use isoraster_core::progress::get_progress_bar;
use isoraster_routing::{SparseEgressTable, build_egress_table};
use log::info;
use std::path::PathBuf;

use crate::network::{load_street, load_transit};
use crate::resources::no_transit;

#[derive(Parser, Debug)]
pub struct Subcommand {
	/// Network id; reads `<data_dir>/<network>.street.json` and, if present,
	/// `<data_dir>/<network>.transit.json`.
	pub network: String,

	/// Directory holding the network description files.
	#[arg(long)]
	pub data_dir: PathBuf,

	/// Walking radius, in meters, a transit stop's egress contribution
	/// reaches from its nearest street vertex.
	#[arg(long, default_value_t = MAX_CONNECTOR_LENGTH_METERS)]
	pub egress_radius_m: f64,

	/// Output path for the built egress table.
	#[arg(long)]
	pub out: PathBuf,
}

pub fn run(args: &Subcommand) -> Result<()> {
	info!("build-egress: loading network '{}' from {}", args.network, args.data_dir.display());
	let street = load_street(&args.data_dir, &args.network)?;
	let transit = load_transit(&args.data_dir, &args.network)?;

	let mut progress = get_progress_bar("build-egress: walking street/transit network", 1);
	let table: SparseEgressTable = match &transit {
		Some(transit) => build_egress_table(&street, transit, args.egress_radius_m)?,
		None => {
			let no_transit = no_transit();
			build_egress_table(&street, no_transit.as_ref(), args.egress_radius_m)?
		}
	};
	progress.finish();

	let bytes = table.to_bytes()?;
	std::fs::write(&args.out, bytes.as_slice()).with_context(|| format!("writing egress table to {}", args.out.display()))?;
	info!("build-egress: wrote {} tiles to {}", table.grid().tile_count(), args.out.display());
	Ok(())
}
