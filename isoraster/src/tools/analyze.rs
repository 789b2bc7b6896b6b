//! `isoraster analyze`: runs the one-to-many processor (component I) for a
//! single origin and writes the travel-time PNG (with embedded histogram
//! metadata) to disk.

use anyhow::{Context, Result, bail};
use clap::Parser;
use isoraster_core::{AccessHistogram, Blob, GridScheme, MAX_SEC};
use isoraster_image::encode_one_to_many_png;
use isoraster_propagation::{ModeSet, OneToManyOptions, OpportunityGrid, run_one_to_many};
use isoraster_routing::SparseEgressTable;
use log::info;
use std::path::PathBuf;

use crate::density_grid::load_opportunity_grid;
use crate::network::{load_street, load_transit};
use crate::resources::no_transit;

#[derive(Parser, Debug)]
pub struct Subcommand {
	/// Network id the origin is placed against.
	pub network: String,

	/// Directory holding the network description files.
	#[arg(long)]
	pub data_dir: PathBuf,

	/// Path to a previously built egress table (see `build-egress`).
	#[arg(long)]
	pub egress: PathBuf,

	/// Origin longitude, decimal degrees.
	#[arg(long)]
	pub origin_lon: f64,

	/// Origin latitude, decimal degrees.
	#[arg(long)]
	pub origin_lat: f64,

	/// Path to a density-grid JSON file describing destination
	/// opportunities. Omit to run without an access histogram.
	#[arg(long)]
	pub destinations: Option<PathBuf>,

	/// Consult the network's transit schedule in addition to walking.
	#[arg(long)]
	pub transit: bool,

	#[arg(long, default_value_t = 0)]
	pub window_start_sec: u32,

	#[arg(long, default_value_t = 86_400)]
	pub window_end_sec: u32,

	#[arg(long, default_value_t = 60)]
	pub max_duration_min: u32,

	/// Comma-separated cutoff minutes, reference default `30,45,60`.
	#[arg(long, default_value = "30,45,60")]
	pub cutoffs_min: String,

	/// Comma-separated percentiles mapped onto the min/avg/max duration
	/// channels, reference default `1,50,99`.
	#[arg(long, default_value = "1,50,99")]
	pub percentiles: String,

	#[arg(long, default_value_t = 6)]
	pub dual_max_n: usize,

	/// Output PNG path.
	#[arg(long)]
	pub out: PathBuf,
}

fn parse_u32_list(s: &str) -> Result<Vec<u32>> {
	s.split(',').map(|part| part.trim().parse::<u32>().with_context(|| format!("invalid integer '{part}'"))).collect()
}

pub fn run(args: &Subcommand) -> Result<()> {
	info!("analyze: running one-to-many for ({}, {}) on network '{}'", args.origin_lon, args.origin_lat, args.network);

	let street = load_street(&args.data_dir, &args.network)?;
	let transit = if args.transit { load_transit(&args.data_dir, &args.network)? } else { None };

	let egress_bytes = std::fs::read(&args.egress).with_context(|| format!("reading egress table {}", args.egress.display()))?;
	let egress = SparseEgressTable::from_bytes(Blob::from(egress_bytes))?;

	let destinations = args.destinations.as_deref().map(load_opportunity_grid).transpose()?;

	let cutoffs_min = parse_u32_list(&args.cutoffs_min)?;
	let percentiles = parse_u32_list(&args.percentiles)?;
	if percentiles.is_empty() {
		bail!("--percentiles must name at least one percentile");
	}

	let options = OneToManyOptions {
		origin_lon: args.origin_lon,
		origin_lat: args.origin_lat,
		modes: ModeSet { transit: args.transit },
		window_start_sec: args.window_start_sec,
		window_end_sec: args.window_end_sec,
		max_duration_min: args.max_duration_min,
		network_id: args.network.clone(),
		egress_id: args.egress.display().to_string(),
		destination_id: args.destinations.as_ref().map(|p| p.display().to_string()),
		cutoffs_min: Some(cutoffs_min),
		percentiles: Some(percentiles.clone()),
		dual_max_n: args.dual_max_n,
		street_search_radius_m: None,
	};
	let no_transit_layer = no_transit();
	let transit_layer = match (&transit, args.transit) {
		(Some(t), true) => Some(t as &dyn isoraster_routing::TransitLayer),
		_ => None,
	};
	let result = run_one_to_many(&street, transit_layer, &egress, destinations.as_ref(), &options)?;

	let channels: [&[u32]; 3] = [&result.durations.min, &result.durations.avg, &result.durations.max];
	let n_percentiles = percentiles.len().min(3);

	let mut density = Vec::with_capacity(n_percentiles);
	let mut access = Vec::with_capacity(n_percentiles);
	let mut dual = Vec::with_capacity(n_percentiles);
	for channel in channels.into_iter().take(n_percentiles) {
		let histogram = channel_histogram(channel, destinations.as_ref(), &result.grid);
		density.push(histogram.density.to_vec());
		access.push(histogram.cumulative().to_vec());
		dual.push(histogram.dual(args.dual_max_n));
	}

	let png = encode_one_to_many_png(
		result.grid.w(),
		result.grid.h(),
		&result.durations,
		&result.grid.bounds(),
		&vec![density],
		&vec![access],
		&vec![dual],
	)?;
	std::fs::write(&args.out, &png).with_context(|| format!("writing one-to-many PNG to {}", args.out.display()))?;
	info!("analyze: wrote {}x{} PNG to {}", result.grid.w(), result.grid.h(), args.out.display());
	Ok(())
}

/// Per-channel access histogram against a destination grid, matching
/// [`isoraster_batch`]'s own reduction of a processor run's three duration
/// channels into one histogram each.
fn channel_histogram(channel: &[u32], destinations: Option<&OpportunityGrid>, grid: &GridScheme) -> AccessHistogram {
	let mut histogram = AccessHistogram::new();
	let Some(destinations) = destinations else {
		return histogram;
	};
	for (flat, &seconds) in channel.iter().enumerate() {
		if seconds >= MAX_SEC {
			continue;
		}
		let (x, y) = grid.flat_to_cell(flat);
		let density = destinations.density_at(x, y);
		if density > 0.0 {
			histogram.add(seconds, density as i64);
		}
	}
	histogram
}

#[cfg(test)]
mod tests {
	use super::*;
	use isoraster_core::GeoBBox;

	#[test]
	fn parse_u32_list_splits_and_trims() {
		assert_eq!(parse_u32_list("1, 50,99").unwrap(), vec![1, 50, 99]);
	}

	#[test]
	fn parse_u32_list_rejects_non_numeric_parts() {
		let err = parse_u32_list("1,fifty,99").unwrap_err();
		assert!(err.to_string().contains("invalid integer 'fifty'"));
	}

	#[test]
	fn channel_histogram_is_empty_without_destinations() {
		let bounds = GeoBBox::new(0.0, 0.0, 0.002, 0.002).unwrap();
		let grid = GridScheme::new(bounds, 1, 1).unwrap();
		let histogram = channel_histogram(&[600], None, &grid);
		assert_eq!(histogram.cumulative().iter().sum::<i64>(), 0);
	}

	#[test]
	fn channel_histogram_accumulates_reachable_destination_density() {
		let bounds = GeoBBox::new(0.0, 0.0, 0.002, 0.002).unwrap();
		let grid = GridScheme::new(bounds, 1, 1).unwrap();
		let destinations = OpportunityGrid::from_dense(grid, &[4.0]);

		let histogram = channel_histogram(&[600], Some(&destinations), &grid);
		assert_eq!(histogram.density[10], 4);

		let histogram = channel_histogram(&[MAX_SEC], Some(&destinations), &grid);
		assert_eq!(histogram.cumulative().iter().sum::<i64>(), 0);
	}
}
