//! `isoraster batch`: runs a many-to-many batch job (components J/K/L) to
//! completion against local files and writes the per-(percentile, cutoff)
//! PNG set plus a GeoTIFF zip bundle.

use anyhow::{Context, Result};
use clap::Parser;
use isoraster_batch::{BatchJob, BatchJobManager, BatchOptions, NullVisualProgressSink, WorkerPool};
use isoraster_core::{BINS, GridScheme};
use isoraster_image::{BundleEntry, batch_raster_filename, bundle_rasters, encode_geotiff, encode_packed_png, geotiffs_zip_filename};
use log::info;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::config::RunConfig;
use crate::density_grid::load_opportunity_grid;
use crate::resources::FileRoutingResources;

#[derive(Parser, Debug)]
pub struct Subcommand {
	/// Network id every task in this job routes against.
	pub network: String,

	/// Directory holding network files, the built egress table, and any
	/// opportunity-grid files referenced by id.
	#[arg(long)]
	pub data_dir: PathBuf,

	/// Egress id; resolves to `<data_dir>/<egress>.egress.bin`.
	#[arg(long)]
	pub egress: String,

	/// Path to a density-grid JSON file describing the job's origins.
	#[arg(long)]
	pub origins: PathBuf,

	/// Destination id; resolves to `<data_dir>/<destination_id>.json` or
	/// `.opportunities.bin`. Omit to run without an access histogram.
	#[arg(long)]
	pub destination_id: Option<String>,

	#[arg(long, default_value = "cli-batch")]
	pub job_id: String,

	#[arg(long, default_value = "cli")]
	pub user_id: String,

	/// Comma-separated cutoff minutes, reference default `30,45,60`.
	#[arg(long, default_value = "30,45,60")]
	pub cutoffs_min: String,

	/// Comma-separated percentiles mapped onto the min/avg/max duration
	/// channels, reference default `1,50,99`.
	#[arg(long, default_value = "1,50,99")]
	pub percentiles: String,

	#[arg(long, default_value_t = 6)]
	pub dual_max_n: usize,

	/// Origins with zero opportunity density within this many cells are
	/// skipped, reference default 4.
	#[arg(long, default_value_t = isoraster_batch::SKIP_FILTER_RADIUS_CELLS)]
	pub skip_filter_radius_cells: u32,

	/// Worker-pool size; defaults to `max(1, cores/2)`.
	#[arg(long)]
	pub pool_size: Option<usize>,

	/// Output directory for the per-cutoff PNGs and the GeoTIFF zip bundle.
	#[arg(long)]
	pub out_dir: PathBuf,
}

fn parse_u32_list(s: &str) -> Result<Vec<u32>> {
	s.split(',').map(|part| part.trim().parse::<u32>().with_context(|| format!("invalid integer '{part}'"))).collect()
}

pub fn run(args: &Subcommand) -> Result<()> {
	std::fs::create_dir_all(&args.out_dir).with_context(|| format!("creating output directory {}", args.out_dir.display()))?;

	let origins = load_opportunity_grid(&args.origins)?;
	let destinations = args
		.destination_id
		.as_ref()
		.map(|id| -> Result<_> {
			let json_path = args.data_dir.join(format!("{id}.json"));
			load_opportunity_grid(&json_path)
		})
		.transpose()?;

	let mut options = BatchOptions::new(args.network.clone(), args.egress.clone());
	options.destination_id = args.destination_id.clone();
	options.cutoffs_min = parse_u32_list(&args.cutoffs_min)?;
	options.percentiles = parse_u32_list(&args.percentiles)?;
	options.dual_max_n = args.dual_max_n;
	options.skip_filter_radius_cells = args.skip_filter_radius_cells;

	let origin_grid = *origins.grid();
	let job = BatchJob::new(args.job_id.clone(), args.user_id.clone(), options, origins, destinations);
	info!("batch: job '{}' has {} tasks ({} skipped)", job.id, job.n_tasks_total(), job.n_skipped());

	let (finished_tx, finished_rx) = mpsc::channel::<BatchJob>();
	let finished_tx = Mutex::new(finished_tx);
	let manager = Arc::new(BatchJobManager::new(move |finished_job| {
		info!("batch: job '{}' finished", finished_job.id);
		let _ = finished_tx.lock().expect("finalize channel lock poisoned").send(finished_job);
	}));

	let resources = Arc::new(FileRoutingResources::new(args.data_dir.clone()));
	let visual = Arc::new(NullVisualProgressSink);
	let run_config = RunConfig::new(false, args.pool_size);
	let pool = WorkerPool::start(Arc::clone(&manager), resources, visual, run_config.resolved_pool_size());

	manager.add_job(job);

	let finished = finished_rx.recv().context("worker pool stopped before the job finished")?;
	pool.shutdown();

	render_outputs(&finished, &origin_grid, args)?;
	Ok(())
}

/// Writes the per-(percentile, cutoff) packed PNG set plus a GeoTIFF zip
/// bundle for a finished job's results buffer (§6).
fn render_outputs(job: &BatchJob, origin_grid: &GridScheme, args: &Subcommand) -> Result<()> {
	let bounds = origin_grid.bounds();
	let n_percentiles = job.options.percentiles.len().min(3);
	let mut geotiff_entries = Vec::with_capacity(n_percentiles * job.options.cutoffs_min.len());

	for (ip, &percentile) in job.options.percentiles.iter().take(n_percentiles).enumerate() {
		for &cutoff_min in &job.options.cutoffs_min {
			let values = cumulative_access_image(job, origin_grid, ip, cutoff_min);

			let png_bytes = encode_packed_png(origin_grid.w(), origin_grid.h(), &values, &bounds)?;
			let png_path = args.out_dir.join(batch_raster_filename(&job.id, percentile as u8, cutoff_min));
			std::fs::write(&png_path, &png_bytes).with_context(|| format!("writing batch raster to {}", png_path.display()))?;

			let geotiff_bytes = encode_geotiff(origin_grid.w(), origin_grid.h(), &values, &bounds)?;
			geotiff_entries.push(BundleEntry {
				filename: batch_raster_filename(&job.id, percentile as u8, cutoff_min).replace(".png", ".tif"),
				bytes: geotiff_bytes,
			});
		}
	}

	let zip_bytes = bundle_rasters(&geotiff_entries)?;
	let zip_path = args.out_dir.join(geotiffs_zip_filename(&job.id));
	std::fs::write(&zip_path, &zip_bytes).with_context(|| format!("writing GeoTIFF bundle to {}", zip_path.display()))?;

	info!("batch: wrote {} rasters and {} to {}", geotiff_entries.len(), zip_path.display(), args.out_dir.display());
	Ok(())
}

/// Cumulative opportunities reached within `cutoff_min`, per origin cell,
/// in the same south-up row order as
/// [`isoraster_batch::BatchResultsBuffer::extract_access`]: summed from the
/// stored per-minute density bins rather than read directly, since the
/// results buffer stores density (per-minute), not its cumulative prefix.
fn cumulative_access_image(job: &BatchJob, origin_grid: &GridScheme, ip: usize, cutoff_min: u32) -> Vec<i64> {
	let (w, h) = (origin_grid.w() as usize, origin_grid.h() as usize);
	let last_bin = (cutoff_min as usize).min(BINS.saturating_sub(1));
	let mut image = vec![0i64; w * h];
	for y in 0..h {
		let row = h - 1 - y;
		for x in 0..w {
			let origin = origin_grid.cell_to_flat(x as u32, y as u32);
			let mut total = 0i64;
			for bin in 0..=last_bin {
				total += job.results.access_at(origin, ip, bin);
			}
			image[row * w + x] = total;
		}
	}
	image
}
