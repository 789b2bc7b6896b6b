//! Batch job state and its results buffer (component 4.J): per-origin task
//! bookkeeping for a many-to-many run, and the three-dimensional access/dual
//! arrays it fills in as tasks complete.

use isoraster_core::{BINS, DUAL_UNREACHED, GridScheme};
use isoraster_propagation::{ModeSet, OpportunityGrid};

/// Origins whose opportunity density is zero within this many cells of them
/// are filtered out of a job's task list at construction, per §4.K.
pub const SKIP_FILTER_RADIUS_CELLS: u32 = 4;

/// Per-origin request options shared by every task in a batch job; only the
/// origin's lat/lon varies task to task (see [`BatchJob::origin_lon_lat`]).
#[derive(Clone, Debug)]
pub struct BatchOptions {
	pub modes: ModeSet,
	pub window_start_sec: u32,
	pub window_end_sec: u32,
	pub max_duration_min: u32,
	pub network_id: String,
	pub egress_id: String,
	pub destination_id: Option<String>,
	/// Reference default `[30, 45, 60]`.
	pub cutoffs_min: Vec<u32>,
	/// Reference default `[1, 50, 99]`, positionally mapped onto a
	/// processor result's `(min, avg, max)` duration channels; only the
	/// first three are used, since a [`isoraster_core::Durations`] record
	/// carries exactly three channels.
	pub percentiles: Vec<u32>,
	pub dual_max_n: usize,
	pub street_search_radius_m: Option<f64>,
	/// Origins whose cell, and neighbourhood of this many cells, has zero
	/// opportunity density are filtered (skipped) at job construction, per
	/// §4.K. Reference default [`SKIP_FILTER_RADIUS_CELLS`].
	pub skip_filter_radius_cells: u32,
}

impl BatchOptions {
	#[must_use]
	pub fn new(network_id: impl Into<String>, egress_id: impl Into<String>) -> BatchOptions {
		BatchOptions {
			modes: ModeSet::default(),
			window_start_sec: 0,
			window_end_sec: 24 * 3600,
			max_duration_min: 60,
			network_id: network_id.into(),
			egress_id: egress_id.into(),
			destination_id: None,
			cutoffs_min: vec![30, 45, 60],
			percentiles: vec![1, 50, 99],
			dual_max_n: 6,
			street_search_radius_m: None,
			skip_filter_radius_cells: SKIP_FILTER_RADIUS_CELLS,
		}
	}
}

/// Three-dimensional results buffer, per §4.J:
/// `access[origin][percentile][bin]` and `dual[origin][percentile][n]`,
/// stored flat and indexed row-major.
#[derive(Clone, Debug)]
pub struct BatchResultsBuffer {
	n_percentiles: usize,
	n_bins: usize,
	n_dual: usize,
	access: Vec<i64>,
	dual: Vec<u32>,
}

impl BatchResultsBuffer {
	#[must_use]
	pub fn new(n_origins: usize, n_percentiles: usize, n_bins: usize, n_dual: usize) -> BatchResultsBuffer {
		BatchResultsBuffer {
			n_percentiles,
			n_bins,
			n_dual,
			access: vec![0; n_origins * n_percentiles * n_bins],
			dual: vec![DUAL_UNREACHED; n_origins * n_percentiles * n_dual],
		}
	}

	fn access_index(&self, origin: usize, ip: usize, bin: usize) -> usize {
		(origin * self.n_percentiles + ip) * self.n_bins + bin
	}

	fn dual_index(&self, origin: usize, ip: usize, n: usize) -> usize {
		(origin * self.n_percentiles + ip) * self.n_dual + n
	}

	pub fn set_access(&mut self, origin: usize, ip: usize, bins: &[i64]) {
		debug_assert_eq!(bins.len(), self.n_bins);
		let base = self.access_index(origin, ip, 0);
		self.access[base..base + self.n_bins].copy_from_slice(bins);
	}

	pub fn set_dual(&mut self, origin: usize, ip: usize, values: &[u32]) {
		debug_assert_eq!(values.len(), self.n_dual);
		let base = self.dual_index(origin, ip, 0);
		self.dual[base..base + self.n_dual].copy_from_slice(values);
	}

	#[must_use]
	pub fn access_at(&self, origin: usize, ip: usize, bin: usize) -> i64 {
		self.access[self.access_index(origin, ip, bin)]
	}

	#[must_use]
	pub fn dual_at(&self, origin: usize, ip: usize, n: usize) -> u32 {
		self.dual[self.dual_index(origin, ip, n)]
	}

	/// `extractAccess(width, height, ip, ic)` from §4.J: a 2D image over
	/// `origin_grid` of `access[origin][ip][ic]`, row-major with row 0 the
	/// grid's northernmost row (image y grows south, the grid's cell rows
	/// grow north), missing origins reading 0.
	#[must_use]
	pub fn extract_access(&self, origin_grid: &GridScheme, ip: usize, ic: usize) -> Vec<Vec<i64>> {
		let (w, h) = (origin_grid.w() as usize, origin_grid.h() as usize);
		let mut image = vec![vec![0i64; w]; h];
		for y in 0..h {
			let row = h - 1 - y;
			for x in 0..w {
				let flat = origin_grid.cell_to_flat(x as u32, y as u32);
				image[row][x] = self.access_at(flat, ip, ic);
			}
		}
		image
	}
}

/// A many-to-many batch job, per §4.J/§4.K: task bookkeeping over an
/// `origins` tile grid plus the results it accumulates.
#[derive(Clone, Debug)]
pub struct BatchJob {
	pub id: String,
	pub user_id: String,
	pub options: BatchOptions,
	/// Opportunity density at each origin, used only to filter origins with
	/// no nearby destinations at construction.
	pub origins: OpportunityGrid,
	/// Destination opportunity density fed into each task's processor run.
	pub destinations: Option<OpportunityGrid>,
	origin_cell_grid: GridScheme,
	n_tasks_total: usize,
	completed: Vec<bool>,
	skipped: Vec<bool>,
	next_task: usize,
	n_tasks_remaining: usize,
	pub results: BatchResultsBuffer,
}

impl BatchJob {
	#[must_use]
	pub fn new(id: impl Into<String>, user_id: impl Into<String>, options: BatchOptions, origins: OpportunityGrid, destinations: Option<OpportunityGrid>) -> BatchJob {
		let origin_cell_grid = *origins.grid();
		let n_tasks_total = origin_cell_grid.len();

		let mut skipped = vec![false; n_tasks_total];
		let mut n_skipped = 0usize;
		for flat in 0..n_tasks_total {
			let (x, y) = origin_cell_grid.flat_to_cell(flat);
			if origins.is_zero_neighbourhood(x, y, options.skip_filter_radius_cells) {
				skipped[flat] = true;
				n_skipped += 1;
			}
		}
		let completed = skipped.clone();

		let n_percentiles = options.percentiles.len().min(3);
		let dual_max_n = options.dual_max_n;
		let results = BatchResultsBuffer::new(n_tasks_total, n_percentiles, BINS, dual_max_n);

		BatchJob {
			id: id.into(),
			user_id: user_id.into(),
			options,
			origins,
			destinations,
			origin_cell_grid,
			n_tasks_total,
			completed,
			skipped,
			next_task: 0,
			n_tasks_remaining: n_tasks_total - n_skipped,
			results,
		}
	}

	#[must_use]
	pub fn origin_cell_grid(&self) -> &GridScheme {
		&self.origin_cell_grid
	}

	#[must_use]
	pub fn n_tasks_total(&self) -> usize {
		self.n_tasks_total
	}

	#[must_use]
	pub fn n_tasks_remaining(&self) -> usize {
		self.n_tasks_remaining
	}

	#[must_use]
	pub fn n_skipped(&self) -> usize {
		self.skipped.iter().filter(|&&s| s).count()
	}

	#[must_use]
	pub fn is_skipped(&self, task_id: usize) -> bool {
		self.skipped[task_id]
	}

	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.n_tasks_remaining == 0
	}

	/// Lat/lon centre of the origin cell a task id refers to.
	#[must_use]
	pub fn origin_lon_lat(&self, task_id: usize) -> (f64, f64) {
		let (x, y) = self.origin_cell_grid.flat_to_cell(task_id);
		(self.origin_cell_grid.center_lon_for_x(x), self.origin_cell_grid.center_lat_for_y(y))
	}

	/// Pulls up to `max_tasks` not-yet-issued task ids in ascending order,
	/// silently skipping filtered origins. Never blocks, never re-issues a
	/// task id once returned.
	pub fn next_task_block(&mut self, max_tasks: usize) -> Vec<usize> {
		let mut out = Vec::with_capacity(max_tasks);
		while out.len() < max_tasks && self.next_task < self.n_tasks_total {
			let id = self.next_task;
			self.next_task += 1;
			if self.skipped[id] {
				continue;
			}
			out.push(id);
		}
		out
	}

	/// Marks `task_id` complete. Idempotent, so a duplicate or late-arriving
	/// result for an already-completed task is harmless.
	pub fn mark_complete(&mut self, task_id: usize) {
		if !self.completed[task_id] {
			self.completed[task_id] = true;
			self.n_tasks_remaining -= 1;
		}
	}

	/// A read-only snapshot of what a worker needs to run one of this job's
	/// tasks, without handing out a reference to the job itself.
	#[must_use]
	pub fn context(&self) -> JobContext {
		JobContext {
			options: self.options.clone(),
			destinations: self.destinations.clone(),
			origin_cell_grid: self.origin_cell_grid,
		}
	}
}

/// Everything a worker needs for one task, snapshotted from the active job
/// so the worker pool never touches [`BatchJob`] directly (§4.L).
#[derive(Clone, Debug)]
pub struct JobContext {
	pub options: BatchOptions,
	pub destinations: Option<OpportunityGrid>,
	pub origin_cell_grid: GridScheme,
}

impl JobContext {
	#[must_use]
	pub fn origin_lon_lat(&self, task_id: usize) -> (f64, f64) {
		let (x, y) = self.origin_cell_grid.flat_to_cell(task_id);
		(self.origin_cell_grid.center_lon_for_x(x), self.origin_cell_grid.center_lat_for_y(y))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use isoraster_core::GeoBBox;

	fn grid() -> GridScheme {
		GridScheme::new(GeoBBox::new(0.0, 0.0, 1.0, 1.0).unwrap(), 10, 10).unwrap()
	}

	fn job_with_density(density: &[f32]) -> BatchJob {
		let g = grid();
		let origins = OpportunityGrid::from_dense(g, density);
		let options = BatchOptions::new("net", "egress");
		BatchJob::new("job-1", "org-1", options, origins, None)
	}

	#[test]
	fn all_zero_origins_skip_every_task() {
		let density = vec![0.0f32; grid().len()];
		let job = job_with_density(&density);
		assert_eq!(job.n_tasks_total(), 100);
		assert_eq!(job.n_skipped(), 100);
		assert_eq!(job.n_tasks_remaining(), 0);
		assert!(job.is_complete());
	}

	#[test]
	fn corner_block_filters_distant_origins() {
		let g = grid();
		let mut density = vec![0.0f32; g.len()];
		for y in 0..4u32 {
			for x in 0..4u32 {
				density[g.cell_to_flat(x, y)] = 1.0;
			}
		}
		let origins = OpportunityGrid::from_dense(g, &density);
		let mut options = BatchOptions::new("net", "egress");
		options.skip_filter_radius_cells = 0;
		let job = BatchJob::new("job-1", "org-1", options, origins, None);
		// 10x10 grid, opportunities only in a 4x4 corner, filter radius 0:
		// exactly the 16 nonzero cells survive, per the spec's batch-skipping scenario.
		assert_eq!(job.n_tasks_total(), 100);
		assert_eq!(job.n_skipped(), 84);
		assert_eq!(job.n_tasks_remaining(), 16);
	}

	#[test]
	fn next_task_block_is_ascending_and_exhaustive() {
		let density = {
			let g = grid();
			let mut d = vec![0.0f32; g.len()];
			d[g.cell_to_flat(5, 5)] = 1.0;
			d
		};
		let mut job = job_with_density(&density);
		let mut seen = Vec::new();
		loop {
			let block = job.next_task_block(7);
			if block.is_empty() {
				break;
			}
			assert!(block.windows(2).all(|w| w[0] < w[1]));
			seen.extend(block);
		}
		for &id in &seen {
			assert!(!job.is_skipped(id));
		}
		assert_eq!(seen.len(), job.n_tasks_total() - job.n_skipped());
	}

	#[test]
	fn mark_complete_is_idempotent() {
		let density = {
			let g = grid();
			let mut d = vec![0.0f32; g.len()];
			d[g.cell_to_flat(0, 0)] = 1.0;
			d
		};
		let mut job = job_with_density(&density);
		let before = job.n_tasks_remaining();
		let task = job.next_task_block(1)[0];
		job.mark_complete(task);
		assert_eq!(job.n_tasks_remaining(), before - 1);
		job.mark_complete(task);
		assert_eq!(job.n_tasks_remaining(), before - 1);
	}

	#[test]
	fn extract_access_flips_y_and_defaults_missing_to_zero() {
		let density = {
			let g = grid();
			let mut d = vec![0.0f32; g.len()];
			d[g.cell_to_flat(0, 0)] = 1.0;
			d
		};
		let job = job_with_density(&density);
		let grid = job.origin_cell_grid();
		let mut results = BatchResultsBuffer::new(grid.len(), 1, BINS, 1);
		let flat = grid.cell_to_flat(3, 0);
		let mut bins = vec![0i64; BINS];
		bins[0] = 5;
		results.set_access(flat, 0, &bins);
		let image = results.extract_access(grid, 0, 0);
		assert_eq!(image[grid.h() as usize - 1][3], 5);
		assert_eq!(image[0][3], 0);
	}
}
