//! Batch worker pool (component 4.L): a fixed-size thread pool that pulls
//! task blocks from the [`BatchJobManager`] onto a bounded queue and runs
//! the one-to-many processor for each task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use isoraster_core::{AccessHistogram, GridScheme, MAX_SEC};
use isoraster_propagation::{OneToManyOptions, OpportunityGrid, run_one_to_many};
use isoraster_routing::{SparseEgressTable, StreetLayer, TransitLayer};

use crate::job::JobContext;
use crate::manager::{BatchJobManager, BatchTaskOutcome, BatchTaskResult};
use crate::visual_progress::{CellRect, VisualProgressSink};

/// Resolves the network/egress/destination ids carried by a batch job's
/// options into the read-only routing collaborators a processor run needs.
/// Implemented by the caller, which owns the routing-data cache; this crate
/// never loads routing data itself (§5: shared resources are immutable
/// after build and concurrently readable).
pub trait RoutingResources: Send + Sync {
	fn street(&self, network_id: &str) -> Result<Arc<dyn StreetLayer>>;
	fn transit(&self, network_id: &str) -> Result<Option<Arc<dyn TransitLayer>>>;
	fn egress(&self, egress_id: &str) -> Result<Arc<SparseEgressTable>>;
	fn opportunities(&self, destination_id: &str) -> Result<Arc<OpportunityGrid>>;
}

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sized `max(1, cores/2)` by default, per §4.L.
#[must_use]
pub fn default_pool_size() -> usize {
	(num_cpus::get() / 2).max(1)
}

struct BoundedQueue<T> {
	capacity: usize,
	items: Mutex<std::collections::VecDeque<T>>,
	not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
	fn new(capacity: usize) -> BoundedQueue<T> {
		BoundedQueue {
			capacity,
			items: Mutex::new(std::collections::VecDeque::new()),
			not_empty: Condvar::new(),
		}
	}

	fn remaining_capacity(&self) -> usize {
		let items = self.items.lock().unwrap();
		self.capacity.saturating_sub(items.len())
	}

	fn is_full(&self) -> bool {
		self.remaining_capacity() == 0
	}

	fn push(&self, item: T) {
		let mut items = self.items.lock().unwrap();
		items.push_back(item);
		self.not_empty.notify_one();
	}

	/// Blocks for up to [`POLL_INTERVAL`] at a time, re-checking `shutdown`
	/// between waits so a worker exits promptly once told to stop.
	fn pop_until_shutdown(&self, shutdown: &AtomicBool) -> Option<T> {
		let mut items = self.items.lock().unwrap();
		loop {
			if let Some(item) = items.pop_front() {
				return Some(item);
			}
			if shutdown.load(Ordering::Relaxed) {
				return None;
			}
			items = self.not_empty.wait_timeout(items, POLL_INTERVAL).unwrap().0;
		}
	}
}

/// A fixed-size worker pool bound to one [`BatchJobManager`]. Dropping it
/// does not stop the pool; call [`WorkerPool::shutdown`] explicitly.
pub struct WorkerPool {
	shutdown: Arc<AtomicBool>,
	dispatcher: Option<thread::JoinHandle<()>>,
	workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
	/// Starts the dispatcher loop and `pool_size` worker threads.
	///
	/// Dispatcher loop, per §4.L: if the queue is full, sleep and retry;
	/// otherwise pull up to the queue's remaining capacity from the
	/// manager, sleeping and retrying if that comes back empty.
	pub fn start(
		manager: Arc<BatchJobManager>,
		resources: Arc<dyn RoutingResources>,
		visual: Arc<dyn VisualProgressSink>,
		pool_size: usize,
	) -> WorkerPool {
		let queue = Arc::new(BoundedQueue::<(String, usize, CellRect)>::new(pool_size * 100));
		let shutdown = Arc::new(AtomicBool::new(false));

		let dispatcher = {
			let queue = Arc::clone(&queue);
			let manager = Arc::clone(&manager);
			let visual = Arc::clone(&visual);
			let shutdown = Arc::clone(&shutdown);
			thread::spawn(move || {
				while !shutdown.load(Ordering::Relaxed) {
					if queue.is_full() {
						thread::sleep(POLL_INTERVAL);
						continue;
					}
					let n = queue.remaining_capacity();
					let Some(block) = manager.get_tasks(n) else {
						thread::sleep(POLL_INTERVAL);
						continue;
					};
					if block.task_ids.is_empty() {
						thread::sleep(POLL_INTERVAL);
						continue;
					}
					let Some(context) = manager.job_context(&block.job_id) else {
						continue;
					};
					let rects: Vec<CellRect> = block
						.task_ids
						.iter()
						.map(|&task_id| {
							let (x, y) = context.origin_cell_grid.flat_to_cell(task_id);
							CellRect::for_cell(x, y)
						})
						.collect();
					visual.batch_sent(&block.job_id, &rects);
					for (task_id, rect) in block.task_ids.into_iter().zip(rects) {
						queue.push((block.job_id.clone(), task_id, rect));
					}
				}
			})
		};

		let mut workers = Vec::with_capacity(pool_size);
		for _ in 0..pool_size {
			let queue = Arc::clone(&queue);
			let manager = Arc::clone(&manager);
			let resources = Arc::clone(&resources);
			let visual = Arc::clone(&visual);
			let shutdown = Arc::clone(&shutdown);
			workers.push(thread::spawn(move || {
				while let Some((job_id, task_id, rect)) = queue.pop_until_shutdown(&shutdown) {
					let Some(context) = manager.job_context(&job_id) else {
						// The job finished or was cancelled between dispatch and pickup.
						continue;
					};
					let outcome = run_task(resources.as_ref(), &context, task_id);
					manager.submit_result(BatchTaskResult { job_id: job_id.clone(), task_id, outcome });
					visual.batch_finished(&job_id, rect);
				}
			}));
		}

		WorkerPool { shutdown, dispatcher: Some(dispatcher), workers }
	}

	/// Signals the dispatcher and all workers to stop once their current
	/// wait elapses, then joins them.
	pub fn shutdown(mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.dispatcher.take() {
			let _ = handle.join();
		}
		for handle in self.workers.drain(..) {
			let _ = handle.join();
		}
	}
}

/// Loads the job's routing collaborators, runs the one-to-many processor
/// with `writePng=false` (the propagation result is consumed as dense
/// arrays here, never rendered), and reduces its durations into one
/// access/dual pair per percentile channel. Any failure is captured as an
/// error outcome so peer tasks proceed (§4.L).
pub fn run_task(resources: &dyn RoutingResources, context: &JobContext, task_id: usize) -> BatchTaskOutcome {
	run_task_inner(resources, context, task_id).unwrap_or_else(|err| BatchTaskOutcome::Error(err.to_string()))
}

fn run_task_inner(resources: &dyn RoutingResources, context: &JobContext, task_id: usize) -> Result<BatchTaskOutcome> {
	let (origin_lon, origin_lat) = context.origin_lon_lat(task_id);
	let options = &context.options;

	let street = resources.street(&options.network_id)?;
	let transit = resources.transit(&options.network_id)?;
	let egress = resources.egress(&options.egress_id)?;
	let destinations = context.destinations.clone();

	let one_to_many_options = OneToManyOptions {
		origin_lon,
		origin_lat,
		modes: options.modes,
		window_start_sec: options.window_start_sec,
		window_end_sec: options.window_end_sec,
		max_duration_min: options.max_duration_min,
		network_id: options.network_id.clone(),
		egress_id: options.egress_id.clone(),
		destination_id: options.destination_id.clone(),
		cutoffs_min: Some(options.cutoffs_min.clone()),
		percentiles: Some(options.percentiles.clone()),
		dual_max_n: options.dual_max_n,
		street_search_radius_m: options.street_search_radius_m,
	};

	let result = run_one_to_many(street.as_ref(), transit.as_deref(), &egress, destinations.as_ref(), &one_to_many_options)?;

	let channels: [&[u32]; 3] = [&result.durations.min, &result.durations.avg, &result.durations.max];
	let n_percentiles = options.percentiles.len().min(3);

	let mut access = Vec::with_capacity(n_percentiles);
	let mut dual = Vec::with_capacity(n_percentiles);
	for channel in channels.into_iter().take(n_percentiles) {
		let histogram = histogram_for_channel(channel, destinations.as_ref(), &result.grid);
		dual.push(histogram.dual(options.dual_max_n));
		access.push(histogram.density.to_vec());
	}

	Ok(BatchTaskOutcome::Ok { access, dual })
}

/// Builds the access histogram for one duration channel (min, avg, or max)
/// against a destination opportunity grid, independent of tile boundaries
/// since the channel is already a dense per-cell array (§4.I step 5,
/// applied per channel rather than only to `min`).
fn histogram_for_channel(channel: &[u32], destinations: Option<&OpportunityGrid>, grid: &GridScheme) -> AccessHistogram {
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
