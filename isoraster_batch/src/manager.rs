//! Batch job manager (component 4.K): serialises the job queue behind a
//! single lock, hands out pull-based task blocks, and schedules a
//! background finalize when a job's last task completes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use isoraster_core::progress::{EventSink, NullEventSink, ProgressDecimation, ProgressSink};
use log::info;

use crate::job::{BatchJob, JobContext};

/// Batch progress override of [`ProgressDecimation`]'s defaults, per §4.M:
/// coarser than the reference single-task default so a job with thousands
/// of origins doesn't flood its event sink.
#[must_use]
fn batch_decimation() -> ProgressDecimation {
	ProgressDecimation {
		min_time_between_events_msec: 500,
		push_event_after: 25,
	}
}

/// A pull-based block of task ids from the currently active job.
#[derive(Clone, Debug)]
pub struct TaskBlock {
	pub job_id: String,
	pub task_ids: Vec<usize>,
}

/// Outcome of running one task, fed back to the manager via
/// [`BatchJobManager::submit_result`]. A per-task fault is captured as an
/// error variant rather than propagated, so peer tasks in the same job keep
/// running (§4.L).
#[derive(Clone, Debug)]
pub enum BatchTaskOutcome {
	Ok { access: Vec<Vec<i64>>, dual: Vec<Vec<u32>> },
	Error(String),
}

#[derive(Clone, Debug)]
pub struct BatchTaskResult {
	pub job_id: String,
	pub task_id: usize,
	pub outcome: BatchTaskOutcome,
}

struct State {
	current: Option<BatchJob>,
	queue: VecDeque<BatchJob>,
	progress: Option<ProgressSink>,
}

/// Serialises all mutation of the job queue and current job behind one
/// lock, per §4.K/§5. `on_finalize` runs on a detached thread once a job's
/// `nTasksRemaining` reaches zero, handed ownership of the finished job (its
/// results buffer included) so a caller can render output rasters without
/// holding up task dispatch.
pub struct BatchJobManager {
	state: Mutex<State>,
	on_finalize: Arc<dyn Fn(BatchJob) + Send + Sync>,
	event_sink: Arc<dyn EventSink>,
}

impl BatchJobManager {
	pub fn new(on_finalize: impl Fn(BatchJob) + Send + Sync + 'static) -> BatchJobManager {
		BatchJobManager::with_event_sink(on_finalize, Arc::new(NullEventSink))
	}

	/// As [`Self::new`], but `event_sink` additionally receives the
	/// decimated begin/step/done/error progress events a batch client
	/// watches (§4.M), one [`ProgressSink`] per active job.
	pub fn with_event_sink(on_finalize: impl Fn(BatchJob) + Send + Sync + 'static, event_sink: Arc<dyn EventSink>) -> BatchJobManager {
		BatchJobManager {
			state: Mutex::new(State { current: None, queue: VecDeque::new(), progress: None }),
			on_finalize: Arc::new(on_finalize),
			event_sink,
		}
	}

	/// FIFO-enqueues `job`; promotes it to current immediately if no job is
	/// active. A job that is already complete at construction (every origin
	/// filtered out, per edge case §7.8) finalizes immediately instead of
	/// ever becoming current.
	pub fn add_job(&self, job: BatchJob) {
		info!("batch: job '{}' added ({} tasks)", job.id, job.n_tasks_total());
		let mut state = self.state.lock().unwrap();
		state.queue.push_back(job);
		self.promote_if_idle(&mut state);
	}

	/// Non-blocking; `None` iff no job is currently active. Otherwise a
	/// (possibly empty) block of up to `max_tasks` ascending task ids.
	pub fn get_tasks(&self, max_tasks: usize) -> Option<TaskBlock> {
		let mut state = self.state.lock().unwrap();
		let job = state.current.as_mut()?;
		Some(TaskBlock {
			job_id: job.id.clone(),
			task_ids: job.next_task_block(max_tasks),
		})
	}

	/// Accepts a result only for the currently active job; a job id
	/// mismatch, or no job being active at all, is a programmer error and
	/// panics rather than silently dropping the result. On the job's last
	/// result, schedules `on_finalize` on a detached thread and promotes
	/// the next queued job, if any.
	pub fn submit_result(&self, result: BatchTaskResult) {
		let finished = {
			let mut state = self.state.lock().unwrap();
			{
				let job = state
					.current
					.as_mut()
					.unwrap_or_else(|| panic!("submitResult for job {} but no job is active", result.job_id));
				assert_eq!(job.id, result.job_id, "submitResult job id {} does not match active job {}", result.job_id, job.id);
				if let BatchTaskOutcome::Ok { access, dual } = &result.outcome {
					for (ip, bins) in access.iter().enumerate() {
						job.results.set_access(result.task_id, ip, bins);
					}
					for (ip, duals) in dual.iter().enumerate() {
						job.results.set_dual(result.task_id, ip, duals);
					}
				}
				job.mark_complete(result.task_id);
				if let BatchTaskOutcome::Error(message) = &result.outcome {
					log::warn!("batch: job '{}' task {} failed: {message}", result.job_id, result.task_id);
				}
			}
			if let Some(progress) = &mut state.progress {
				progress.increment(1);
			}
			if state.current.as_ref().is_some_and(BatchJob::is_complete) {
				let job = state.current.take().unwrap();
				if let Some(mut progress) = state.progress.take() {
					progress.finish();
				}
				self.promote_if_idle(&mut state);
				Some(job)
			} else {
				None
			}
		};
		if let Some(job) = finished {
			info!("batch: job '{}' finalizing", job.id);
			let cb = Arc::clone(&self.on_finalize);
			std::thread::spawn(move || cb(job));
		}
	}

	/// Drops the current job if `org_id` matches its owner and promotes the
	/// next queued job. Returns `false`, leaving state untouched, if there
	/// is no current job or its owner differs. Never finalizes a cancelled
	/// job; late `submitResult` calls for it are rejected by the job-id
	/// assertion above.
	pub fn cancel_current_job(&self, org_id: &str) -> bool {
		let mut state = self.state.lock().unwrap();
		let matches = state.current.as_ref().is_some_and(|j| j.user_id == org_id);
		if matches {
			info!("batch: job '{}' cancelled by '{org_id}'", state.current.as_ref().unwrap().id);
			state.current = None;
			state.progress = None;
			self.promote_if_idle(&mut state);
		}
		matches
	}

	#[must_use]
	pub fn current_job_id(&self) -> Option<String> {
		self.state.lock().unwrap().current.as_ref().map(|j| j.id.clone())
	}

	/// A read-only snapshot of the named job's routing options, for a worker
	/// to run a task against without holding the manager lock. `None` if
	/// `job_id` is not the currently active job (it finished or was
	/// cancelled between dispatch and pickup).
	#[must_use]
	pub fn job_context(&self, job_id: &str) -> Option<JobContext> {
		let state = self.state.lock().unwrap();
		let job = state.current.as_ref()?;
		(job.id == job_id).then(|| job.context())
	}

	#[must_use]
	pub fn queue_len(&self) -> usize {
		self.state.lock().unwrap().queue.len()
	}

	/// Pops jobs off the queue until one is both current and incomplete, or
	/// the queue runs dry. A popped job that is already complete (every
	/// origin skipped) finalizes straight away rather than ever becoming
	/// current, matching edge case §7.8.
	fn promote_if_idle(&self, state: &mut MutexGuard<'_, State>) {
		while state.current.is_none() {
			let Some(next) = state.queue.pop_front() else { return };
			if next.is_complete() {
				info!("batch: job '{}' finalizing (every origin skipped)", next.id);
				let cb = Arc::clone(&self.on_finalize);
				std::thread::spawn(move || cb(next));
				continue;
			}
			info!("batch: job '{}' promoted to active ({} tasks)", next.id, next.n_tasks_remaining());
			let mut progress = ProgressSink::with_decimation(next.id.clone(), format!("batch job '{}'", next.id), next.n_tasks_remaining() as u64, Box::new(Arc::clone(&self.event_sink)), batch_decimation());
			progress.begin_task();
			state.progress = Some(progress);
			state.current = Some(next);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::BatchOptions;
	use isoraster_core::GeoBBox;
	use isoraster_core::GridScheme;
	use isoraster_propagation::OpportunityGrid;
	use std::sync::mpsc;

	fn grid() -> GridScheme {
		GridScheme::new(GeoBBox::new(0.0, 0.0, 1.0, 1.0).unwrap(), 4, 4).unwrap()
	}

	fn job_with_density(id: &str, org: &str, density: &[f32]) -> BatchJob {
		let origins = OpportunityGrid::from_dense(grid(), density);
		BatchJob::new(id, org, BatchOptions::new("net", "egress"), origins, None)
	}

	fn dense_density() -> Vec<f32> {
		vec![1.0f32; grid().len()]
	}

	#[test]
	fn all_skipped_job_finalizes_without_becoming_current() {
		let (tx, rx) = mpsc::channel::<String>();
		let manager = BatchJobManager::new(move |job| tx.send(job.id.clone()).unwrap());
		let job = job_with_density("empty", "org", &vec![0.0f32; grid().len()]);
		manager.add_job(job);
		assert_eq!(manager.current_job_id(), None);
		let finalized = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
		assert_eq!(finalized, "empty");
	}

	#[test]
	fn second_job_queues_until_first_completes() {
		let (tx, rx) = mpsc::channel::<String>();
		let manager = BatchJobManager::new(move |job| tx.send(job.id.clone()).unwrap());
		manager.add_job(job_with_density("j1", "org", &dense_density()));
		manager.add_job(job_with_density("j2", "org", &dense_density()));
		assert_eq!(manager.current_job_id(), Some("j1".to_string()));
		assert_eq!(manager.queue_len(), 1);

		loop {
			let Some(block) = manager.get_tasks(4) else { break };
			if block.task_ids.is_empty() {
				break;
			}
			for task_id in block.task_ids {
				manager.submit_result(BatchTaskResult {
					job_id: block.job_id.clone(),
					task_id,
					outcome: BatchTaskOutcome::Ok { access: vec![], dual: vec![] },
				});
			}
		}
		let finalized = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
		assert_eq!(finalized, "j1");
		assert_eq!(manager.current_job_id(), Some("j2".to_string()));
	}

	#[test]
	#[should_panic(expected = "does not match active job")]
	fn submit_result_for_wrong_job_panics() {
		let manager = BatchJobManager::new(|_| {});
		manager.add_job(job_with_density("j1", "org", &dense_density()));
		manager.submit_result(BatchTaskResult {
			job_id: "not-j1".into(),
			task_id: 0,
			outcome: BatchTaskOutcome::Ok { access: vec![], dual: vec![] },
		});
	}

	#[test]
	fn event_sink_sees_begin_and_done_for_each_job() {
		use isoraster_core::progress::{EventSink, ProgressEvent, ProgressEventKind};
		use std::sync::Mutex;

		struct RecordingSink(Mutex<Vec<ProgressEventKind>>);
		impl EventSink for RecordingSink {
			fn emit(&self, event: ProgressEvent) {
				self.0.lock().unwrap().push(event.kind);
			}
		}

		let recorder = Arc::new(RecordingSink(Mutex::new(Vec::new())));
		let (tx, rx) = mpsc::channel::<String>();
		let manager = BatchJobManager::with_event_sink(move |job| tx.send(job.id.clone()).unwrap(), Arc::clone(&recorder) as Arc<dyn EventSink>);
		manager.add_job(job_with_density("j1", "org", &dense_density()));

		loop {
			let Some(block) = manager.get_tasks(16) else { break };
			if block.task_ids.is_empty() {
				break;
			}
			for task_id in block.task_ids {
				manager.submit_result(BatchTaskResult {
					job_id: block.job_id.clone(),
					task_id,
					outcome: BatchTaskOutcome::Ok { access: vec![], dual: vec![] },
				});
			}
		}
		rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();

		let kinds = recorder.0.lock().unwrap();
		assert_eq!(kinds.first(), Some(&ProgressEventKind::Begin));
		assert_eq!(kinds.last(), Some(&ProgressEventKind::Done));
	}

	#[test]
	fn cancel_promotes_next_and_rejects_owner_mismatch() {
		let manager = BatchJobManager::new(|_| {});
		manager.add_job(job_with_density("j1", "org-a", &dense_density()));
		manager.add_job(job_with_density("j2", "org-b", &dense_density()));
		assert!(!manager.cancel_current_job("org-b"));
		assert_eq!(manager.current_job_id(), Some("j1".to_string()));
		assert!(manager.cancel_current_job("org-a"));
		assert_eq!(manager.current_job_id(), Some("j2".to_string()));
	}
}
