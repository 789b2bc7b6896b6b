//! The richer progress sink used by long-running background work (egress
//! builds, batch jobs): unlike [`crate::progress::ProgressBar`], which only
//! drives a terminal bar, a [`ProgressSink`] hands decimated progress
//! events to an external [`EventSink`], so a web handler or batch client can
//! stream `{id, type, title?, total?, step?, secRemain?}` payloads without
//! the core depending on any particular transport.

use std::time::{Duration, Instant};

/// One progress event, matching the `progress` payload shape in the
/// external-interfaces contract: `{id, type, title?, total?, step?,
/// secRemain?}`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
	pub id: String,
	pub kind: ProgressEventKind,
	pub title: Option<String>,
	pub total: Option<u64>,
	pub step: Option<u64>,
	pub sec_remain: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEventKind {
	Begin,
	Step,
	Done,
	Error,
}

/// External collaborator that a [`ProgressSink`] reports to. The core never
/// implements this itself; callers wire it to whatever transport (SSE,
/// websocket, log line) is appropriate for their deployment.
pub trait EventSink: Send + Sync {
	fn emit(&self, event: ProgressEvent);
}

/// A no-op [`EventSink`], used as the default for tests and for background
/// work nobody is watching.
pub struct NullEventSink;

impl EventSink for NullEventSink {
	fn emit(&self, _event: ProgressEvent) {}
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
	fn emit(&self, event: ProgressEvent) {
		(**self).emit(event);
	}
}

/// Decimation policy controlling how often a [`ProgressSink`] emits events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressDecimation {
	/// Minimum wall-clock gap between consecutive emitted events.
	pub min_time_between_events_msec: u64,
	/// Emit at most one event per this many `increment` calls.
	pub push_event_after: u64,
}

impl Default for ProgressDecimation {
	fn default() -> Self {
		ProgressDecimation {
			min_time_between_events_msec: 200,
			push_event_after: 1,
		}
	}
}

/// Tracks one task's progress and reports decimated events to an
/// [`EventSink`].
pub struct ProgressSink {
	id: String,
	title: String,
	total: u64,
	step: u64,
	start_time: Instant,
	last_emit_time: Instant,
	last_emit_step: u64,
	decimation: ProgressDecimation,
	sink: Box<dyn EventSink>,
}

impl ProgressSink {
	#[must_use]
	pub fn new(id: impl Into<String>, title: impl Into<String>, total: u64, sink: Box<dyn EventSink>) -> ProgressSink {
		ProgressSink::with_decimation(id, title, total, sink, ProgressDecimation::default())
	}

	#[must_use]
	pub fn with_decimation(
		id: impl Into<String>,
		title: impl Into<String>,
		total: u64,
		sink: Box<dyn EventSink>,
		decimation: ProgressDecimation,
	) -> ProgressSink {
		let now = Instant::now();
		ProgressSink {
			id: id.into(),
			title: title.into(),
			total,
			step: 0,
			start_time: now,
			last_emit_time: now,
			last_emit_step: 0,
			decimation,
			sink,
		}
	}

	/// Emits the `begin` event unconditionally.
	pub fn begin_task(&mut self) {
		self.sink.emit(ProgressEvent {
			id: self.id.clone(),
			kind: ProgressEventKind::Begin,
			title: Some(self.title.clone()),
			total: Some(self.total),
			step: Some(0),
			sec_remain: None,
		});
		self.last_emit_time = Instant::now();
		self.last_emit_step = 0;
	}

	/// Advances the step counter by `delta` and emits a `step` event if the
	/// decimation policy allows it.
	pub fn increment(&mut self, delta: u64) {
		self.step += delta;
		if self.step - self.last_emit_step < self.decimation.push_event_after {
			return;
		}
		let now = Instant::now();
		if now.duration_since(self.last_emit_time) < Duration::from_millis(self.decimation.min_time_between_events_msec) {
			return;
		}
		self.emit_step(now);
	}

	fn emit_step(&mut self, now: Instant) {
		let elapsed = now.duration_since(self.start_time).as_secs_f64();
		let sec_remain = if self.step == 0 || elapsed <= 0.0 {
			None
		} else {
			let rate = self.step as f64 / elapsed;
			Some(((self.total.saturating_sub(self.step)) as f64 / rate).max(0.0))
		};
		self.sink.emit(ProgressEvent {
			id: self.id.clone(),
			kind: ProgressEventKind::Step,
			title: None,
			total: Some(self.total),
			step: Some(self.step),
			sec_remain,
		});
		self.last_emit_time = now;
		self.last_emit_step = self.step;
	}

	/// Emits `done` unconditionally, ignoring decimation.
	pub fn finish(&mut self) {
		self.sink.emit(ProgressEvent {
			id: self.id.clone(),
			kind: ProgressEventKind::Done,
			title: None,
			total: Some(self.total),
			step: Some(self.total),
			sec_remain: Some(0.0),
		});
	}

	/// Emits `error` unconditionally, ignoring decimation.
	pub fn error(&mut self, message: impl Into<String>) {
		self.sink.emit(ProgressEvent {
			id: self.id.clone(),
			kind: ProgressEventKind::Error,
			title: Some(message.into()),
			total: Some(self.total),
			step: Some(self.step),
			sec_remain: None,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	#[derive(Default)]
	struct RecordingSink {
		events: Mutex<Vec<ProgressEvent>>,
	}

	impl EventSink for RecordingSink {
		fn emit(&self, event: ProgressEvent) {
			self.events.lock().unwrap().push(event);
		}
	}

	#[test]
	fn begin_and_finish_always_emit() {
		let recorder = Arc::new(RecordingSink::default());
		let mut progress = ProgressSink::new("job-1", "Egress build", 10, Box::new(Arc::clone(&recorder)));
		progress.begin_task();
		progress.finish();
		let events = recorder.events.lock().unwrap();
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].kind, ProgressEventKind::Begin);
		assert_eq!(events[1].kind, ProgressEventKind::Done);
	}

	#[test]
	fn decimation_drops_events_below_push_threshold() {
		let decimation = ProgressDecimation {
			min_time_between_events_msec: 0,
			push_event_after: 5,
		};
		let recorder = Arc::new(RecordingSink::default());
		let mut progress = ProgressSink::with_decimation("job-2", "Batch", 100, Box::new(Arc::clone(&recorder)), decimation);
		for _ in 0..4 {
			progress.increment(1);
		}
		assert_eq!(recorder.events.lock().unwrap().len(), 0);
		progress.increment(1);
		assert_eq!(recorder.events.lock().unwrap().len(), 1);
	}

	#[test]
	fn error_is_reported_with_message() {
		let recorder = Arc::new(RecordingSink::default());
		let mut progress = ProgressSink::new("job-3", "Batch", 1, Box::new(Arc::clone(&recorder)));
		progress.error("boom");
		let events = recorder.events.lock().unwrap();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, ProgressEventKind::Error);
		assert_eq!(events[0].title.as_deref(), Some("boom"));
	}
}
