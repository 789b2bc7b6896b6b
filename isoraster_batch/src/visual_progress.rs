//! Visual progress for batches (component 4.M): the `batch-sent` and
//! `batch-finished` event streams a client uses to reconstruct which origin
//! cells are queued, in flight, or done, without polling per-task state.

use serde::Serialize;

/// One origin cell's rectangle in grid units. `dx`/`dy` are always `1` for
/// the single-cell rectangles this crate emits; the field names match the
/// wire payload in §6 so a client can render without translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CellRect {
	pub x0: u32,
	pub y0: u32,
	pub dx: u32,
	pub dy: u32,
}

impl CellRect {
	#[must_use]
	pub fn for_cell(x: u32, y: u32) -> CellRect {
		CellRect { x0: x, y0: y, dx: 1, dy: 1 }
	}
}

/// External collaborator a [`crate::worker_pool::WorkerPool`] reports
/// queued/finished cell rectangles to. The core never implements a
/// transport itself; callers wire this to whatever channel (SSE,
/// websocket) serves their batch clients.
pub trait VisualProgressSink: Send + Sync {
	/// A block of cells was just handed to the queue.
	fn batch_sent(&self, job_id: &str, rects: &[CellRect]);
	/// One cell's task finished (successfully or not).
	fn batch_finished(&self, job_id: &str, rect: CellRect);
}

/// A no-op [`VisualProgressSink`], used when nobody is watching.
pub struct NullVisualProgressSink;

impl VisualProgressSink for NullVisualProgressSink {
	fn batch_sent(&self, _job_id: &str, _rects: &[CellRect]) {}
	fn batch_finished(&self, _job_id: &str, _rect: CellRect) {}
}

impl<T: VisualProgressSink + ?Sized> VisualProgressSink for std::sync::Arc<T> {
	fn batch_sent(&self, job_id: &str, rects: &[CellRect]) {
		(**self).batch_sent(job_id, rects);
	}
	fn batch_finished(&self, job_id: &str, rect: CellRect) {
		(**self).batch_finished(job_id, rect);
	}
}

/// Serializes a `batch-sent` payload: a JSON array of rectangles.
#[must_use]
pub fn batch_sent_json(rects: &[CellRect]) -> String {
	serde_json::to_string(rects).expect("CellRect serialization cannot fail")
}

/// Serializes a `batch-finished` payload: a single rectangle.
#[must_use]
pub fn batch_finished_json(rect: &CellRect) -> String {
	serde_json::to_string(rect).expect("CellRect serialization cannot fail")
}
