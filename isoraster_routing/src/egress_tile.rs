//! Egress-time tiles (component 4.D): per-tile compact lists of reached
//! transit stops plus per-cell walk times, and their evaluation against a
//! [`TransitTimeSurface`] into per-cell durations.

use crate::TransitTimeSurface;
use isoraster_core::{Durations, MAX_SEC, TILE_SPAN};

/// A tile's worth of egress times: the stops that reach any cell in this
/// tile, and per-stop per-cell walk seconds. A tile reached by no stop is
/// represented as `None` in the enclosing
/// [`isoraster_core::SparseTileArray`], never allocated here.
#[derive(Clone, Debug, PartialEq)]
pub struct EgressTimeTile {
	pub stop_ids: Vec<u32>,
	/// `dist_sec[s][ic]`, one row per entry in `stop_ids`.
	pub dist_sec: Vec<Vec<u32>>,
}

impl EgressTimeTile {
	const LEN: usize = TILE_SPAN * TILE_SPAN;

	#[must_use]
	pub fn new() -> EgressTimeTile {
		EgressTimeTile {
			stop_ids: Vec::new(),
			dist_sec: Vec::new(),
		}
	}

	/// Appends a stop's per-cell walk seconds if it reaches at least one
	/// cell; no-op otherwise. Called from the egress builder once per
	/// `(stop, tile)` pair under the tile's lock.
	pub fn push_stop(&mut self, stop_id: u32, per_cell_sec: Vec<u32>) {
		debug_assert_eq!(per_cell_sec.len(), Self::LEN);
		if per_cell_sec.iter().any(|&v| v < MAX_SEC) {
			self.stop_ids.push(stop_id);
			self.dist_sec.push(per_cell_sec);
		}
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.stop_ids.is_empty()
	}
}

impl Default for EgressTimeTile {
	fn default() -> Self {
		EgressTimeTile::new()
	}
}

/// Evaluates an egress tile against a transit-time surface for one
/// percentile (min/avg/max), producing per-cell durations (component 4.D).
/// `out[ic] = min over stops s of stopTime[s] + distSec[s][ic]`, short-
/// circuiting to `None` if no cell is ever reached.
#[must_use]
fn evaluate_one(tile: &EgressTimeTile, stop_time: impl Fn(u32) -> u32) -> Option<Vec<u32>> {
	let mut out = vec![MAX_SEC; EgressTimeTile::LEN];
	let mut any_reached = false;

	for (s, &stop_id) in tile.stop_ids.iter().enumerate() {
		let ts = stop_time(stop_id);
		if ts >= MAX_SEC {
			continue;
		}
		let row = &tile.dist_sec[s];
		for ic in 0..EgressTimeTile::LEN {
			let te = row[ic];
			if te >= MAX_SEC {
				continue;
			}
			let t = ts.saturating_add(te);
			if t < out[ic] && t < MAX_SEC {
				out[ic] = t;
				any_reached = true;
			}
		}
	}

	any_reached.then_some(out)
}

/// Evaluates an egress tile against all three percentiles of a
/// [`TransitTimeSurface`], short-circuiting the whole tile to `None` if the
/// `min` percentile produces no reached cell (per the spec's pseudocode).
#[must_use]
pub fn evaluate_egress_tile(tile: &EgressTimeTile, surface: &TransitTimeSurface) -> Option<Durations> {
	let min = evaluate_one(tile, |stop| surface.min(stop))?;
	let avg = evaluate_one(tile, |stop| surface.avg(stop)).unwrap_or_else(|| vec![MAX_SEC; EgressTimeTile::LEN]);
	let max = evaluate_one(tile, |stop| surface.max(stop)).unwrap_or_else(|| vec![MAX_SEC; EgressTimeTile::LEN]);
	Some(Durations { min, avg, max })
}
