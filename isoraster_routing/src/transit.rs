//! Transit search: the external [`TransitLayer`] collaborator and the
//! schedule-based multi-departure search (RAPTOR-style) that reduces a
//! departure window into a [`TransitTimeSurface`].

use isoraster_core::MAX_SEC;

/// Maximum number of transfers a transit search will take, per the
/// reference implementation.
pub const MAX_RIDES: u32 = 3;

/// The external transit-schedule collaborator: stop count, per-stop
/// street-vertex linkage, and a schedule-based multi-departure search. The
/// core never implements this itself — callers wire it to their own GTFS-
/// derived schedule.
pub trait TransitLayer: Send + Sync {
	fn stop_count(&self) -> usize;

	/// The street-graph vertex nearest `stop`, if the stop has street
	/// access at all.
	fn stop_street_vertex(&self, stop: usize) -> Option<u64>;

	/// Runs every departure minute in `[window_start, window_end)` from the
	/// reached stops in `origin_arrivals` (stop -> first-arrival seconds
	/// from the street search), limited to [`MAX_RIDES`] rides, and returns
	/// `arrivals[departure_idx][stop]` in seconds (unreached = `MAX_SEC`).
	fn multi_departure_search(
		&self,
		origin_arrivals: &[(usize, u32)],
		window_start_sec: u32,
		window_end_sec: u32,
	) -> Vec<Vec<u32>>;
}

/// Per-stop `min`/`avg`/`max` arrival times in seconds over a sample of
/// departure minutes, the transit analogue of [`isoraster_core::Durations`]
/// but indexed by stop rather than by cell.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitTimeSurface {
	min: Vec<u32>,
	avg: Vec<u32>,
	max: Vec<u32>,
}

impl TransitTimeSurface {
	#[must_use]
	pub fn unreached(n_stops: usize) -> TransitTimeSurface {
		TransitTimeSurface {
			min: vec![MAX_SEC; n_stops],
			avg: vec![MAX_SEC; n_stops],
			max: vec![MAX_SEC; n_stops],
		}
	}

	pub fn set(&mut self, stop: usize, min: u32, avg: u32, max: u32) {
		self.min[stop] = min;
		self.avg[stop] = avg;
		self.max[stop] = max;
	}

	#[must_use]
	pub fn min(&self, stop: u32) -> u32 {
		self.min.get(stop as usize).copied().unwrap_or(MAX_SEC)
	}

	#[must_use]
	pub fn avg(&self, stop: u32) -> u32 {
		self.avg.get(stop as usize).copied().unwrap_or(MAX_SEC)
	}

	#[must_use]
	pub fn max(&self, stop: u32) -> u32 {
		self.max.get(stop as usize).copied().unwrap_or(MAX_SEC)
	}

	/// `true` if no stop was ever reached.
	#[must_use]
	pub fn is_all_unreached(&self) -> bool {
		self.min.iter().all(|&v| v >= MAX_SEC)
	}
}

/// Reduces `arrivals[departure_idx][stop]` (as returned by
/// [`TransitLayer::multi_departure_search`]) into a [`TransitTimeSurface`]:
/// per stop, the min/median/max over departures that reached it. Median
/// stands in for "avg" per the reference implementation; see design note on
/// the avg-surface open question.
#[must_use]
pub fn reduce_transit_search(arrivals: &[Vec<u32>], n_stops: usize) -> TransitTimeSurface {
	let mut surface = TransitTimeSurface::unreached(n_stops);
	if arrivals.is_empty() {
		return surface;
	}
	for stop in 0..n_stops {
		let mut times: Vec<u32> = arrivals
			.iter()
			.filter_map(|row| row.get(stop).copied())
			.filter(|&t| t < MAX_SEC)
			.collect();
		if times.is_empty() {
			continue;
		}
		times.sort_unstable();
		let min = times[0];
		let max = *times.last().unwrap();
		let avg = times[times.len() / 2];
		surface.set(stop, min, avg, max);
	}
	surface
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reduce_picks_min_median_max_per_stop() {
		// Stop 0 reached at 100s, 200s, 300s across three departures; stop 1 never reached.
		let arrivals = vec![
			vec![100, MAX_SEC],
			vec![200, MAX_SEC],
			vec![300, MAX_SEC],
		];
		let surface = reduce_transit_search(&arrivals, 2);
		assert_eq!(surface.min(0), 100);
		assert_eq!(surface.avg(0), 200);
		assert_eq!(surface.max(0), 300);
		assert_eq!(surface.min(1), MAX_SEC);
		assert!(!surface.is_all_unreached());
	}

	#[test]
	fn empty_arrivals_is_all_unreached() {
		let surface = reduce_transit_search(&[], 3);
		assert!(surface.is_all_unreached());
	}
}
