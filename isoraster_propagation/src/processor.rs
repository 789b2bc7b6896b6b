//! The one-to-many processor (component 4.I): runs a street search, an
//! optional schedule-based transit search, and a tile-by-tile propagation
//! pass for a single origin, producing per-cell travel-time durations and an
//! opportunity-access histogram.

use anyhow::Result;
use isoraster_core::{AccessHistogram, DEG_PER_METER, Durations, GeoBBox, GridScheme, MAX_SEC, SPEED_MM_SEC};
use isoraster_routing::{
	StreetLayer, StreetMode, StreetVertexCosts, SparseEgressTable, TransitLayer, CostUnits, evaluate_connectors_durations, evaluate_egress_tile,
	reduce_transit_search, street_search_duration,
};

use crate::OpportunityGrid;

/// Which travel modes a request should search. Walking street access is
/// always part of a request; `transit` gates whether the schedule-based
/// search runs at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ModeSet {
	pub transit: bool,
}

/// A one-to-many request, per §4.I: an origin point, a mode set, a
/// departure window, and the ids of the network/egress table/destination
/// grid to run against. `street_search_radius_m`, when set, overrides the
/// straight-line radius used to bound street output; otherwise it is
/// derived from `max_duration_min` at walking speed.
#[derive(Clone, Debug)]
pub struct OneToManyOptions {
	pub origin_lon: f64,
	pub origin_lat: f64,
	pub modes: ModeSet,
	pub window_start_sec: u32,
	pub window_end_sec: u32,
	pub max_duration_min: u32,
	pub network_id: String,
	pub egress_id: String,
	pub destination_id: Option<String>,
	pub cutoffs_min: Option<Vec<u32>>,
	pub percentiles: Option<Vec<u32>>,
	pub dual_max_n: usize,
	pub street_search_radius_m: Option<f64>,
}

/// Maximum street-search time budget, per §4.I step 2: `min(duration, 60)`
/// minutes regardless of the request's full duration.
const STREET_SEARCH_CAP_MIN: u32 = 60;

/// Result of a one-to-many run: dense per-cell durations over the egress
/// table's full grid, the request's opportunity-access histogram, and its
/// dual (nearest-N) representation.
#[derive(Clone, Debug)]
pub struct OneToManyResult {
	pub grid: GridScheme,
	pub durations: Durations,
	pub histogram: AccessHistogram,
	pub dual: Vec<u32>,
}

impl OneToManyResult {
	fn empty(grid: GridScheme, dual_max_n: usize) -> OneToManyResult {
		let histogram = AccessHistogram::new();
		let dual = histogram.dual(dual_max_n);
		OneToManyResult {
			durations: Durations::unreached(grid.len()),
			grid,
			histogram,
			dual,
		}
	}
}

/// Runs the pipeline described in §4.I for a single origin.
///
/// `transit` is `None` when the network has no transit layer at all;
/// `options.modes.transit` additionally gates whether it is consulted even
/// when present.
pub fn run_one_to_many(
	street: &dyn StreetLayer,
	transit: Option<&dyn TransitLayer>,
	egress: &SparseEgressTable,
	opportunities: Option<&OpportunityGrid>,
	options: &OneToManyOptions,
) -> Result<OneToManyResult> {
	let grid = *egress.grid();

	// Step 2: street search, time-limited to min(duration, 60) minutes.
	let Some(split) = street.find_split(options.origin_lon, options.origin_lat, isoraster_core::MAX_CONNECTOR_LENGTH_METERS, StreetMode::Walk) else {
		// Origin cannot be placed on the street graph: not an error, yield an empty result.
		return Ok(OneToManyResult::empty(grid, options.dual_max_n));
	};
	let search_budget_sec = u64::from(options.max_duration_min.min(STREET_SEARCH_CAP_MIN)) * 60;
	let street_costs = search_from_split(street, split, search_budget_sec);

	// Step 3: street output bounds use the straight-line radius, not the reached vertex set.
	let duration_sec = f64::from(options.max_duration_min) * 60.0;
	let walk_speed_m_sec = f64::from(SPEED_MM_SEC) / 1000.0;
	let street_radius_m = options.street_search_radius_m.unwrap_or(duration_sec * walk_speed_m_sec);
	let street_bounds = radius_bbox(options.origin_lon, options.origin_lat, street_radius_m);

	// Step 4: transit search, skipped per the gating conditions in §4.I.
	let origin_arrivals: Vec<(usize, u32)> = transit.map_or_else(Vec::new, |t| {
		(0..t.stop_count())
			.filter_map(|stop| {
				let vertex = t.stop_street_vertex(stop)?;
				let sec = street_costs.cost(vertex)?;
				Some((stop, sec))
			})
			.collect()
	});

	let mut expanded_bounds = street_bounds;
	let surface = if options.modes.transit && !origin_arrivals.is_empty() {
		if let Some(t) = transit {
			let arrivals = t.multi_departure_search(&origin_arrivals, options.window_start_sec, options.window_end_sec);
			let surface = reduce_transit_search(&arrivals, t.stop_count());
			if let Some(stop_bounds) = reached_stop_bounds(street, t, &surface) {
				let widened = widen(&stop_bounds, street_radius_m);
				expanded_bounds = expanded_bounds.extended(&widened);
			}
			Some(surface)
		} else {
			None
		}
	} else {
		None
	};

	// Step 5: propagation pass over every tile the expanded bounds touch.
	let cap_sec = (duration_sec.round() as u32).min(MAX_SEC);
	let mut durations = Durations::unreached(grid.len());
	let mut histogram = AccessHistogram::new();

	let range = grid.tile_range_for(&expanded_bounds);
	range.for_each_flat_parent_index(|flat_tile| {
		let transit_durations = surface
			.as_ref()
			.and_then(|surface| egress.egress_tile(flat_tile).and_then(|tile| evaluate_egress_tile(tile, surface)))
			.map(|d| d.capped(cap_sec));

		let street_durations = egress
			.connector_tile(flat_tile)
			.and_then(|tile| evaluate_connectors_durations(tile, &street_costs))
			.map(|d| d.capped(cap_sec));

		let merged = match (street_durations, transit_durations) {
			(Some(a), Some(b)) => a.merge(&b),
			(Some(a), None) => a,
			(None, Some(b)) => b,
			(None, None) => return,
		};

		if let Some(opportunities) = opportunities {
			if let Some(opp_tile) = opportunities.tile(flat_tile) {
				accumulate_histogram(&mut histogram, &merged, opp_tile);
			}
		}

		scatter_into_grid(&grid, flat_tile, &merged, &mut durations);
	});

	let dual = histogram.dual(options.dual_max_n);
	Ok(OneToManyResult { grid, durations, histogram, dual })
}

/// Runs [`street_search_duration`] from both anchor vertices of a split,
/// each offset by its sub-edge distance converted to seconds, keeping the
/// cheaper cost per reached vertex.
fn search_from_split(street: &dyn StreetLayer, split: isoraster_routing::Split, budget_sec: u64) -> StreetVertexCosts {
	let mm_to_sec = |mm: u32| (f64::from(mm) / f64::from(SPEED_MM_SEC)).round() as u64;

	let mut costs = std::collections::HashMap::new();
	for (vertex, offset_mm) in [(split.vertex_a, split.dist_a_mm), (split.vertex_b, split.dist_b_mm)] {
		let offset_sec = mm_to_sec(offset_mm);
		if offset_sec > budget_sec {
			continue;
		}
		let side = street_search_duration(street, vertex, budget_sec - offset_sec);
		for (v, cost) in side.costs {
			let total = cost as u64 + offset_sec;
			let total = total.min(u32::MAX as u64) as u32;
			costs.entry(v).and_modify(|c: &mut u32| *c = (*c).min(total)).or_insert(total);
		}
	}
	StreetVertexCosts { units: CostUnits::DurationSec, costs }
}

/// Geographic bounding box of radius `radius_m` meters around `(lon, lat)`.
fn radius_bbox(lon: f64, lat: f64, radius_m: f64) -> GeoBBox {
	let dlat = radius_m * DEG_PER_METER;
	let dlon = dlat / lat.to_radians().cos().max(1e-6);
	GeoBBox::new_save(lon - dlon, lat - dlat, lon + dlon, lat + dlat).expect("radius_bbox always sorted")
}

fn widen(bounds: &GeoBBox, radius_m: f64) -> GeoBBox {
	let widened = radius_bbox((bounds.x_min + bounds.x_max) / 2.0, (bounds.y_min + bounds.y_max) / 2.0, radius_m);
	bounds.extended(&widened)
}

/// Bounding box of every stop that [`reduce_transit_search`] actually
/// reached, or `None` if none were. Stops resolve to a location through
/// their linked street vertex, since `TransitLayer` carries no coordinates
/// of its own.
fn reached_stop_bounds(street: &dyn StreetLayer, transit: &dyn TransitLayer, surface: &isoraster_routing::TransitTimeSurface) -> Option<GeoBBox> {
	let mut bounds: Option<GeoBBox> = None;
	for stop in 0..transit.stop_count() {
		if surface.min(stop as u32) >= MAX_SEC {
			continue;
		}
		let Some(vertex) = transit.stop_street_vertex(stop) else {
			continue;
		};
		let (lon, lat) = street.vertex_lon_lat(vertex);
		let point = GeoBBox::new_save(lon, lat, lon, lat).ok()?;
		bounds = Some(match bounds {
			Some(b) => b.extended(&point),
			None => point,
		});
	}
	bounds
}

/// Adds one tile's reached opportunities into `histogram`, per minute bin,
/// using the `min` percentile's durations to decide when each opportunity
/// becomes reachable (per §4.I step 5).
fn accumulate_histogram(histogram: &mut AccessHistogram, durations: &Durations, opportunities: &crate::OpportunityTile) {
	for (ic, &count) in opportunities.counts.iter().enumerate() {
		let truncated = count as i64;
		if truncated <= 0 {
			continue;
		}
		let seconds = durations.min[ic];
		if seconds >= MAX_SEC {
			continue;
		}
		histogram.add(seconds, truncated);
	}
}

/// Writes one tile's merged durations into the request's dense output
/// grid at the tile's cell offset.
fn scatter_into_grid(grid: &GridScheme, flat_tile: usize, merged: &Durations, out: &mut Durations) {
	let tiles_w = grid.tiles_w();
	let tx = (flat_tile as u32) % tiles_w;
	let ty = (flat_tile as u32) / tiles_w;
	let span = isoraster_core::TILE_SPAN as u32;

	for ly in 0..span {
		let cy = ty * span + ly;
		if cy >= grid.h() {
			continue;
		}
		for lx in 0..span {
			let cx = tx * span + lx;
			if cx >= grid.w() {
				continue;
			}
			let ic = grid.cell_to_tile_local_flat(cx, cy);
			let flat = grid.cell_to_flat(cx, cy);
			out.min[flat] = merged.min[ic];
			out.avg[flat] = merged.avg[ic];
			out.max[flat] = merged.max[ic];
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use isoraster_routing::{Split, build_egress_table};
	use std::collections::HashMap;

	struct LineStreet {
		lon_lat: Vec<(f64, f64)>,
		edges: HashMap<u64, Vec<(u64, u32)>>,
	}

	impl LineStreet {
		fn new() -> LineStreet {
			let lon_lat = vec![(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0)];
			let mut edges: HashMap<u64, Vec<(u64, u32)>> = HashMap::new();
			for v in 0..lon_lat.len() as u64 {
				let mut list = Vec::new();
				if v > 0 {
					list.push((v - 1, 111_000));
				}
				if v + 1 < lon_lat.len() as u64 {
					list.push((v + 1, 111_000));
				}
				edges.insert(v, list);
			}
			LineStreet { lon_lat, edges }
		}
	}

	impl StreetLayer for LineStreet {
		fn vertex_count(&self) -> usize {
			self.lon_lat.len()
		}
		fn vertex_lon_lat(&self, vertex: u64) -> (f64, f64) {
			self.lon_lat[vertex as usize]
		}
		fn find_split(&self, lon: f64, lat: f64, radius_m: f64, _mode: StreetMode) -> Option<Split> {
			let mut best: Option<(u64, f64)> = None;
			for (v, &(vlon, vlat)) in self.lon_lat.iter().enumerate() {
				let d_m = ((vlon - lon).powi(2) + (vlat - lat).powi(2)).sqrt() * 111_000.0;
				if best.is_none_or(|(_, bd)| d_m < bd) {
					best = Some((v as u64, d_m));
				}
			}
			let (v, d_m) = best?;
			(d_m <= radius_m).then_some(Split {
				vertex_a: v,
				dist_a_mm: (d_m * 1000.0) as u32,
				vertex_b: v,
				dist_b_mm: (d_m * 1000.0) as u32,
			})
		}
		fn edges_from(&self, vertex: u64) -> Vec<(u64, u32)> {
			self.edges.get(&vertex).cloned().unwrap_or_default()
		}
	}

	struct NoStops;
	impl TransitLayer for NoStops {
		fn stop_count(&self) -> usize {
			0
		}
		fn stop_street_vertex(&self, _stop: usize) -> Option<u64> {
			None
		}
		fn multi_departure_search(&self, _o: &[(usize, u32)], _s: u32, _e: u32) -> Vec<Vec<u32>> {
			vec![]
		}
	}

	fn options() -> OneToManyOptions {
		OneToManyOptions {
			origin_lon: 0.0,
			origin_lat: 0.0,
			modes: ModeSet { transit: false },
			window_start_sec: 0,
			window_end_sec: 3600,
			max_duration_min: 30,
			network_id: "net".into(),
			egress_id: "egress".into(),
			destination_id: None,
			cutoffs_min: None,
			percentiles: None,
			dual_max_n: 6,
			street_search_radius_m: None,
		}
	}

	#[test]
	fn reaches_nearby_cells_with_street_only() {
		let street = LineStreet::new();
		let transit = NoStops;
		let egress = build_egress_table(&street, &transit, 500.0).unwrap();
		let result = run_one_to_many(&street, None, &egress, None, &options()).unwrap();
		let origin_flat = result.grid.lon_lat_to_flat(0.0, 0.0).unwrap();
		assert!(result.durations.min[origin_flat] < MAX_SEC);
	}

	#[test]
	fn unplaceable_origin_yields_empty_result() {
		let street = LineStreet::new();
		let transit = NoStops;
		let egress = build_egress_table(&street, &transit, 500.0).unwrap();
		let mut opts = options();
		opts.origin_lon = 50.0;
		opts.origin_lat = 50.0;
		let result = run_one_to_many(&street, None, &egress, None, &opts).unwrap();
		assert!(result.durations.is_all_unreached());
		assert_eq!(result.histogram.density, [0; isoraster_core::BINS]);
	}

	#[test]
	fn opportunities_accumulate_into_histogram() {
		let street = LineStreet::new();
		let transit = NoStops;
		let egress = build_egress_table(&street, &transit, 500.0).unwrap();
		let mut density = vec![0.0f32; egress.grid().len()];
		let origin_flat = egress.grid().lon_lat_to_flat(0.0, 0.0).unwrap();
		density[origin_flat] = 3.0;
		let opportunities = OpportunityGrid::from_dense(*egress.grid(), &density);

		let result = run_one_to_many(&street, None, &egress, Some(&opportunities), &options()).unwrap();
		let total: i64 = result.histogram.density.iter().sum();
		assert_eq!(total, 3);
	}
}
