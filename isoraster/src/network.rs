//! JSON-file adapters for the routing crates' external collaborators (§6):
//! a [`StreetLayer`] over an explicit vertex/edge list, and a minimal
//! periodic-schedule [`TransitLayer`] for small demonstration networks. Real
//! deployments wire their own OSM- or GTFS-derived implementations; these
//! exist so the CLI subcommands have something runnable against a plain
//! text description.

use anyhow::{Context, Result, bail};
use isoraster_routing::{Split, StreetLayer, StreetMode, TransitLayer};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct StreetVertex {
	lon: f64,
	lat: f64,
}

#[derive(Deserialize)]
struct StreetEdge {
	from: u64,
	to: u64,
	distance_mm: u32,
}

#[derive(Deserialize)]
struct StreetFile {
	vertices: Vec<StreetVertex>,
	edges: Vec<StreetEdge>,
}

/// A street graph loaded from a JSON vertex/edge list. `find_split` snaps to
/// the nearest vertex within range rather than a true road-segment
/// projection, since the file format carries no edge geometry.
pub struct JsonStreetLayer {
	vertices: Vec<StreetVertex>,
	adjacency: Vec<Vec<(u64, u32)>>,
}

impl JsonStreetLayer {
	#[must_use]
	fn haversine_m(lon_a: f64, lat_a: f64, lon_b: f64, lat_b: f64) -> f64 {
		let dlon = (lon_a - lon_b) * isoraster_core::DEG_PER_METER.recip();
		let dlat = (lat_a - lat_b) * isoraster_core::DEG_PER_METER.recip();
		dlon.hypot(dlat)
	}
}

/// Loads a street graph from `<data_dir>/<network_id>.street.json`.
pub fn load_street(data_dir: &Path, network_id: &str) -> Result<JsonStreetLayer> {
	let path = data_dir.join(format!("{network_id}.street.json"));
	let text = std::fs::read_to_string(&path).with_context(|| format!("reading street file {}", path.display()))?;
	let file: StreetFile = serde_json::from_str(&text).with_context(|| format!("parsing street file {}", path.display()))?;
	if file.vertices.is_empty() {
		bail!("street file {} has no vertices", path.display());
	}

	let mut adjacency = vec![Vec::new(); file.vertices.len()];
	for edge in &file.edges {
		let (from, to) = (edge.from as usize, edge.to as usize);
		if from >= adjacency.len() || to >= adjacency.len() {
			bail!("street file {} references out-of-range vertex in edge {from}->{to}", path.display());
		}
		adjacency[from].push((edge.to, edge.distance_mm));
		adjacency[to].push((edge.from, edge.distance_mm));
	}

	Ok(JsonStreetLayer { vertices: file.vertices, adjacency })
}

impl StreetLayer for JsonStreetLayer {
	fn vertex_count(&self) -> usize {
		self.vertices.len()
	}

	fn vertex_lon_lat(&self, vertex: u64) -> (f64, f64) {
		let v = &self.vertices[vertex as usize];
		(v.lon, v.lat)
	}

	fn find_split(&self, lon: f64, lat: f64, radius_m: f64, _mode: StreetMode) -> Option<Split> {
		let mut best: Option<(u64, f64)> = None;
		for (idx, vertex) in self.vertices.iter().enumerate() {
			let d = Self::haversine_m(lon, lat, vertex.lon, vertex.lat);
			if d <= radius_m && best.is_none_or(|(_, best_d)| d < best_d) {
				best = Some((idx as u64, d));
			}
		}
		best.map(|(vertex, d)| {
			let dist_mm = (d * 1000.0).round() as u32;
			Split { vertex_a: vertex, dist_a_mm: dist_mm, vertex_b: vertex, dist_b_mm: dist_mm }
		})
	}

	fn edges_from(&self, vertex: u64) -> Vec<(u64, u32)> {
		self.adjacency[vertex as usize].clone()
	}
}

#[derive(Deserialize)]
struct TransitStop {
	street_vertex: Option<u64>,
}

/// A periodic single route: every `headway_sec` a trip departs `stops[0]`
/// at the route's own first-departure clock time and arrives at
/// `stops[i]` `offsets_sec[i]` seconds later, until `last_departure_sec`.
#[derive(Deserialize)]
struct TransitRoute {
	stops: Vec<usize>,
	offsets_sec: Vec<u32>,
	first_departure_sec: u32,
	last_departure_sec: u32,
	headway_sec: u32,
}

#[derive(Deserialize)]
struct TransitFile {
	stops: Vec<TransitStop>,
	routes: Vec<TransitRoute>,
}

/// A minimal periodic-schedule transit layer loaded from
/// `<data_dir>/<network_id>.transit.json`. Each route is a fixed stop
/// sequence served at a constant headway; `multi_departure_search` follows
/// at most one boarding per reached stop (no transfers), which is enough to
/// exercise the propagation pipeline against small demonstration networks
/// without reimplementing a full RAPTOR search in CLI glue.
pub struct ScheduleTransitLayer {
	stops: Vec<TransitStop>,
	routes: Vec<TransitRoute>,
}

/// Loads a transit schedule, or `None` if the network has no transit file
/// (a pure-street network).
pub fn load_transit(data_dir: &Path, network_id: &str) -> Result<Option<ScheduleTransitLayer>> {
	let path = data_dir.join(format!("{network_id}.transit.json"));
	if !path.exists() {
		return Ok(None);
	}
	let text = std::fs::read_to_string(&path).with_context(|| format!("reading transit file {}", path.display()))?;
	let file: TransitFile = serde_json::from_str(&text).with_context(|| format!("parsing transit file {}", path.display()))?;
	Ok(Some(ScheduleTransitLayer { stops: file.stops, routes: file.routes }))
}

/// A zero-stop transit layer, used when a network has no schedule at all so
/// [`isoraster_routing::build_egress_table`] still has a concrete
/// [`TransitLayer`] to call (its stop loop is simply a no-op).
pub struct NoTransitLayer;

impl TransitLayer for NoTransitLayer {
	fn stop_count(&self) -> usize {
		0
	}
	fn stop_street_vertex(&self, _stop: usize) -> Option<u64> {
		None
	}
	fn multi_departure_search(&self, _origin_arrivals: &[(usize, u32)], _window_start_sec: u32, _window_end_sec: u32) -> Vec<Vec<u32>> {
		Vec::new()
	}
}

impl TransitLayer for ScheduleTransitLayer {
	fn stop_count(&self) -> usize {
		self.stops.len()
	}

	fn stop_street_vertex(&self, stop: usize) -> Option<u64> {
		self.stops[stop].street_vertex
	}

	fn multi_departure_search(&self, origin_arrivals: &[(usize, u32)], window_start_sec: u32, window_end_sec: u32) -> Vec<Vec<u32>> {
		if window_end_sec <= window_start_sec {
			return Vec::new();
		}
		let n_stops = self.stops.len();
		let mut out = Vec::new();
		let mut departure = window_start_sec;
		while departure < window_end_sec {
			let mut arrivals = vec![isoraster_core::MAX_SEC; n_stops];
			for &(stop, walk_duration_sec) in origin_arrivals {
				if stop >= n_stops {
					continue;
				}
				let clock_at_stop = departure + walk_duration_sec;
				for route in &self.routes {
					let Some(board_idx) = route.stops.iter().position(|&s| s == stop) else {
						continue;
					};
					if clock_at_stop > route.last_departure_sec || route.headway_sec == 0 {
						continue;
					}
					let board_offset = route.offsets_sec[board_idx];
					let earliest_departure = clock_at_stop.saturating_sub(board_offset).max(route.first_departure_sec);
					let headways_elapsed = (earliest_departure - route.first_departure_sec).div_ceil(route.headway_sec);
					let trip_departure = route.first_departure_sec + headways_elapsed * route.headway_sec;
					if trip_departure > route.last_departure_sec {
						continue;
					}
					for (i, &dest_stop) in route.stops.iter().enumerate() {
						if i < board_idx {
							continue;
						}
						let arrival_clock = trip_departure + route.offsets_sec[i];
						let duration_from_origin = arrival_clock.saturating_sub(departure);
						if duration_from_origin < arrivals[dest_stop] {
							arrivals[dest_stop] = duration_from_origin;
						}
					}
				}
			}
			out.push(arrivals);
			departure += 60;
		}
		out
	}
}
