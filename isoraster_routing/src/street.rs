//! Street-graph search: the external [`StreetLayer`] collaborator and the
//! Dijkstra-style shortest-path search built on top of it.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A street-mode split found by [`StreetLayer::find_split`]: the two
/// bounding vertices of the nearest road edge and the sub-edge distances
/// from the probed point to each, in millimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Split {
	pub vertex_a: u64,
	pub dist_a_mm: u32,
	pub vertex_b: u64,
	pub dist_b_mm: u32,
}

/// Transport mode a street search can be restricted to. `Walk` is the only
/// mode the egress builder and one-to-many processor currently drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreetMode {
	Walk,
}

/// The external street-graph collaborator: a vertex store with random
/// access and geographic coordinates, a nearest-split finder, and a
/// shortest-path router that minimises either seconds or millimeters. The
/// core never implements this itself — callers wire it to their own road
/// network.
pub trait StreetLayer: Send + Sync {
	/// Number of vertices in the graph.
	fn vertex_count(&self) -> usize;

	/// Longitude/latitude of a vertex.
	fn vertex_lon_lat(&self, vertex: u64) -> (f64, f64);

	/// Nearest road split to `(lon, lat)` within `radius_m`, or `None` if no
	/// road lies within range for `mode`.
	fn find_split(&self, lon: f64, lat: f64, radius_m: f64, mode: StreetMode) -> Option<Split>;

	/// Edges leaving `vertex`: `(neighbor, distance_mm)`. Used by the
	/// shortest-path search; walking is assumed undirected, so callers may
	/// return an edge once and rely on the caller relaxing both directions
	/// if their graph is stored that way, or return edges symmetrically if
	/// it is not.
	fn edges_from(&self, vertex: u64) -> Vec<(u64, u32)>;
}

/// Cost unit a [`StreetVertexCosts`] table is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostUnits {
	DistanceMm,
	DurationSec,
}

/// Per-vertex costs from a single shortest-path search, as consumed by
/// street-connector evaluation (component 4.C). Vertices absent from
/// `costs` are treated as unreached.
#[derive(Clone, Debug)]
pub struct StreetVertexCosts {
	pub units: CostUnits,
	pub costs: HashMap<u64, u32>,
}

impl StreetVertexCosts {
	#[must_use]
	pub fn cost(&self, vertex: u64) -> Option<u32> {
		self.costs.get(&vertex).copied()
	}

	/// Geographic bounding box of every reached vertex, or `None` if the
	/// search reached nothing.
	#[must_use]
	pub fn bounds(&self, layer: &dyn StreetLayer) -> Option<(f64, f64, f64, f64)> {
		let mut bounds: Option<(f64, f64, f64, f64)> = None;
		for &vertex in self.costs.keys() {
			let (lon, lat) = layer.vertex_lon_lat(vertex);
			bounds = Some(match bounds {
				None => (lon, lat, lon, lat),
				Some((x0, y0, x1, y1)) => (x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat)),
			});
		}
		bounds
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
	cost: u32,
	vertex: u64,
}

impl Ord for HeapEntry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.cost.cmp(&other.cost).then_with(|| self.vertex.cmp(&other.vertex))
	}
}

impl PartialOrd for HeapEntry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

/// Dijkstra search from `origin`, minimizing distance-millimeters, limited
/// to `radius_mm`. Used by the egress-table builder (component 4.E) to find
/// every street vertex within `egressRadiusMeters` of a transit stop.
#[must_use]
pub fn street_search_distance(layer: &dyn StreetLayer, origin: u64, radius_mm: u64) -> StreetVertexCosts {
	street_search(layer, origin, radius_mm, CostUnits::DistanceMm, |edge_mm| u64::from(edge_mm))
}

/// Dijkstra search from `origin`, minimizing seconds at walking speed,
/// limited to `radius_sec` (seconds). Used by the one-to-many processor
/// (component 4.I) to bound the origin's street search by a time budget.
#[must_use]
pub fn street_search_duration(layer: &dyn StreetLayer, origin: u64, radius_sec: u64) -> StreetVertexCosts {
	let speed_mm_sec = f64::from(isoraster_core::SPEED_MM_SEC);
	street_search(layer, origin, radius_sec, CostUnits::DurationSec, move |edge_mm| {
		(f64::from(edge_mm) / speed_mm_sec).round() as u64
	})
}

/// Generic Dijkstra: `edge_cost` converts a raw edge distance (mm) into
/// whatever unit `limit` is expressed in.
fn street_search(
	layer: &dyn StreetLayer,
	origin: u64,
	limit: u64,
	units: CostUnits,
	edge_cost: impl Fn(u32) -> u64,
) -> StreetVertexCosts {
	let mut dist: HashMap<u64, u64> = HashMap::new();
	let mut heap = BinaryHeap::new();
	dist.insert(origin, 0);
	heap.push(Reverse(HeapEntry { cost: 0, vertex: origin }));

	while let Some(Reverse(HeapEntry { cost, vertex })) = heap.pop() {
		if cost as u64 > dist.get(&vertex).copied().unwrap_or(u64::MAX) {
			continue;
		}
		if cost as u64 > limit {
			continue;
		}
		for (neighbor, edge_mm) in layer.edges_from(vertex) {
			let next_cost = cost as u64 + edge_cost(edge_mm);
			if next_cost > limit {
				continue;
			}
			if next_cost < dist.get(&neighbor).copied().unwrap_or(u64::MAX) {
				dist.insert(neighbor, next_cost);
				heap.push(Reverse(HeapEntry {
					cost: next_cost as u32,
					vertex: neighbor,
				}));
			}
		}
	}

	StreetVertexCosts {
		units,
		costs: dist.into_iter().map(|(v, c)| (v, c as u32)).collect(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap as Map;

	/// A tiny in-memory street graph for tests: a straight line of vertices
	/// 100mm apart, `0 -- 1 -- 2 -- 3`.
	struct LineGraph {
		edges: Map<u64, Vec<(u64, u32)>>,
	}

	impl LineGraph {
		fn new(n: u64, step_mm: u32) -> LineGraph {
			let mut edges: Map<u64, Vec<(u64, u32)>> = Map::new();
			for v in 0..n {
				let mut list = Vec::new();
				if v > 0 {
					list.push((v - 1, step_mm));
				}
				if v + 1 < n {
					list.push((v + 1, step_mm));
				}
				edges.insert(v, list);
			}
			LineGraph { edges }
		}
	}

	impl StreetLayer for LineGraph {
		fn vertex_count(&self) -> usize {
			self.edges.len()
		}
		fn vertex_lon_lat(&self, vertex: u64) -> (f64, f64) {
			(vertex as f64 * 0.001, 0.0)
		}
		fn find_split(&self, _lon: f64, _lat: f64, _radius_m: f64, _mode: StreetMode) -> Option<Split> {
			None
		}
		fn edges_from(&self, vertex: u64) -> Vec<(u64, u32)> {
			self.edges.get(&vertex).cloned().unwrap_or_default()
		}
	}

	#[test]
	fn search_reaches_only_vertices_within_radius() {
		let graph = LineGraph::new(5, 100);
		let result = street_search_distance(&graph, 0, 250);
		assert_eq!(result.cost(0), Some(0));
		assert_eq!(result.cost(1), Some(100));
		assert_eq!(result.cost(2), Some(200));
		assert_eq!(result.cost(3), None);
	}

	#[test]
	fn search_finds_shortest_not_first_path() {
		let graph = LineGraph::new(3, 100);
		let result = street_search_distance(&graph, 1, 1000);
		assert_eq!(result.cost(0), Some(100));
		assert_eq!(result.cost(1), Some(0));
		assert_eq!(result.cost(2), Some(100));
	}
}
