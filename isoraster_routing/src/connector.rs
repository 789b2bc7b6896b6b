//! Street-connector tiles (component 4.C): per-cell links to up to two
//! bounding street-graph vertices, and their evaluation against a set of
//! per-vertex costs into per-cell seconds.

use crate::{CostUnits, StreetVertexCosts};
use isoraster_core::{Durations, MAX_SEC, SPEED_MM_SEC, TILE_SPAN};

/// Sentinel for "no nearby street" in a connector's vertex/distance arrays.
pub const NO_CONNECTOR: i64 = -1;

/// A tile's worth of street connectors: for every cell, up to two bounding
/// vertices and the sub-edge distance to each. A tile with no valid
/// connector cell is represented as `None` in the enclosing
/// [`isoraster_core::SparseTileArray`], never allocated here.
#[derive(Clone, Debug, PartialEq)]
pub struct StreetConnectorTile {
	pub vertex_a: Vec<i64>,
	pub dist_a_mm: Vec<i64>,
	pub vertex_b: Vec<i64>,
	pub dist_b_mm: Vec<i64>,
}

impl StreetConnectorTile {
	const LEN: usize = TILE_SPAN * TILE_SPAN;

	/// An all-absent connector tile, the starting point a builder fills in
	/// cell by cell while scanning a tile.
	#[must_use]
	pub fn empty() -> StreetConnectorTile {
		StreetConnectorTile {
			vertex_a: vec![NO_CONNECTOR; Self::LEN],
			dist_a_mm: vec![NO_CONNECTOR; Self::LEN],
			vertex_b: vec![NO_CONNECTOR; Self::LEN],
			dist_b_mm: vec![NO_CONNECTOR; Self::LEN],
		}
	}

	/// `true` if no cell in this tile has a usable connector.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.vertex_a.iter().all(|&v| v == NO_CONNECTOR)
	}

	pub fn set(&mut self, ic: usize, vertex_a: u64, dist_a_mm: u32, vertex_b: u64, dist_b_mm: u32) {
		self.vertex_a[ic] = vertex_a as i64;
		self.dist_a_mm[ic] = i64::from(dist_a_mm);
		self.vertex_b[ic] = vertex_b as i64;
		self.dist_b_mm[ic] = i64::from(dist_b_mm);
	}
}

/// Evaluates a tile's street connectors against `costs` (component 4.C),
/// producing per-cell seconds. Returns `None` if no cell was reached.
///
/// `out[ic] = min(tA, tB)` where `tX` combines the vertex cost with the
/// sub-edge distance (converted to seconds at [`SPEED_MM_SEC`] when `costs`
/// is in distance units), capped at [`MAX_SEC`].
#[must_use]
pub fn evaluate_connectors(tile: &StreetConnectorTile, costs: &StreetVertexCosts) -> Option<Vec<u32>> {
	let mut out = vec![MAX_SEC; StreetConnectorTile::LEN];
	let mut any_reached = false;

	for ic in 0..StreetConnectorTile::LEN {
		let side = |vertex: i64, dist_mm: i64| -> u32 {
			if vertex < 0 || dist_mm < 0 {
				return MAX_SEC;
			}
			let Some(base_cost) = costs.cost(vertex as u64) else {
				return MAX_SEC;
			};
			let edge_sec = (dist_mm as f64 / f64::from(SPEED_MM_SEC)).round() as u32;
			let total = match costs.units {
				CostUnits::DistanceMm => ((base_cost as f64 + dist_mm as f64) / f64::from(SPEED_MM_SEC)).round() as u32,
				CostUnits::DurationSec => base_cost + edge_sec,
			};
			total.min(MAX_SEC)
		};

		let t_a = side(tile.vertex_a[ic], tile.dist_a_mm[ic]);
		let t_b = side(tile.vertex_b[ic], tile.dist_b_mm[ic]);
		let best = t_a.min(t_b);
		out[ic] = best;
		if best < MAX_SEC {
			any_reached = true;
		}
	}

	any_reached.then_some(out)
}

/// [`evaluate_connectors`] broadcast across all three of a
/// [`Durations`]-shaped percentile set, using the same connector geometry
/// and the same cost table for min/avg/max (street costs have no
/// percentile spread of their own).
#[must_use]
pub fn evaluate_connectors_durations(tile: &StreetConnectorTile, costs: &StreetVertexCosts) -> Option<Durations> {
	let seconds = evaluate_connectors(tile, costs)?;
	Some(Durations {
		min: seconds.clone(),
		avg: seconds.clone(),
		max: seconds,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn costs(pairs: &[(u64, u32)], units: CostUnits) -> StreetVertexCosts {
		StreetVertexCosts {
			units,
			costs: pairs.iter().copied().collect::<HashMap<_, _>>(),
		}
	}

	#[test]
	fn unreached_when_both_vertices_unreached() {
		let mut tile = StreetConnectorTile::empty();
		tile.set(0, 1, 10_000, 2, 20_000);
		tile.set(1, 3, 1300, 3, 1300);
		let costs = costs(&[(3, 0)], CostUnits::DistanceMm);
		let out = evaluate_connectors(&tile, &costs).unwrap();
		// vertex 1 and 2 are both absent from costs, so cell 0 must read unreached,
		// even though cell 1's vertex 3 is reachable and makes the tile present.
		assert_eq!(out[0], MAX_SEC);
		assert_eq!(out[1], 1);
	}

	#[test]
	fn absent_tile_when_no_cell_reached() {
		let tile = StreetConnectorTile::empty();
		let costs = costs(&[(1, 0)], CostUnits::DistanceMm);
		assert!(evaluate_connectors(&tile, &costs).is_none());
	}

	#[test]
	fn picks_the_cheaper_side() {
		let mut tile = StreetConnectorTile::empty();
		tile.set(0, 1, 1300, 2, 13_000); // A: 1300mm sub-edge, B: 13000mm sub-edge
		let costs = costs(&[(1, 0), (2, 0)], CostUnits::DistanceMm);
		let out = evaluate_connectors(&tile, &costs).unwrap();
		// A is ~1 second away, B is ~10 seconds away; connector should pick A.
		assert_eq!(out[0], 1);
	}
}
