//! The egress-table builder (component 4.E): turns a street graph and a
//! transit stop list into a [`SparseEgressTable`], in two parallel passes —
//! one over tiles to build street connectors, one over transit stops to
//! propagate egress-walk times into the tiles they reach.

use crate::{
	EgressTimeTile, Split, StreetConnectorTile, StreetLayer, StreetMode, TransitLayer, evaluate_connectors,
	street_search_distance,
};
use anyhow::{Result, ensure};
use isoraster_core::{GeoBBox, GridScheme, MAX_CONNECTOR_LENGTH_METERS, SparseTileArray, TILE_SPAN};
use log::warn;
use rayon::prelude::*;
use std::sync::Mutex;

use crate::SparseEgressTable;

/// Builds a [`SparseEgressTable`] for `street`/`transit`, with transit stops
/// reachable within `egress_radius_m` of their street vertex contributing
/// to the tiles they walk-reach.
pub fn build_egress_table(street: &dyn StreetLayer, transit: &dyn TransitLayer, egress_radius_m: f64) -> Result<SparseEgressTable> {
	let bounds = street_bounds(street)?;
	let grid = GridScheme::tile_grid_containing(bounds)?;

	let connectors: SparseTileArray<StreetConnectorTile> =
		SparseTileArray::par_build(grid.tiles_w(), grid.tiles_h(), |flat_tile| build_connector_tile(street, &grid, flat_tile));

	let egress_builders: Vec<Mutex<EgressTimeTile>> = (0..grid.tile_count()).map(|_| Mutex::new(EgressTimeTile::new())).collect();

	let radius_mm = (egress_radius_m * 1000.0).round() as u64;

	(0..transit.stop_count()).into_par_iter().for_each(|stop| {
		let Some(vertex) = transit.stop_street_vertex(stop) else {
			return;
		};
		let costs = street_search_distance(street, vertex, radius_mm);
		let Some((x0, y0, x1, y1)) = costs.bounds(street) else {
			return;
		};
		let Ok(reach_bounds) = GeoBBox::new_save(x0, y0, x1, y1) else {
			warn!("egress builder: stop {stop} produced a degenerate reach bounding box, skipping");
			return;
		};
		let range = grid.tile_range_for(&reach_bounds);
		range.for_each_flat_parent_index(|flat_tile| {
			let Some(connector_tile) = connectors.get(flat_tile) else {
				return;
			};
			let Some(per_cell_sec) = evaluate_connectors(connector_tile, &costs) else {
				return;
			};
			let mut builder = egress_builders[flat_tile].lock().expect("egress tile lock poisoned");
			builder.push_stop(stop as u32, per_cell_sec);
		});
	});

	let mut egress = SparseTileArray::new(grid.tiles_w(), grid.tiles_h());
	for (flat, builder) in egress_builders.into_iter().enumerate() {
		let tile = builder.into_inner().expect("egress tile lock poisoned");
		if !tile.is_empty() {
			egress.set(flat, Some(tile));
		}
	}

	Ok(SparseEgressTable::new(grid, egress, connectors))
}

/// Geographic bounding box of every vertex in `street`.
fn street_bounds(street: &dyn StreetLayer) -> Result<GeoBBox> {
	ensure!(street.vertex_count() > 0, "street layer has no vertices");
	let mut bounds: Option<(f64, f64, f64, f64)> = None;
	for vertex in 0..street.vertex_count() as u64 {
		let (lon, lat) = street.vertex_lon_lat(vertex);
		bounds = Some(match bounds {
			None => (lon, lat, lon, lat),
			Some((x0, y0, x1, y1)) => (x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat)),
		});
	}
	let (x0, y0, x1, y1) = bounds.expect("checked non-empty above");
	GeoBBox::new_save(x0, y0, x1, y1)
}

/// Builds one tile's connectors by probing the street layer at every cell
/// centre; returns `None` if no cell in the tile obtained a split.
fn build_connector_tile(street: &dyn StreetLayer, grid: &GridScheme, flat_tile: usize) -> Option<StreetConnectorTile> {
	let tiles_w = grid.tiles_w();
	let tx = (flat_tile as u32) % tiles_w;
	let ty = (flat_tile as u32) / tiles_w;
	let span = TILE_SPAN as u32;

	let mut tile = StreetConnectorTile::empty();
	let mut any = false;

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
			let lon = grid.center_lon_for_x(cx);
			let lat = grid.center_lat_for_y(cy);
			if let Some(Split {
				vertex_a,
				dist_a_mm,
				vertex_b,
				dist_b_mm,
			}) = street.find_split(lon, lat, MAX_CONNECTOR_LENGTH_METERS, StreetMode::Walk)
			{
				let ic = grid.cell_to_tile_local_flat(cx, cy);
				tile.set(ic, vertex_a, dist_a_mm, vertex_b, dist_b_mm);
				any = true;
			}
		}
	}

	any.then_some(tile)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TransitLayer;
	use std::collections::HashMap;

	/// A 3-vertex street graph along the equator, 100m apart, each vertex
	/// directly under a grid cell centre.
	struct TinyStreet {
		edges: HashMap<u64, Vec<(u64, u32)>>,
		lon_lat: Vec<(f64, f64)>,
	}

	impl TinyStreet {
		fn new() -> TinyStreet {
			let lon_lat = vec![(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)];
			let mut edges = HashMap::new();
			edges.insert(0, vec![(1, 100_000)]);
			edges.insert(1, vec![(0, 100_000), (2, 100_000)]);
			edges.insert(2, vec![(1, 100_000)]);
			TinyStreet { edges, lon_lat }
		}
	}

	impl StreetLayer for TinyStreet {
		fn vertex_count(&self) -> usize {
			self.lon_lat.len()
		}
		fn vertex_lon_lat(&self, vertex: u64) -> (f64, f64) {
			self.lon_lat[vertex as usize]
		}
		fn find_split(&self, lon: f64, lat: f64, radius_m: f64, _mode: StreetMode) -> Option<Split> {
			// Find the nearest vertex by crude degree distance; treat radius_m generously.
			let mut best: Option<(u64, f64)> = None;
			for (v, &(vlon, vlat)) in self.lon_lat.iter().enumerate() {
				let d = ((vlon - lon).powi(2) + (vlat - lat).powi(2)).sqrt();
				if best.is_none_or(|(_, bd)| d < bd) {
					best = Some((v as u64, d));
				}
			}
			let (v, d) = best?;
			if d * 111_000.0 > radius_m {
				return None;
			}
			Some(Split {
				vertex_a: v,
				dist_a_mm: (d * 111_000.0 * 1000.0) as u32,
				vertex_b: v,
				dist_b_mm: (d * 111_000.0 * 1000.0) as u32,
			})
		}
		fn edges_from(&self, vertex: u64) -> Vec<(u64, u32)> {
			self.edges.get(&vertex).cloned().unwrap_or_default()
		}
	}

	struct OneStop;
	impl TransitLayer for OneStop {
		fn stop_count(&self) -> usize {
			1
		}
		fn stop_street_vertex(&self, _stop: usize) -> Option<u64> {
			Some(0)
		}
		fn multi_departure_search(&self, _origin_arrivals: &[(usize, u32)], _window_start_sec: u32, _window_end_sec: u32) -> Vec<Vec<u32>> {
			vec![]
		}
	}

	#[test]
	fn builds_a_table_with_at_least_one_present_tile() {
		let street = TinyStreet::new();
		let transit = OneStop;
		let table = build_egress_table(&street, &transit, 500.0).unwrap();
		let present_egress = (0..table.grid().tile_count()).filter(|&i| table.egress_tile(i).is_some()).count();
		assert!(present_egress > 0, "expected at least one tile reached by the stop");
	}

	#[test]
	fn stop_with_no_street_vertex_contributes_nothing() {
		struct Unlinked;
		impl TransitLayer for Unlinked {
			fn stop_count(&self) -> usize {
				1
			}
			fn stop_street_vertex(&self, _stop: usize) -> Option<u64> {
				None
			}
			fn multi_departure_search(&self, _o: &[(usize, u32)], _s: u32, _e: u32) -> Vec<Vec<u32>> {
				vec![]
			}
		}
		let street = TinyStreet::new();
		let table = build_egress_table(&street, &Unlinked, 500.0).unwrap();
		assert!((0..table.grid().tile_count()).all(|i| table.egress_tile(i).is_none()));
	}
}
