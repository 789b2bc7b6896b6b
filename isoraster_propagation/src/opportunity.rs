//! Opportunity tiles (component 4.G): a tile of per-cell opportunity
//! densities, stored sparsely the same way as street connectors and egress
//! times — an absent tile means "all zero", never allocated.

use anyhow::{Result, bail};
use byteorder::LittleEndian;
use isoraster_core::io::{ValueReader, ValueReaderBlob, ValueWriter, ValueWriterBlob};
use isoraster_core::{Blob, GeoBBox, GridScheme, SparseTileArray, TILE_SPAN};

const FORMAT_VERSION: u8 = 1;

/// A tile's worth of opportunity densities, one `f32` per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct OpportunityTile {
	pub counts: Vec<f32>,
}

impl OpportunityTile {
	const LEN: usize = TILE_SPAN * TILE_SPAN;

	#[must_use]
	pub fn zero() -> OpportunityTile {
		OpportunityTile { counts: vec![0.0; Self::LEN] }
	}

	/// `true` if every cell is zero (such a tile should be stored absent).
	#[must_use]
	pub fn is_all_zero(&self) -> bool {
		self.counts.iter().all(|&v| v == 0.0)
	}
}

/// A tile grid of opportunity densities, sparse the way a
/// [`isoraster_routing::SparseEgressTable`] is: present only where
/// nonzero.
#[derive(Clone, Debug)]
pub struct OpportunityGrid {
	grid: GridScheme,
	tiles: SparseTileArray<OpportunityTile>,
}

impl OpportunityGrid {
	#[must_use]
	pub fn new(grid: GridScheme, tiles: SparseTileArray<OpportunityTile>) -> OpportunityGrid {
		OpportunityGrid { grid, tiles }
	}

	/// Builds a grid from a dense per-cell density array over `grid`,
	/// dropping all-zero tiles to absent.
	#[must_use]
	pub fn from_dense(grid: GridScheme, density: &[f32]) -> OpportunityGrid {
		debug_assert_eq!(density.len(), grid.len());
		let span = TILE_SPAN as u32;
		let tiles = SparseTileArray::par_build(grid.tiles_w(), grid.tiles_h(), |flat_tile| {
			let tiles_w = grid.tiles_w();
			let tx = (flat_tile as u32) % tiles_w;
			let ty = (flat_tile as u32) / tiles_w;
			let mut tile = OpportunityTile::zero();
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
					let v = density[grid.cell_to_flat(cx, cy)];
					if v != 0.0 {
						tile.counts[grid.cell_to_tile_local_flat(cx, cy)] = v;
						any = true;
					}
				}
			}
			any.then_some(tile)
		});
		OpportunityGrid { grid, tiles }
	}

	#[must_use]
	pub fn grid(&self) -> &GridScheme {
		&self.grid
	}

	#[must_use]
	pub fn tile(&self, flat_tile: usize) -> Option<&OpportunityTile> {
		self.tiles.get(flat_tile)
	}

	/// Opportunity density at cell `(x, y)`, 0 if the owning tile is
	/// absent.
	#[must_use]
	pub fn density_at(&self, x: u32, y: u32) -> f32 {
		let flat_tile = self.grid.cell_to_tile_flat(x, y);
		let ic = self.grid.cell_to_tile_local_flat(x, y);
		self.tiles.get(flat_tile).map_or(0.0, |t| t.counts[ic])
	}

	/// `true` if `(x, y)` and every cell within `radius` cells of it (a
	/// square neighbourhood, clamped to grid bounds) carries zero
	/// opportunity density. Used by the batch job manager (component 4.K)
	/// to filter origins before a job's task list is built.
	#[must_use]
	pub fn is_zero_neighbourhood(&self, x: u32, y: u32, radius: u32) -> bool {
		let x0 = x.saturating_sub(radius);
		let y0 = y.saturating_sub(radius);
		let x1 = (x + radius).min(self.grid.w() - 1);
		let y1 = (y + radius).min(self.grid.h() - 1);
		for cy in y0..=y1 {
			for cx in x0..=x1 {
				if self.density_at(cx, cy) != 0.0 {
					return false;
				}
			}
		}
		true
	}

	/// Encodes this grid with the same self-describing layout as
	/// [`isoraster_routing::SparseEgressTable::to_bytes`]: version byte,
	/// grid bounds/dimensions, presence bitmap, then present tiles in
	/// ascending flat-index order.
	pub fn to_bytes(&self) -> Result<Blob> {
		let mut w = ValueWriterBlob::<LittleEndian>::new_le();
		w.write_u8(FORMAT_VERSION)?;
		w.write_f64(self.grid.bounds().x_min)?;
		w.write_f64(self.grid.bounds().y_min)?;
		w.write_f64(self.grid.bounds().x_max)?;
		w.write_f64(self.grid.bounds().y_max)?;
		w.write_u32(self.grid.w())?;
		w.write_u32(self.grid.h())?;

		w.write_u32(self.tiles.len() as u32)?;
		for flat in 0..self.tiles.len() {
			w.write_u8(u8::from(self.tiles.get(flat).is_some()))?;
		}
		for flat in 0..self.tiles.len() {
			if let Some(tile) = self.tiles.get(flat) {
				for &v in &tile.counts {
					w.write_f32(v)?;
				}
			}
		}
		Ok(w.into_blob())
	}

	/// Decodes a grid previously encoded with [`Self::to_bytes`].
	pub fn from_bytes(blob: Blob) -> Result<OpportunityGrid> {
		let mut r = ValueReaderBlob::<LittleEndian>::new_le(blob);
		let version = r.read_u8()?;
		if version != FORMAT_VERSION {
			bail!("unsupported opportunity grid format version {version}");
		}
		let x_min = r.read_f64()?;
		let y_min = r.read_f64()?;
		let x_max = r.read_f64()?;
		let y_max = r.read_f64()?;
		let w = r.read_u32()?;
		let h = r.read_u32()?;
		let bounds = GeoBBox::new(x_min, y_min, x_max, y_max)?;
		let grid = GridScheme::new(bounds, w, h)?;

		let len = r.read_u32()? as usize;
		let mut present = vec![false; len];
		for slot in present.iter_mut() {
			*slot = r.read_u8()? != 0;
		}
		let mut tiles = SparseTileArray::new(grid.tiles_w(), grid.tiles_h());
		for (flat, &is_present) in present.iter().enumerate() {
			if is_present {
				let mut counts = Vec::with_capacity(OpportunityTile::LEN);
				for _ in 0..OpportunityTile::LEN {
					counts.push(r.read_f32()?);
				}
				tiles.set(flat, Some(OpportunityTile { counts }));
			}
		}
		Ok(OpportunityGrid { grid, tiles })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grid() -> GridScheme {
		GridScheme::tile_grid_containing(GeoBBox::new(0.0, 0.0, 1.0, 1.0).unwrap()).unwrap()
	}

	#[test]
	fn from_dense_drops_all_zero_tiles_to_absent() {
		let g = grid();
		let mut density = vec![0.0f32; g.len()];
		density[g.cell_to_flat(0, 0)] = 7.0;
		let opp = OpportunityGrid::from_dense(g, &density);
		assert_eq!(opp.density_at(0, 0), 7.0);
		assert_eq!(opp.density_at(1, 1), 0.0);
		assert!(opp.tile(0).is_some());
		let far_tile = g_tiles_minus_one(&opp);
		assert!(opp.tile(far_tile).is_none());
	}

	fn g_tiles_minus_one(opp: &OpportunityGrid) -> usize {
		opp.grid().tile_count() - 1
	}

	#[test]
	fn zero_neighbourhood_detects_sparse_corner() {
		let g = grid();
		let mut density = vec![0.0f32; g.len()];
		density[g.cell_to_flat(g.w() - 1, g.h() - 1)] = 1.0;
		let opp = OpportunityGrid::from_dense(g, &density);
		assert!(opp.is_zero_neighbourhood(0, 0, 0));
		assert!(!opp.is_zero_neighbourhood(g.w() - 1, g.h() - 1, 0));
	}

	#[test]
	fn round_trip_preserves_absence_and_values() {
		let g = grid();
		let mut density = vec![0.0f32; g.len()];
		density[g.cell_to_flat(2, 2)] = 3.5;
		let opp = OpportunityGrid::from_dense(g, &density);
		let bytes = opp.to_bytes().unwrap();
		let restored = OpportunityGrid::from_bytes(bytes).unwrap();
		assert_eq!(restored.density_at(2, 2), 3.5);
		assert_eq!(restored.grid().bounds(), opp.grid().bounds());
		for flat in 0..opp.grid().tile_count() {
			assert_eq!(restored.tile(flat), opp.tile(flat));
		}
	}
}
