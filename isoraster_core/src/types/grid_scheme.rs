//! Plate-carrée grid scheme: the coordinate system every sparse tile, egress
//! table and opportunity grid is indexed against.
//!
//! A [`GridScheme`] is a rectangle over WGS84 split into `w * h` cells of
//! equal size in degrees. Cells are addressed either by `(x, y)` or by a
//! row-major flat index `y * w + x`; every per-cell array in the workspace
//! uses the flat index as its indexing scheme.

use super::GeoBBox;
use crate::{DEG_PER_METER, TARGET_CELL_SIZE_METERS, TILE_SPAN};
use anyhow::{Result, ensure};
use isoraster_derive::context;

/// A uniform lat/lon cell grid covering a [`GeoBBox`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct GridScheme {
	bounds: GeoBBox,
	w: u32,
	h: u32,
	dlon: f64,
	dlat: f64,
}

impl GridScheme {
	/// Builds a grid of `w * h` cells covering `bounds`.
	#[context("Failed to build a grid scheme of {w}x{h} cells over {bounds:?}")]
	pub fn new(bounds: GeoBBox, w: u32, h: u32) -> Result<GridScheme> {
		ensure!(w > 0, "w ({w}) must be > 0");
		ensure!(h > 0, "h ({h}) must be > 0");
		Ok(GridScheme {
			bounds,
			w,
			h,
			dlon: (bounds.x_max - bounds.x_min) / w as f64,
			dlat: (bounds.y_max - bounds.y_min) / h as f64,
		})
	}

	#[must_use]
	pub fn bounds(&self) -> GeoBBox {
		self.bounds
	}

	#[must_use]
	pub fn w(&self) -> u32 {
		self.w
	}

	#[must_use]
	pub fn h(&self) -> u32 {
		self.h
	}

	/// Total number of cells, `w * h`.
	#[must_use]
	pub fn len(&self) -> usize {
		self.w as usize * self.h as usize
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Row-major flat index of cell `(x, y)`. Panics if out of range; callers
	/// that accept untrusted coordinates should check against `w`/`h` first
	/// or use [`Self::lon_lat_to_flat`].
	#[must_use]
	pub fn cell_to_flat(&self, x: u32, y: u32) -> usize {
		debug_assert!(x < self.w && y < self.h);
		y as usize * self.w as usize + x as usize
	}

	/// Inverse of [`Self::cell_to_flat`].
	#[must_use]
	pub fn flat_to_cell(&self, flat: usize) -> (u32, u32) {
		debug_assert!(flat < self.len());
		let x = (flat % self.w as usize) as u32;
		let y = (flat / self.w as usize) as u32;
		(x, y)
	}

	/// Column index of `lon`, or `-1` if `lon` lies outside the grid bounds.
	#[must_use]
	pub fn lon_to_x(&self, lon: f64) -> i64 {
		if lon < self.bounds.x_min || lon >= self.bounds.x_max {
			return -1;
		}
		(((lon - self.bounds.x_min) / self.dlon) as i64).min(self.w as i64 - 1)
	}

	/// Row index of `lat`, or `-1` if `lat` lies outside the grid bounds.
	#[must_use]
	pub fn lat_to_y(&self, lat: f64) -> i64 {
		if lat < self.bounds.y_min || lat >= self.bounds.y_max {
			return -1;
		}
		(((lat - self.bounds.y_min) / self.dlat) as i64).min(self.h as i64 - 1)
	}

	/// Flat index of the cell containing `(lon, lat)`, or `None` if it falls
	/// outside the grid.
	#[must_use]
	pub fn lon_lat_to_flat(&self, lon: f64, lat: f64) -> Option<usize> {
		let x = self.lon_to_x(lon);
		let y = self.lat_to_y(lat);
		if x < 0 || y < 0 {
			return None;
		}
		Some(self.cell_to_flat(x as u32, y as u32))
	}

	/// Longitude of the centre of column `x`.
	#[must_use]
	pub fn center_lon_for_x(&self, x: u32) -> f64 {
		self.bounds.x_min + (x as f64 + 0.5) * self.dlon
	}

	/// Latitude of the centre of row `y`.
	#[must_use]
	pub fn center_lat_for_y(&self, y: u32) -> f64 {
		self.bounds.y_min + (y as f64 + 0.5) * self.dlat
	}

	/// WGS84 bounds covered by cell `(x, y)`.
	#[must_use]
	pub fn cell_bounds(&self, x: u32, y: u32) -> GeoBBox {
		let x0 = self.bounds.x_min + x as f64 * self.dlon;
		let y0 = self.bounds.y_min + y as f64 * self.dlat;
		GeoBBox::new_save(x0, y0, x0 + self.dlon, y0 + self.dlat).expect("derived from a valid GeoBBox")
	}

	/// Returns a grid with `k` times as many cells per side, same bounds.
	#[context("Failed to subdivide grid scheme by factor {k}")]
	pub fn subdivide(&self, k: u32) -> Result<GridScheme> {
		ensure!(k > 0, "k ({k}) must be > 0");
		GridScheme::new(self.bounds, self.w * k, self.h * k)
	}

	/// Builds the smallest tile-aligned [`GridScheme`] covering `bounds`,
	/// with cells sized to [`TARGET_CELL_SIZE_METERS`] at the centre
	/// latitude and dimensions that are an integer multiple of
	/// [`TILE_SPAN`] in both directions.
	#[context("Failed to build a tile grid containing {bounds:?}")]
	pub fn tile_grid_containing(bounds: GeoBBox) -> Result<GridScheme> {
		let center_lat = (bounds.y_min + bounds.y_max) / 2.0;
		let cell_dlat = TARGET_CELL_SIZE_METERS * DEG_PER_METER;
		let cell_dlon = cell_dlat / center_lat.to_radians().cos();

		let raw_w = ((bounds.x_max - bounds.x_min) / cell_dlon).ceil().max(1.0) as u32;
		let raw_h = ((bounds.y_max - bounds.y_min) / cell_dlat).ceil().max(1.0) as u32;
		let span = TILE_SPAN as u32;
		let w = raw_w.div_ceil(span) * span;
		let h = raw_h.div_ceil(span) * span;

		// Enlarge the bounds, centred on the original, to exactly match w/h cells.
		let cx = (bounds.x_min + bounds.x_max) / 2.0;
		let cy = (bounds.y_min + bounds.y_max) / 2.0;
		let half_w_deg = w as f64 * cell_dlon / 2.0;
		let half_h_deg = h as f64 * cell_dlat / 2.0;
		let enlarged = GeoBBox::new_save(cx - half_w_deg, cy - half_h_deg, cx + half_w_deg, cy + half_h_deg)?;

		GridScheme::new(enlarged, w, h)
	}

	/// Number of whole tiles along the x axis.
	#[must_use]
	pub fn tiles_w(&self) -> u32 {
		self.w.div_ceil(TILE_SPAN as u32)
	}

	/// Number of whole tiles along the y axis.
	#[must_use]
	pub fn tiles_h(&self) -> u32 {
		self.h.div_ceil(TILE_SPAN as u32)
	}

	/// Total number of tiles, `tiles_w * tiles_h`.
	#[must_use]
	pub fn tile_count(&self) -> usize {
		self.tiles_w() as usize * self.tiles_h() as usize
	}

	/// Row-major flat tile index containing cell `(x, y)`.
	#[must_use]
	pub fn cell_to_tile_flat(&self, x: u32, y: u32) -> usize {
		let tx = x / TILE_SPAN as u32;
		let ty = y / TILE_SPAN as u32;
		ty as usize * self.tiles_w() as usize + tx as usize
	}

	/// Intra-tile flat index of cell `(x, y)`, in `0..TILE_SPAN*TILE_SPAN`.
	#[must_use]
	pub fn cell_to_tile_local_flat(&self, x: u32, y: u32) -> usize {
		let lx = (x % TILE_SPAN as u32) as usize;
		let ly = (y % TILE_SPAN as u32) as usize;
		ly * TILE_SPAN + lx
	}

	/// Builds the [`TileRange`] of tiles overlapping `bounds`, clamped to
	/// this grid's own tile extent.
	#[must_use]
	pub fn tile_range_for(&self, bounds: &GeoBBox) -> TileRange {
		let x_min = self.lon_to_x(bounds.x_min).max(0) as u32;
		let y_min = self.lat_to_y(bounds.y_min).max(0) as u32;
		let x_max = {
			let x = self.lon_to_x(bounds.x_max);
			if x < 0 { self.w - 1 } else { x as u32 }
		};
		let y_max = {
			let y = self.lat_to_y(bounds.y_max);
			if y < 0 { self.h - 1 } else { y as u32 }
		};

		let tx_min = x_min / TILE_SPAN as u32;
		let ty_min = y_min / TILE_SPAN as u32;
		let tx_max = x_max / TILE_SPAN as u32;
		let ty_max = y_max / TILE_SPAN as u32;

		TileRange {
			parent: *self,
			x_min: tx_min,
			y_min: ty_min,
			w: tx_max - tx_min + 1,
			h: ty_max - ty_min + 1,
		}
	}

	/// The [`TileRange`] spanning every tile in this grid.
	#[must_use]
	pub fn full_tile_range(&self) -> TileRange {
		TileRange {
			parent: *self,
			x_min: 0,
			y_min: 0,
			w: self.tiles_w(),
			h: self.tiles_h(),
		}
	}
}

/// A sub-rectangle of tiles within a parent [`GridScheme`], in tile units.
#[derive(Clone, Copy, Debug)]
pub struct TileRange {
	parent: GridScheme,
	pub x_min: u32,
	pub y_min: u32,
	pub w: u32,
	pub h: u32,
}

impl TileRange {
	#[must_use]
	pub fn parent(&self) -> &GridScheme {
		&self.parent
	}

	/// WGS84 bounds covered by this tile range.
	#[must_use]
	pub fn bounds(&self) -> GeoBBox {
		let span = TILE_SPAN as u32;
		let c0 = self.parent.cell_bounds(self.x_min * span, self.y_min * span);
		let last_x = ((self.x_min + self.w) * span - 1).min(self.parent.w - 1);
		let last_y = ((self.y_min + self.h) * span - 1).min(self.parent.h - 1);
		let c1 = self.parent.cell_bounds(last_x, last_y);
		c0.extended(&c1)
	}

	/// Row-major flat tile index, relative to the parent grid's full tile
	/// extent, of tile `(x, y)` within this range (`x < w`, `y < h`).
	#[must_use]
	pub fn flat_parent_index(&self, x: u32, y: u32) -> usize {
		debug_assert!(x < self.w && y < self.h);
		let tx = self.x_min + x;
		let ty = self.y_min + y;
		ty as usize * self.parent.tiles_w() as usize + tx as usize
	}

	/// Visits every tile covered by this range exactly once, in row-major
	/// order, passing each tile's flat index within the parent grid's full
	/// tile extent.
	pub fn for_each_flat_parent_index(&self, mut cb: impl FnMut(usize)) {
		for y in 0..self.h {
			for x in 0..self.w {
				cb(self.flat_parent_index(x, y));
			}
		}
	}

	/// Total number of tiles covered, `w * h`.
	#[must_use]
	pub fn len(&self) -> usize {
		self.w as usize * self.h as usize
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
