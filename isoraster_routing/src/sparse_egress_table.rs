//! The sparse egress table: a tile grid of egress-time tiles and street-
//! connector tiles, either entry absent per tile independently, built by
//! [`crate::build_egress_table`] and shared read-only afterwards through an
//! `isoraster_core::RoutingDataCache`.

use crate::{EgressTimeTile, StreetConnectorTile};
use anyhow::{Result, bail};
use byteorder::LittleEndian;
use isoraster_core::io::{ValueReader, ValueReaderBlob, ValueWriter, ValueWriterBlob};
use isoraster_core::{Blob, GeoBBox, GridScheme, SparseTileArray};

const FORMAT_VERSION: u8 = 1;

/// Immutable once built: a tile grid scheme plus sparse egress-time and
/// street-connector tile arrays.
#[derive(Clone, Debug)]
pub struct SparseEgressTable {
	grid: GridScheme,
	egress: SparseTileArray<EgressTimeTile>,
	connectors: SparseTileArray<StreetConnectorTile>,
}

impl SparseEgressTable {
	#[must_use]
	pub fn new(
		grid: GridScheme,
		egress: SparseTileArray<EgressTimeTile>,
		connectors: SparseTileArray<StreetConnectorTile>,
	) -> SparseEgressTable {
		SparseEgressTable { grid, egress, connectors }
	}

	#[must_use]
	pub fn grid(&self) -> &GridScheme {
		&self.grid
	}

	#[must_use]
	pub fn egress_tile(&self, flat_tile: usize) -> Option<&EgressTimeTile> {
		self.egress.get(flat_tile)
	}

	#[must_use]
	pub fn connector_tile(&self, flat_tile: usize) -> Option<&StreetConnectorTile> {
		self.connectors.get(flat_tile)
	}

	/// Encodes this table into a self-describing byte layout: a version
	/// byte, the grid bounds and dimensions, then each tile array as a
	/// presence bitmap followed by the present tiles' contents in ascending
	/// flat-index order.
	pub fn to_bytes(&self) -> Result<Blob> {
		let mut w = ValueWriterBlob::<LittleEndian>::new_le();
		w.write_u8(FORMAT_VERSION)?;
		w.write_f64(self.grid.bounds().x_min)?;
		w.write_f64(self.grid.bounds().y_min)?;
		w.write_f64(self.grid.bounds().x_max)?;
		w.write_f64(self.grid.bounds().y_max)?;
		w.write_u32(self.grid.w())?;
		w.write_u32(self.grid.h())?;

		write_presence_bitmap(&mut w, &self.egress, write_egress_tile)?;
		write_presence_bitmap(&mut w, &self.connectors, write_connector_tile)?;

		Ok(w.into_blob())
	}

	/// Decodes a table previously encoded with [`Self::to_bytes`].
	pub fn from_bytes(blob: Blob) -> Result<SparseEgressTable> {
		let mut r = ValueReaderBlob::<LittleEndian>::new_le(blob);
		let version = r.read_u8()?;
		if version != FORMAT_VERSION {
			bail!("unsupported sparse egress table format version {version}");
		}
		let x_min = r.read_f64()?;
		let y_min = r.read_f64()?;
		let x_max = r.read_f64()?;
		let y_max = r.read_f64()?;
		let w = r.read_u32()?;
		let h = r.read_u32()?;
		let bounds = GeoBBox::new(x_min, y_min, x_max, y_max)?;
		let grid = GridScheme::new(bounds, w, h)?;

		let egress = read_presence_bitmap(&mut r, grid.tiles_w(), grid.tiles_h(), read_egress_tile)?;
		let connectors = read_presence_bitmap(&mut r, grid.tiles_w(), grid.tiles_h(), read_connector_tile)?;

		Ok(SparseEgressTable { grid, egress, connectors })
	}
}

fn write_presence_bitmap<T>(
	w: &mut ValueWriterBlob<LittleEndian>,
	array: &SparseTileArray<T>,
	mut write_one: impl FnMut(&mut ValueWriterBlob<LittleEndian>, &T) -> Result<()>,
) -> Result<()> {
	w.write_u32(array.len() as u32)?;
	for flat in 0..array.len() {
		w.write_u8(u8::from(array.get(flat).is_some()))?;
	}
	for flat in 0..array.len() {
		if let Some(tile) = array.get(flat) {
			write_one(w, tile)?;
		}
	}
	Ok(())
}

fn read_presence_bitmap<T>(
	r: &mut ValueReaderBlob<LittleEndian>,
	tiles_w: u32,
	tiles_h: u32,
	mut read_one: impl FnMut(&mut ValueReaderBlob<LittleEndian>) -> Result<T>,
) -> Result<SparseTileArray<T>> {
	let len = r.read_u32()? as usize;
	let mut present = vec![false; len];
	for slot in present.iter_mut() {
		*slot = r.read_u8()? != 0;
	}
	let mut array = SparseTileArray::new(tiles_w, tiles_h);
	for (flat, &is_present) in present.iter().enumerate() {
		if is_present {
			array.set(flat, Some(read_one(r)?));
		}
	}
	Ok(array)
}

fn write_egress_tile(w: &mut ValueWriterBlob<LittleEndian>, tile: &EgressTimeTile) -> Result<()> {
	w.write_u32(tile.stop_ids.len() as u32)?;
	for &id in &tile.stop_ids {
		w.write_u32(id)?;
	}
	for row in &tile.dist_sec {
		for &v in row {
			w.write_u32(v)?;
		}
	}
	Ok(())
}

fn read_egress_tile(r: &mut ValueReaderBlob<LittleEndian>) -> Result<EgressTimeTile> {
	let n = r.read_u32()? as usize;
	let mut stop_ids = Vec::with_capacity(n);
	for _ in 0..n {
		stop_ids.push(r.read_u32()?);
	}
	let cells = isoraster_core::TILE_SPAN * isoraster_core::TILE_SPAN;
	let mut dist_sec = Vec::with_capacity(n);
	for _ in 0..n {
		let mut row = Vec::with_capacity(cells);
		for _ in 0..cells {
			row.push(r.read_u32()?);
		}
		dist_sec.push(row);
	}
	Ok(EgressTimeTile { stop_ids, dist_sec })
}

fn write_connector_tile(w: &mut ValueWriterBlob<LittleEndian>, tile: &StreetConnectorTile) -> Result<()> {
	for &v in &tile.vertex_a {
		w.write_i32(v as i32)?;
	}
	for &v in &tile.dist_a_mm {
		w.write_i32(v as i32)?;
	}
	for &v in &tile.vertex_b {
		w.write_i32(v as i32)?;
	}
	for &v in &tile.dist_b_mm {
		w.write_i32(v as i32)?;
	}
	Ok(())
}

fn read_connector_tile(r: &mut ValueReaderBlob<LittleEndian>) -> Result<StreetConnectorTile> {
	let cells = isoraster_core::TILE_SPAN * isoraster_core::TILE_SPAN;
	let read_row = |r: &mut ValueReaderBlob<LittleEndian>| -> Result<Vec<i64>> {
		let mut row = Vec::with_capacity(cells);
		for _ in 0..cells {
			row.push(i64::from(r.read_i32()?));
		}
		Ok(row)
	};
	Ok(StreetConnectorTile {
		vertex_a: read_row(r)?,
		dist_a_mm: read_row(r)?,
		vertex_b: read_row(r)?,
		dist_b_mm: read_row(r)?,
	})
}
