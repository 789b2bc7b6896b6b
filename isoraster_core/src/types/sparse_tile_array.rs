//! A flat array of tiles where most entries are expected to be absent.
//!
//! Every tiled payload in the workspace (street connectors, egress times,
//! opportunity densities) is stored as a [`SparseTileArray<T>`] indexed by
//! the flat tile index from [`crate::GridScheme::tiles_w`] /
//! [`crate::GridScheme::tiles_h`]. Tiles with no meaningful payload (no
//! street nearby, no stop reaches the tile, zero opportunities) are left
//! absent rather than allocated, so a continental-scale grid costs memory
//! proportional to its populated area, not its bounding box.

use rayon::prelude::*;

/// A flat, sparsely populated array of per-tile payloads.
#[derive(Clone, Debug)]
pub struct SparseTileArray<T> {
	tiles_w: u32,
	tiles_h: u32,
	data: Vec<Option<T>>,
}

impl<T> SparseTileArray<T> {
	/// Builds an all-absent array over a `tiles_w x tiles_h` tile grid.
	#[must_use]
	pub fn new(tiles_w: u32, tiles_h: u32) -> SparseTileArray<T> {
		let len = tiles_w as usize * tiles_h as usize;
		SparseTileArray {
			tiles_w,
			tiles_h,
			data: (0..len).map(|_| None).collect(),
		}
	}

	#[must_use]
	pub fn tiles_w(&self) -> u32 {
		self.tiles_w
	}

	#[must_use]
	pub fn tiles_h(&self) -> u32 {
		self.tiles_h
	}

	/// Total number of tile slots, `tiles_w * tiles_h`.
	#[must_use]
	pub fn len(&self) -> usize {
		self.data.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Number of tiles that carry a payload.
	#[must_use]
	pub fn present_count(&self) -> usize {
		self.data.iter().filter(|t| t.is_some()).count()
	}

	#[must_use]
	pub fn get(&self, flat: usize) -> Option<&T> {
		self.data[flat].as_ref()
	}

	pub fn set(&mut self, flat: usize, value: Option<T>) {
		self.data[flat] = value;
	}

	/// Iterates over `(flat_index, tile)` for every present tile, in
	/// ascending flat-index order.
	pub fn iter_present(&self) -> impl Iterator<Item = (usize, &T)> {
		self
			.data
			.iter()
			.enumerate()
			.filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
	}

	/// Mutable form of [`Self::iter_present`].
	pub fn iter_present_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
		self
			.data
			.iter_mut()
			.enumerate()
			.filter_map(|(i, t)| t.as_mut().map(|t| (i, t)))
	}
}

impl<T: Sync> SparseTileArray<T> {
	/// Parallel form of [`Self::iter_present`]: absent slots are skipped
	/// without being handed to the worker pool.
	pub fn par_iter_present(&self) -> impl ParallelIterator<Item = (usize, &T)> {
		self
			.data
			.par_iter()
			.enumerate()
			.filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
	}
}

impl<T: Send> SparseTileArray<T> {
	/// Parallel mutable form of [`Self::iter_present`].
	pub fn par_iter_present_mut(&mut self) -> impl ParallelIterator<Item = (usize, &mut T)> {
		self
			.data
			.par_iter_mut()
			.enumerate()
			.filter_map(|(i, t)| t.as_mut().map(|t| (i, t)))
	}
}

impl<T: Send + Sync> SparseTileArray<T> {
	/// Builds an array by evaluating `f(flat_index)` for every tile slot in
	/// parallel; `f` returns `None` for tiles that should stay absent.
	pub fn par_build(tiles_w: u32, tiles_h: u32, f: impl Fn(usize) -> Option<T> + Sync) -> SparseTileArray<T> {
		let len = tiles_w as usize * tiles_h as usize;
		let data = (0..len).into_par_iter().map(f).collect();
		SparseTileArray { tiles_w, tiles_h, data }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn absent_by_default() {
		let a: SparseTileArray<u32> = SparseTileArray::new(4, 4);
		assert_eq!(a.len(), 16);
		assert_eq!(a.present_count(), 0);
		assert!(a.get(0).is_none());
	}

	#[test]
	fn set_and_get() {
		let mut a: SparseTileArray<u32> = SparseTileArray::new(2, 2);
		a.set(1, Some(42));
		assert_eq!(a.get(1), Some(&42));
		assert_eq!(a.get(0), None);
		assert_eq!(a.present_count(), 1);
	}

	#[test]
	fn iter_present_skips_absent() {
		let mut a: SparseTileArray<u32> = SparseTileArray::new(4, 1);
		a.set(0, Some(10));
		a.set(2, Some(30));
		let collected: Vec<_> = a.iter_present().collect();
		assert_eq!(collected, vec![(0, &10), (2, &30)]);
	}

	#[test]
	fn par_build_matches_serial() {
		let a = SparseTileArray::par_build(3, 3, |i| if i % 2 == 0 { Some(i as u32) } else { None });
		assert_eq!(a.present_count(), 5);
		assert_eq!(a.get(0), Some(&0));
		assert_eq!(a.get(1), None);
	}
}
