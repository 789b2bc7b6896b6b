//! Per-cell travel-time records shared by street connectors, egress tiles
//! and the propagation pass: three parallel `min`/`avg`/`max` arrays of
//! seconds, one element per cell, with [`MAX_SEC`] standing in for
//! "unreached" so that absent and reached cells live in the same array
//! without an extra presence bitset.

use crate::MAX_SEC;

/// Per-cell `min`/`avg`/`max` travel times in seconds, all of the same
/// length. Any value `>= MAX_SEC` means the cell was not reached.
#[derive(Clone, Debug, PartialEq)]
pub struct Durations {
	pub min: Vec<u32>,
	pub avg: Vec<u32>,
	pub max: Vec<u32>,
}

impl Durations {
	/// Builds a record of `len` all-unreached cells.
	#[must_use]
	pub fn unreached(len: usize) -> Durations {
		Durations {
			min: vec![MAX_SEC; len],
			avg: vec![MAX_SEC; len],
			max: vec![MAX_SEC; len],
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.min.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.min.is_empty()
	}

	/// `true` if every cell is unreached.
	#[must_use]
	pub fn is_all_unreached(&self) -> bool {
		self.min.iter().all(|&v| v >= MAX_SEC)
	}

	/// Caps every value at `cap_sec`, preserving the unreached sentinel.
	#[must_use]
	pub fn capped(&self, cap_sec: u32) -> Durations {
		let cap = |v: u32| if v >= MAX_SEC { MAX_SEC } else { v.min(cap_sec) };
		Durations {
			min: self.min.iter().map(|&v| cap(v)).collect(),
			avg: self.avg.iter().map(|&v| cap(v)).collect(),
			max: self.max.iter().map(|&v| cap(v)).collect(),
		}
	}

	/// Null-safe elementwise minimum of two records of equal length: a cell
	/// absent (unreached) in one side falls back to the other. Commutative
	/// and idempotent (`merge(a, a) == a`, `merge(a, b) == merge(b, a)`).
	#[must_use]
	pub fn merge(&self, other: &Durations) -> Durations {
		debug_assert_eq!(self.len(), other.len());
		let merge_one = |a: &[u32], b: &[u32]| a.iter().zip(b).map(|(&x, &y)| x.min(y)).collect();
		Durations {
			min: merge_one(&self.min, &other.min),
			avg: merge_one(&self.avg, &other.avg),
			max: merge_one(&self.max, &other.max),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn d(min: &[u32], avg: &[u32], max: &[u32]) -> Durations {
		Durations {
			min: min.to_vec(),
			avg: avg.to_vec(),
			max: max.to_vec(),
		}
	}

	#[test]
	fn unreached_is_all_sentinel() {
		let d = Durations::unreached(4);
		assert!(d.is_all_unreached());
		assert_eq!(d.len(), 4);
	}

	#[test]
	fn merge_is_commutative_and_idempotent() {
		let a = d(&[10, MAX_SEC, 30], &[10, MAX_SEC, 30], &[10, MAX_SEC, 30]);
		let b = d(&[20, 5, MAX_SEC], &[20, 5, MAX_SEC], &[20, 5, MAX_SEC]);
		assert_eq!(a.merge(&b), b.merge(&a));
		assert_eq!(a.merge(&a), a);
		assert_eq!(a.merge(&b).min, vec![10, 5, 30]);
	}

	#[test]
	fn capped_preserves_unreached() {
		let d = d(&[10, MAX_SEC, 7200], &[10, MAX_SEC, 7200], &[10, MAX_SEC, 7200]);
		let capped = d.capped(60);
		assert_eq!(capped.min, vec![10, MAX_SEC, MAX_SEC]);
	}
}
