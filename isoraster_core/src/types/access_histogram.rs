//! The access-bin histogram: how many opportunities become reachable in
//! each whole minute of travel, plus its two derived representations
//! (cumulative prefix-sum, and the dual "time to reach N opportunities"
//! inverse lookup).

use crate::BINS;

/// Sentinel returned by [`AccessHistogram::dual`] when fewer than `n + 1`
/// opportunities are ever reached.
pub const DUAL_UNREACHED: u32 = u32::MAX;

/// Per-minute opportunity counts reached by travel time, `density[m]` being
/// the opportunities whose travel time falls in minute `m`.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessHistogram {
	pub density: [i64; BINS],
}

impl Default for AccessHistogram {
	fn default() -> Self {
		AccessHistogram { density: [0; BINS] }
	}
}

impl AccessHistogram {
	#[must_use]
	pub fn new() -> AccessHistogram {
		AccessHistogram::default()
	}

	/// Adds `count` opportunities reached at `seconds` travel time, if
	/// `seconds` falls inside a valid minute bin and `count` is positive.
	pub fn add(&mut self, seconds: u32, count: i64) {
		if count <= 0 {
			return;
		}
		let m = (seconds / 60) as usize;
		if m < BINS {
			self.density[m] += count;
		}
	}

	/// Elementwise, null-safe addition, used to accumulate per-tile
	/// histograms into a job's running total.
	pub fn accumulate(&mut self, other: &AccessHistogram) {
		for m in 0..BINS {
			self.density[m] += other.density[m];
		}
	}

	/// Prefix-sum of [`Self::density`]: `cumulative[m] = sum(density[0..=m])`.
	#[must_use]
	pub fn cumulative(&self) -> [i64; BINS] {
		let mut out = [0i64; BINS];
		let mut running = 0i64;
		for m in 0..BINS {
			running += self.density[m];
			out[m] = running;
		}
		out
	}

	/// Dual-access ("nearest N") representation: `dual[n]` is the least
	/// minute `m` such that `cumulative[m] >= n + 1`, for `n` in `0..max_n`;
	/// [`DUAL_UNREACHED`] if no such minute exists. `max_n` is a
	/// request-scoped parameter (reference default 6).
	#[must_use]
	pub fn dual(&self, max_n: usize) -> Vec<u32> {
		let cumulative = self.cumulative();
		(0..max_n)
			.map(|n| {
				cumulative
					.iter()
					.position(|&c| c >= n as i64 + 1)
					.map_or(DUAL_UNREACHED, |m| m as u32)
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn with_density(values: &[(usize, i64)]) -> AccessHistogram {
		let mut h = AccessHistogram::new();
		for &(m, c) in values {
			h.density[m] = c;
		}
		h
	}

	#[test]
	fn cumulative_is_prefix_sum() {
		let h = with_density(&[(2, 5), (5, 3)]);
		let cumulative = h.cumulative();
		assert_eq!(cumulative[0], 0);
		assert_eq!(cumulative[1], 0);
		assert_eq!(cumulative[2], 5);
		assert_eq!(cumulative[4], 5);
		assert_eq!(cumulative[5], 8);
		assert_eq!(cumulative[119], 8);
	}

	#[test]
	fn dual_is_inverse_of_cumulative() {
		// density [0,0,5,0,0,3,0,...] -> cumulative [0,0,5,5,5,8,8,...]
		let h = with_density(&[(2, 5), (5, 3)]);
		let dual = h.dual(9);
		assert_eq!(dual[0], 2);
		assert_eq!(dual[4], 2);
		assert_eq!(dual[5], 5);
		assert_eq!(dual[7], 5);
		assert_eq!(dual[8], DUAL_UNREACHED);
	}

	#[test]
	fn add_ignores_non_positive_and_out_of_range() {
		let mut h = AccessHistogram::new();
		h.add(125 * 60, 10); // out of BINS range
		h.add(30, 0);
		h.add(30, -5);
		assert_eq!(h.density, [0; BINS]);
		h.add(30, 4);
		assert_eq!(h.density[0], 4);
	}

	#[test]
	fn accumulate_is_elementwise_add() {
		let mut a = with_density(&[(1, 2)]);
		let b = with_density(&[(1, 3), (4, 1)]);
		a.accumulate(&b);
		assert_eq!(a.density[1], 5);
		assert_eq!(a.density[4], 1);
	}
}
