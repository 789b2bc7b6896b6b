//! Lightweight terminal progress bar without external dependencies.
//!
//! Features:
//! - message
//! - sub-character precision bar (7 partial block steps)
//! - pos/len
//! - percentage
//! - speed (items/sec)
//! - ETA
//! - throttled redraws, so that a tight `inc(1)` loop doesn't flood the terminal

use super::ProgressTrait;
use std::cmp::min;
use std::env;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Minimum time between two redraws of the bar.
const REDRAW_INTERVAL: Duration = Duration::from_millis(500);

struct Inner {
	message: String,
	len: u64,
	pos: u64,
	start: Instant,
	last_redraw: Option<Instant>,
}

impl Default for Inner {
	fn default() -> Self {
		Inner {
			message: String::new(),
			len: 0,
			pos: 0,
			start: Instant::now(),
			last_redraw: None,
		}
	}
}

impl Inner {
	fn redraw(&mut self, force: bool) {
		let now = Instant::now();
		if !force
			&& let Some(last) = self.last_redraw
			&& now.duration_since(last) < REDRAW_INTERVAL
		{
			return;
		}
		self.last_redraw = Some(now);

		let len = self.len.max(1);
		let pos = self.pos.min(len);
		let elapsed = self.start.elapsed();
		let per_sec = if elapsed.as_secs_f64() > 0.0 {
			pos as f64 / elapsed.as_secs_f64()
		} else {
			0.0
		};
		let eta_secs = if per_sec > 0.0 {
			((len - pos) as f64 / per_sec).max(0.0)
		} else {
			0.0
		};

		let bar_width = available_bar_width(&self.message, pos, len, per_sec, eta_secs);
		let bar_str = make_bar(pos, len, bar_width);
		let percent = (pos as f64 * 100.0 / len as f64).floor() as u64;
		let per_sec_str = format_rate(per_sec);
		let eta_str = format_eta(Duration::from_secs_f64(eta_secs));

		let mut line = String::new();
		let _ = write!(
			&mut line,
			"{}▕{}▏{}/{} ({:>3}%) {:>5} {:>5}",
			self.message, bar_str, pos, len, percent, per_sec_str, eta_str
		);

		let mut stderr = io::stderr();
		let _ = write!(stderr, "\r\x1b[2K{}", line);
		let _ = stderr.flush();
	}
}

/// A terminal progress bar.
pub struct ProgressBar {
	inner: Inner,
}

impl ProgressTrait for ProgressBar {
	fn new() -> Self {
		ProgressBar { inner: Inner::default() }
	}

	fn init(&mut self, message: &str, max_value: u64) {
		self.inner.message = message.to_string();
		self.inner.len = max_value;
		self.inner.pos = 0;
		self.inner.start = Instant::now();
		self.inner.redraw(true);
	}

	fn set_position(&mut self, value: u64) {
		self.inner.pos = min(value, self.inner.len);
		self.inner.redraw(false);
	}

	fn inc(&mut self, value: u64) {
		self.inner.pos = self.inner.pos.saturating_add(value).min(self.inner.len);
		self.inner.redraw(false);
	}

	fn finish(&mut self) {
		self.inner.pos = self.inner.len;
		self.inner.redraw(true);
		let _ = io::stderr().write_all(b"\n");
		let _ = io::stderr().flush();
	}

	fn remove(&mut self) {
		let _ = io::stderr().write_all(b"\r\x1b[2K");
		let _ = io::stderr().flush();
	}
}

fn terminal_width() -> usize {
	if let Ok(cols) = env::var("COLUMNS")
		&& let Ok(v) = cols.parse::<usize>()
	{
		return v.max(10);
	}
	80
}

fn available_bar_width(msg: &str, pos: u64, len: u64, per_sec: f64, eta_secs: f64) -> usize {
	let percent = (pos as f64 * 100.0 / len.max(1) as f64).floor() as u64;
	let per_sec_str = format_rate(per_sec);
	let eta_str = format_eta(Duration::from_secs_f64(eta_secs));

	let right = format!("▏{}/{} ({:>3}%) {:>5} {:>5}", pos, len, percent, per_sec_str, eta_str);
	let total_width = terminal_width();
	let taken = msg.chars().count() + right.chars().count();
	let min_bar = 10usize;
	if total_width > taken + 2 + min_bar {
		total_width - taken - 2
	} else {
		min_bar
	}
}

fn make_bar(pos: u64, len: u64, width: usize) -> String {
	let width = width.max(1);
	let frac = (pos as f64 / len.max(1) as f64).clamp(0.0, 1.0);
	let exact = frac * (width as f64);
	let whole = exact.floor() as usize;
	let rem = exact - whole as f64;

	let partials = ["█", "▉", "▊", "▋", "▌", "▍", "▎", "▏"];

	let mut s = String::with_capacity(width);
	for _ in 0..whole.min(width) {
		s.push('█');
	}
	if whole < width {
		let idx = (rem * 8.0).floor() as usize;
		if idx > 0 {
			s.push_str(partials[idx.min(7)]);
		} else {
			s.push(' ');
		}
		let filled = whole + 1;
		for _ in filled..width {
			s.push(' ');
		}
	}
	s
}

fn format_rate(per_sec: f64) -> String {
	if per_sec.is_finite() {
		human_number(per_sec) + "/s"
	} else {
		"--/s".to_string()
	}
}

fn human_number(v: f64) -> String {
	let abs = v.abs();
	if abs >= 1_000_000_000.0 {
		format!("{:.1}G", v / 1_000_000_000.0)
	} else if abs >= 1_000_000.0 {
		format!("{:.1}M", v / 1_000_000.0)
	} else if abs >= 1_000.0 {
		format!("{:.1}k", v / 1_000.0)
	} else {
		format!("{:.0}", v)
	}
}

fn format_eta(d: Duration) -> String {
	let total = d.as_secs();
	let h = total / 3600;
	let m = (total % 3600) / 60;
	let s = total % 60;
	if h > 0 {
		format!("{:02}:{:02}:{:02}", h, m, s)
	} else {
		format!("{:02}:{:02}", m, s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn init_sets_message_and_length() {
		let mut bar = ProgressBar::new();
		bar.init("Test", 100);
		assert_eq!(bar.inner.len, 100);
		assert_eq!(bar.inner.message, "Test");
	}

	#[test]
	fn set_position_clamps_to_length() {
		let mut bar = ProgressBar::new();
		bar.init("Test", 100);
		bar.set_position(500);
		assert_eq!(bar.inner.pos, 100);
	}

	#[test]
	fn inc_accumulates() {
		let mut bar = ProgressBar::new();
		bar.init("Test", 100);
		bar.set_position(10);
		bar.inc(20);
		assert_eq!(bar.inner.pos, 30);
	}

	#[test]
	fn finish_reaches_length() {
		let mut bar = ProgressBar::new();
		bar.init("Test", 100);
		bar.set_position(50);
		bar.finish();
		assert_eq!(bar.inner.pos, 100);
	}

	#[test]
	fn format_eta_formats_hours_when_present() {
		assert_eq!(format_eta(Duration::from_secs(3_661)), "01:01:01");
		assert_eq!(format_eta(Duration::from_secs(61)), "01:01");
	}

	#[test]
	fn human_number_picks_suffix() {
		assert_eq!(human_number(1_500.0), "1.5k");
		assert_eq!(human_number(2_500_000.0), "2.5M");
	}
}
