//! This module provides the main interface for progress indicators, including conditional compilation
//! for different progress implementations.
//!
//! # Overview
//!
//! The module conditionally includes different progress indicator implementations based on the
//! build configuration. By default, it provides a no-op progress drain. If the "cli" feature is
//! enabled (and we're not running tests), it includes a terminal-based progress bar. The
//! `ProgressTrait` trait defines the common interface for all progress indicators, and
//! `get_progress_bar` provides a convenient way to create an instance of one.
//!
//! # Examples
//!
//! ```rust
//! use isoraster_core::progress::*;
//!
//! let mut progress = get_progress_bar("Processing", 100);
//! progress.set_position(50);
//! progress.inc(10);
//! progress.finish();
//! ```

#![allow(unused)]

mod progress_bar;
mod progress_drain;
mod sink;
mod traits;

pub use progress_bar::ProgressBar;
pub use progress_drain::ProgressDrain;
pub use sink::{EventSink, NullEventSink, ProgressDecimation, ProgressEvent, ProgressEventKind, ProgressSink};
pub use traits::ProgressTrait;

/// Factory function to create a progress bar or a no-op progress drain based on the build configuration.
///
/// # Arguments
///
/// * `message` - A message describing the task being performed.
/// * `max_value` - The maximum value of the progress.
///
/// # Returns
///
/// A boxed implementation of `ProgressTrait`.
pub fn get_progress_bar(message: &str, max_value: u64) -> Box<dyn ProgressTrait> {
	#[cfg(all(not(feature = "test"), feature = "cli"))]
	let mut progress: Box<dyn ProgressTrait> = Box::new(ProgressBar::new());
	#[cfg(any(feature = "test", not(feature = "cli")))]
	let mut progress: Box<dyn ProgressTrait> = Box::new(ProgressDrain::new());
	progress.init(message, max_value);
	progress
}
