//! Interface implemented by every progress indicator in the workspace.

/// A trait defining the interface for progress indicators.
pub trait ProgressTrait: Send + Sync {
	/// Creates a new, uninitialized instance of the progress indicator.
	fn new() -> Self
	where
		Self: Sized;

	/// Initializes the progress indicator.
	///
	/// # Arguments
	///
	/// * `message` - A message describing the task being performed.
	/// * `max_value` - The maximum value of the progress.
	fn init(&mut self, message: &str, max_value: u64);

	/// Sets the position of the progress.
	fn set_position(&mut self, value: u64);

	/// Increases the value of the progress by a given amount.
	fn inc(&mut self, value: u64);

	/// Finishes the progress, setting its position to the maximum value.
	fn finish(&mut self);

	/// Removes the progress indicator from the terminal, if any.
	fn remove(&mut self);
}
