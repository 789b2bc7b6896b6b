//! JSON description of a dense opportunity-density grid (used both for a
//! destination grid and, in `batch`, for the origin density grid a job's
//! task list is filtered against): a bounding box, a cell count, and a
//! row-major `f32` density array, fed straight into
//! [`OpportunityGrid::from_dense`].

use anyhow::{Context, Result, ensure};
use isoraster_core::GeoBBox;
use isoraster_propagation::OpportunityGrid;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct Bounds {
	min_lon: f64,
	min_lat: f64,
	max_lon: f64,
	max_lat: f64,
}

#[derive(Deserialize)]
struct DensityGridFile {
	bounds: Bounds,
	width: u32,
	height: u32,
	density: Vec<f32>,
}

/// Loads and parses a density-grid JSON file into an [`OpportunityGrid`].
pub fn load_opportunity_grid(path: &Path) -> Result<OpportunityGrid> {
	let text = std::fs::read_to_string(path).with_context(|| format!("reading density grid {}", path.display()))?;
	let file: DensityGridFile = serde_json::from_str(&text).with_context(|| format!("parsing density grid {}", path.display()))?;
	ensure!(
		file.density.len() == file.width as usize * file.height as usize,
		"density grid {} has {} values but declares {}x{}",
		path.display(),
		file.density.len(),
		file.width,
		file.height
	);
	let bounds = GeoBBox::new(file.bounds.min_lon, file.bounds.min_lat, file.bounds.max_lon, file.bounds.max_lat)?;
	let grid = isoraster_core::GridScheme::new(bounds, file.width, file.height)?;
	Ok(OpportunityGrid::from_dense(grid, &file.density))
}
