//! Zip bundling of a batch job's GeoTIFF set (§6): one archive per job,
//! named `<jobId>.geotiffs.zip`, holding one entry per percentile/cutoff
//! raster under the same filename [`crate::opportunity_png::batch_raster_filename`]
//! uses for the PNG bundle.

use anyhow::Result;
use isoraster_derive::context;
use std::io::Write;
use zip::write::SimpleFileOptions;

/// One named file destined for a job's output archive.
pub struct BundleEntry {
	pub filename: String,
	pub bytes: Vec<u8>,
}

/// The filename a batch job's GeoTIFF archive is written under.
#[must_use]
pub fn geotiffs_zip_filename(job_id: &str) -> String {
	format!("{job_id}.geotiffs.zip")
}

/// Bundles `entries` into a single zip archive, stored with deflate
/// compression. Entry order is preserved; callers are responsible for
/// giving each entry a unique filename (duplicate names are not
/// deduplicated, matching `zip`'s own behavior of writing both).
#[context("bundling {} raster entries into a zip archive", entries.len())]
pub fn bundle_rasters(entries: &[BundleEntry]) -> Result<Vec<u8>> {
	let mut buffer = Vec::new();
	{
		let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
		let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
		for entry in entries {
			writer.start_file(&entry.filename, options)?;
			writer.write_all(&entry.bytes)?;
		}
		writer.finish()?;
	}
	Ok(buffer)
}
