//! The packed-color PNG shared by opportunity-grid snapshots and a batch
//! job's per-percentile/per-cutoff access rasters (§6): each pixel's 24-bit
//! RGB value is a single non-negative integer count, `R` the most
//! significant byte, clamped to `[0, 2^24 - 1]` so it survives an 8-bit
//! PNG without a companion metadata channel.

use anyhow::{Result, ensure};
use isoraster_core::GeoBBox;
use isoraster_derive::context;
use std::io::Cursor;

/// The largest count a packed pixel can represent; larger counts saturate
/// rather than wrap, so a badly-bounded opportunity count still renders as
/// "very large" instead of silently overflowing into a small value.
pub const MAX_PACKED_VALUE: i64 = (1 << 24) - 1;

pub(crate) fn pack(value: i64) -> [u8; 3] {
	let v = value.clamp(0, MAX_PACKED_VALUE) as u32;
	[(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

fn unpack(rgb: &[u8]) -> i64 {
	(i64::from(rgb[0]) << 16) | (i64::from(rgb[1]) << 8) | i64::from(rgb[2])
}

/// Decoded packed-color raster: per-cell counts plus the embedded bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedRaster {
	pub width: u32,
	pub height: u32,
	pub bounds: GeoBBox,
	pub values: Vec<i64>,
}

/// Encodes a dense `width x height` grid of non-negative counts as a
/// packed-color PNG, embedding `bounds` as Latin-1 `tEXt` chunks the same
/// way [`crate::raster::encode_one_to_many_png`] does.
#[context("encoding a {width}x{height} packed-color PNG")]
pub fn encode_packed_png(width: u32, height: u32, values: &[i64], bounds: &GeoBBox) -> Result<Vec<u8>> {
	ensure!(values.len() == width as usize * height as usize, "values length does not match {width}x{height}");

	let mut pixels = Vec::with_capacity(values.len() * 3);
	for &v in values {
		pixels.extend_from_slice(&pack(v));
	}

	let mut buffer = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut buffer, width, height);
		encoder.set_color(png::ColorType::Rgb);
		encoder.set_depth(png::BitDepth::Eight);
		encoder.add_text_chunk("CRS".to_string(), "WGS84".to_string())?;
		encoder.add_text_chunk("minX".to_string(), format!("{}", bounds.x_min))?;
		encoder.add_text_chunk("minY".to_string(), format!("{}", bounds.y_min))?;
		encoder.add_text_chunk("maxX".to_string(), format!("{}", bounds.x_max))?;
		encoder.add_text_chunk("maxY".to_string(), format!("{}", bounds.y_max))?;
		let mut writer = encoder.write_header()?;
		writer.write_image_data(&pixels)?;
	}
	Ok(buffer)
}

/// Decodes a PNG produced by [`encode_packed_png`].
#[context("decoding a packed-color PNG")]
pub fn decode_packed_png(bytes: &[u8]) -> Result<PackedRaster> {
	let decoder = png::Decoder::new(Cursor::new(bytes));
	let mut reader = decoder.read_info()?;

	let mut text = std::collections::HashMap::new();
	for chunk in &reader.info().uncompressed_latin1_text {
		text.insert(chunk.keyword.clone(), chunk.text.clone());
	}

	let mut buf = vec![0u8; reader.output_buffer_size()];
	let frame = reader.next_frame(&mut buf)?;
	ensure!(frame.color_type == png::ColorType::Rgb, "expected RGB8 packed-color PNG, got {:?}", frame.color_type);
	let width = frame.width;
	let height = frame.height;
	let data = &buf[..frame.buffer_size()];

	let n = (width * height) as usize;
	let mut values = Vec::with_capacity(n);
	for i in 0..n {
		values.push(unpack(&data[i * 3..i * 3 + 3]));
	}

	let get = |key: &str| -> Result<&String> { text.get(key).ok_or_else(|| anyhow::anyhow!("missing text chunk '{key}'")) };
	let parse_f64 = |key: &str| -> Result<f64> { Ok(get(key)?.parse()?) };
	let bounds = GeoBBox::new(parse_f64("minX")?, parse_f64("minY")?, parse_f64("maxX")?, parse_f64("maxY")?)?;

	Ok(PackedRaster { width, height, bounds, values })
}

/// The filename a batch job's per-percentile/per-cutoff access raster is
/// written under inside its output bundle (§6): `<jobId>_P<percentile>_C<cutoff>.png`.
#[must_use]
pub fn batch_raster_filename(job_id: &str, percentile: u8, cutoff_min: u32) -> String {
	format!("{job_id}_P{percentile}_C{cutoff_min}.png")
}
