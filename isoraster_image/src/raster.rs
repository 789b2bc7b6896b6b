//! The one-to-many travel-time PNG (§6): 8-bit RGB where R/G/B carry the
//! min/avg/max duration channels in whole minutes (clamped to `[0, 120]`,
//! `255` meaning unreached), with the request's access histogram and
//! bounding box embedded as uncompressed Latin-1 `tEXt` chunks so a caller
//! never needs a second response just to read the numbers back out.

use anyhow::{Result, ensure};
use isoraster_core::{Durations, GeoBBox, MAX_SEC};
use isoraster_derive::context;
use std::io::Cursor;

/// Minutes are clamped to this range before being written into a channel;
/// `UNREACHED_BYTE` is the sentinel for "not reached within the request's
/// own duration cap", distinct from any reachable value.
const MAX_MINUTES: u32 = 120;
const UNREACHED_BYTE: u8 = 255;

fn seconds_to_minute_byte(sec: u32) -> u8 {
	if sec >= MAX_SEC {
		return UNREACHED_BYTE;
	}
	(sec / 60).min(MAX_MINUTES) as u8
}

fn minute_byte_to_seconds(byte: u8) -> u32 {
	if byte == UNREACHED_BYTE { MAX_SEC } else { u32::from(byte) * 60 }
}

/// The JSON shape embedded in the `density`/`access` text chunks:
/// `[destination][percentile][minute]`. A one-to-many request against a
/// single destination grid carries exactly one outer entry.
pub type NestedMinuteSeries = Vec<Vec<Vec<i64>>>;
/// The JSON shape embedded in the `dual` text chunk: `[destination][percentile][n]`.
pub type NestedDualSeries = Vec<Vec<Vec<u32>>>;

/// Decoded access-histogram metadata carried by a one-to-many PNG's text
/// chunks, alongside the bounds of the image itself.
#[derive(Clone, Debug, PartialEq)]
pub struct OneToManyMetadata {
	pub bounds: GeoBBox,
	pub density: NestedMinuteSeries,
	pub access: NestedMinuteSeries,
	pub dual: NestedDualSeries,
}

/// Decoded one-to-many raster: per-cell min/avg/max minutes (row-major,
/// same orientation as the encoded grid) plus the embedded metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct OneToManyRaster {
	pub width: u32,
	pub height: u32,
	pub min_minutes: Vec<u8>,
	pub avg_minutes: Vec<u8>,
	pub max_minutes: Vec<u8>,
	pub metadata: OneToManyMetadata,
}

/// Encodes §4.I step 6's travel-time raster: `durations` is the dense
/// per-cell `(min, avg, max)` record over a `width x height` grid (row 0 at
/// the grid's northernmost row, matching [`isoraster_core::GridScheme`]'s
/// own cell ordering); `bounds` is the WGS84 extent of that grid; `density`/
/// `access`/`dual` are the request's access histogram in the nested
/// `[destination][percentile][...]` shape the text chunks carry.
#[context("encoding a {width}x{height} one-to-many travel-time PNG")]
pub fn encode_one_to_many_png(
	width: u32,
	height: u32,
	durations: &Durations,
	bounds: &GeoBBox,
	density: &NestedMinuteSeries,
	access: &NestedMinuteSeries,
	dual: &NestedDualSeries,
) -> Result<Vec<u8>> {
	ensure!(durations.len() == width as usize * height as usize, "durations length does not match {width}x{height}");

	let mut pixels = Vec::with_capacity(durations.len() * 3);
	for i in 0..durations.len() {
		pixels.push(seconds_to_minute_byte(durations.min[i]));
		pixels.push(seconds_to_minute_byte(durations.avg[i]));
		pixels.push(seconds_to_minute_byte(durations.max[i]));
	}

	let mut buffer = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut buffer, width, height);
		encoder.set_color(png::ColorType::Rgb);
		encoder.set_depth(png::BitDepth::Eight);
		encoder.add_text_chunk("Title".to_string(), "isoraster one-to-many travel-time raster".to_string())?;
		encoder.add_text_chunk("CRS".to_string(), "WGS84".to_string())?;
		encoder.add_text_chunk("minX".to_string(), format!("{}", bounds.x_min))?;
		encoder.add_text_chunk("minY".to_string(), format!("{}", bounds.y_min))?;
		encoder.add_text_chunk("maxX".to_string(), format!("{}", bounds.x_max))?;
		encoder.add_text_chunk("maxY".to_string(), format!("{}", bounds.y_max))?;
		encoder.add_text_chunk("density".to_string(), serde_json::to_string(density)?)?;
		encoder.add_text_chunk("access".to_string(), serde_json::to_string(access)?)?;
		encoder.add_text_chunk("dual".to_string(), serde_json::to_string(dual)?)?;
		let mut writer = encoder.write_header()?;
		writer.write_image_data(&pixels)?;
	}
	Ok(buffer)
}

/// Decodes a PNG produced by [`encode_one_to_many_png`], reproducing the
/// per-cell channels and the embedded access-histogram metadata (§8,
/// testable property 10).
#[context("decoding a one-to-many travel-time PNG")]
pub fn decode_one_to_many_png(bytes: &[u8]) -> Result<OneToManyRaster> {
	let decoder = png::Decoder::new(Cursor::new(bytes));
	let mut reader = decoder.read_info()?;

	let mut text = std::collections::HashMap::new();
	for chunk in &reader.info().uncompressed_latin1_text {
		text.insert(chunk.keyword.clone(), chunk.text.clone());
	}

	let mut buf = vec![0u8; reader.output_buffer_size()];
	let frame = reader.next_frame(&mut buf)?;
	ensure!(frame.color_type == png::ColorType::Rgb, "expected RGB8 one-to-many PNG, got {:?}", frame.color_type);
	let width = frame.width;
	let height = frame.height;
	let data = &buf[..frame.buffer_size()];

	let n = (width * height) as usize;
	let mut min_minutes = Vec::with_capacity(n);
	let mut avg_minutes = Vec::with_capacity(n);
	let mut max_minutes = Vec::with_capacity(n);
	for i in 0..n {
		min_minutes.push(data[i * 3]);
		avg_minutes.push(data[i * 3 + 1]);
		max_minutes.push(data[i * 3 + 2]);
	}

	let get = |key: &str| -> Result<&String> { text.get(key).ok_or_else(|| anyhow::anyhow!("missing text chunk '{key}'")) };
	let parse_f64 = |key: &str| -> Result<f64> { Ok(get(key)?.parse()?) };
	let bounds = GeoBBox::new(parse_f64("minX")?, parse_f64("minY")?, parse_f64("maxX")?, parse_f64("maxY")?)?;
	let density: NestedMinuteSeries = serde_json::from_str(get("density")?)?;
	let access: NestedMinuteSeries = serde_json::from_str(get("access")?)?;
	let dual: NestedDualSeries = serde_json::from_str(get("dual")?)?;

	Ok(OneToManyRaster {
		width,
		height,
		min_minutes,
		avg_minutes,
		max_minutes,
		metadata: OneToManyMetadata { bounds, density, access, dual },
	})
}

impl OneToManyRaster {
	/// Reconstructs dense per-cell seconds from the decoded minute bytes,
	/// the inverse of [`seconds_to_minute_byte`] applied during encoding.
	/// Lossy: only whole-minute resolution survives the round trip.
	#[must_use]
	pub fn durations(&self) -> Durations {
		Durations {
			min: self.min_minutes.iter().map(|&b| minute_byte_to_seconds(b)).collect(),
			avg: self.avg_minutes.iter().map(|&b| minute_byte_to_seconds(b)).collect(),
			max: self.max_minutes.iter().map(|&b| minute_byte_to_seconds(b)).collect(),
		}
	}
}
