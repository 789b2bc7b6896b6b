//! GeoTIFF writer for the packed-color raster layout (§6's GeoTIFF bundle
//! output): the same 24-bit packed counts as [`crate::opportunity_png`], LZW
//! compressed, with `ModelPixelScaleTag`/`ModelTiepointTag` georeferencing so
//! a GIS can place the raster without a companion world file.

use crate::opportunity_png::pack;
use anyhow::Result;
use isoraster_core::GeoBBox;
use isoraster_derive::context;
use std::io::Cursor;
use tiff::encoder::{TiffEncoder, colortype, compression::Lzw};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;

/// Encodes `values` (row-major, same packing as [`crate::opportunity_png::encode_packed_png`])
/// as an LZW-compressed GeoTIFF over `bounds`.
#[context("encoding a {width}x{height} GeoTIFF")]
pub fn encode_geotiff(width: u32, height: u32, values: &[i64], bounds: &GeoBBox) -> Result<Vec<u8>> {
	let mut pixels = Vec::with_capacity(values.len() * 3);
	for &v in values {
		pixels.extend_from_slice(&pack(v));
	}

	let pixel_scale_x = (bounds.x_max - bounds.x_min) / f64::from(width);
	let pixel_scale_y = (bounds.y_max - bounds.y_min) / f64::from(height);

	let mut cursor = Cursor::new(Vec::new());
	{
		let mut tiff = TiffEncoder::new(&mut cursor)?;
		let mut image = tiff.new_image_with_compression::<colortype::RGB8, _>(width, height, Lzw::default())?;
		image
			.encoder()
			.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), &[pixel_scale_x, pixel_scale_y, 0.0][..])?;
		image.encoder().write_tag(
			Tag::Unknown(MODEL_TIEPOINT_TAG),
			&[0.0, 0.0, 0.0, bounds.x_min, bounds.y_max, 0.0][..],
		)?;
		image.write_data(&pixels)?;
	}
	Ok(cursor.into_inner())
}
