//! Raster encoding for isoraster output (§6): the one-to-many travel-time
//! PNG (with embedded access-histogram text chunks), the packed-color PNG
//! shared by opportunity grids and batch per-cutoff rasters, a GeoTIFF
//! writer for the same packed layout, and the zip bundling of a batch job's
//! GeoTIFF set.

pub mod bundle;
pub mod geotiff;
pub mod opportunity_png;
pub mod raster;

pub use bundle::*;
pub use geotiff::*;
pub use opportunity_png::*;
pub use raster::*;
