//! Core value types shared across the isoraster workspace: binary blobs, byte ranges,
//! geographic bounding boxes, the plate-carrée grid scheme, and the sparse tile array
//! that every raster component is built on top of.

mod access_histogram;
pub use access_histogram::*;

mod blob;
pub use blob::*;

mod constants;
pub use constants::*;

mod durations;
pub use durations::*;

mod byte_range;
pub use byte_range::*;

mod geo_bbox;
pub use geo_bbox::*;

mod grid_scheme;
pub use grid_scheme::*;

mod routing_data_cache;
pub use routing_data_cache::*;

mod sparse_tile_array;
pub use sparse_tile_array::*;
