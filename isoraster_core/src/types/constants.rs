//! Geographic and routing constants shared across the isoraster workspace.

use std::f64::consts::PI;

/// WGS84 semi-major axis (equatorial radius) in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Earth circumference in meters at the equator (2 * PI * EARTH_RADIUS).
pub const WORLD_SIZE: f64 = 2.0 * PI * EARTH_RADIUS;

/// Length in degrees of one meter along a meridian, used to turn a target
/// cell size in meters into a `dlat` step. Longitude steps need an
/// additional `1 / cos(lat)` correction; see [`crate::GridScheme::tile_grid_containing`].
pub const DEG_PER_METER: f64 = 360.0 / WORLD_SIZE;

/// Default edge length of a grid cell, in meters, at the grid's centre
/// latitude.
pub const TARGET_CELL_SIZE_METERS: f64 = 100.0;

/// Number of cells per side of a tile.
pub const TILE_SPAN: usize = 16;

/// Sentinel and cap for travel times, in seconds: two hours.
pub const MAX_SEC: u32 = 7200;

/// Walking speed in millimeters per second (~4.7 km/h), used to turn
/// sub-edge distances from street connectors into seconds.
pub const SPEED_MM_SEC: u32 = 1300;

/// Maximum length, in meters, a street connector may span before a cell is
/// considered to have no nearby street.
pub const MAX_CONNECTOR_LENGTH_METERS: f64 = 500.0;

/// Number of one-minute bins in an access histogram.
pub const BINS: usize = 120;

/// Reference cumulative-access cutoffs, in minutes.
pub const REFERENCE_CUTOFFS_MIN: [u32; 3] = [30, 45, 60];

/// Reference travel-time percentiles.
pub const REFERENCE_PERCENTILES: [u32; 3] = [1, 50, 99];
